use std::path::Path;

use ringle_memory::{MemoryStore, SqliteMemoryStore, SummaryRow};

pub async fn list_summaries(
    path: Option<&Path>,
    chat: Option<&str>,
    limit: u32,
    json: bool,
) -> anyhow::Result<()> {
    let config = ringle_config::discover_and_load(path);
    let db_path = ringle_config::memory_db_path(&config);
    if !db_path.exists() {
        anyhow::bail!(
            "Memory database not found at {}. Run the agent first to record a conversation.",
            db_path.display()
        );
    }

    let pool = ringle_memory::open_pool(&db_path).await?;
    let store = SqliteMemoryStore::new(pool);
    let rows = store.recent_summaries(chat, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if rows.is_empty() {
        println!("No summaries yet.");
    } else {
        print_human(&rows);
    }
    Ok(())
}

fn print_human(rows: &[SummaryRow]) {
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!(
            "#{} {} {} ({} messages, saved {})",
            row.id, row.chat_key, row.session_date, row.message_count, row.created_at
        );
        println!("{}", row.summary);
        for point in &row.key_points {
            println!("  - {point}");
        }
    }
}
