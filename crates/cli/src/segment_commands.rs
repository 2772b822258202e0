use std::{path::Path, time::Duration};

use {
    anyhow::Result,
    ringle_auto_reply::{PacingModel, Segmenter},
    ringle_config::RingleConfig,
};

struct PlannedChunk {
    text: String,
    delay: Duration,
    bounds: (Duration, Duration),
}

fn plan(config: &RingleConfig, text: &str) -> Vec<PlannedChunk> {
    let segmenter = Segmenter::new(&config.segmenter);
    let pacing = PacingModel::new(&config.pacing);
    segmenter
        .segment(text)
        .into_iter()
        .map(|chunk| PlannedChunk {
            delay: pacing.delay_for(&chunk),
            bounds: pacing.bounds_for(&chunk),
            text: chunk,
        })
        .collect()
}

pub fn show(path: Option<&Path>, text: &str) -> Result<()> {
    let config = ringle_config::discover_and_load(path);
    let chunks = plan(&config, text);
    if chunks.is_empty() {
        println!("Nothing to send.");
        return Ok(());
    }

    let total: Duration = chunks.iter().map(|c| c.delay).sum();
    for (i, chunk) in chunks.iter().enumerate() {
        println!(
            "[{}] wait {}ms (range {}-{}ms)",
            i + 1,
            chunk.delay.as_millis(),
            chunk.bounds.0.as_millis(),
            chunk.bounds.1.as_millis(),
        );
        println!("{}\n", chunk.text);
    }
    println!("{} chunk(s), ~{:.1}s of typing", chunks.len(), total.as_secs_f64());
    Ok(())
}
