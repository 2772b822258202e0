//! System prompt assembly.

use {ringle_common::Language, ringle_memory::SummaryContext};

const DEFAULT_USER_NAME: &str = "the user";

/// Persona template with `{user_name}` filled in, a note when the user wrote
/// in another language, and the rolling summary block.
pub fn system_prompt(
    template: &str,
    user_name: Option<&str>,
    language: Language,
    summary: &SummaryContext,
) -> String {
    let name = user_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_USER_NAME);
    let mut prompt = template.replace("{user_name}", name);

    if language != Language::English {
        prompt.push_str(&format!(
            "\n\nThe user's last message was written in {}. Keep replying in English, \
             using simple words, and briefly explain anything they seem unsure about.",
            language.display_name()
        ));
    }

    prompt.push_str(&summary.render());
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_user_name() {
        let out = system_prompt(
            "Chat with {user_name}. {user_name} likes tea.",
            Some("Kwon"),
            Language::English,
            &SummaryContext::default(),
        );
        assert_eq!(out, "Chat with Kwon. Kwon likes tea.");
    }

    #[test]
    fn blank_name_uses_default() {
        let out = system_prompt(
            "Hi {user_name}",
            Some("  "),
            Language::English,
            &SummaryContext::default(),
        );
        assert_eq!(out, "Hi the user");
    }

    #[test]
    fn korean_adds_language_note() {
        let out = system_prompt("Base.", None, Language::Korean, &SummaryContext::default());
        assert!(out.starts_with("Base.\n\n"));
        assert!(out.contains(Language::Korean.display_name()));
        assert!(out.contains("English"));
    }

    #[test]
    fn summary_block_is_appended_last() {
        let summary = SummaryContext::new("Talked about emails.", vec!["use 'regarding'".into()]);
        let out = system_prompt("Base.", None, Language::English, &summary);
        assert_eq!(
            out,
            "Base.\n\n[Previous Conversation Summary]\nTalked about emails.\n\n[Key Learning \
             Points]\n- use 'regarding'"
        );
    }
}
