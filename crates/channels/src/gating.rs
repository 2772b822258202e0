/// Whether a sender may talk to the bot.
///
/// A sender can be known by several identities (numeric user id, username).
/// An empty allowlist admits everyone. Matching ignores case and a leading
/// `@`, and `*` in an entry matches any run of characters.
pub fn is_allowed(identities: &[&str], allowlist: &[String]) -> bool {
    if allowlist.is_empty() {
        return true;
    }
    let ids: Vec<String> = identities.iter().map(|id| normalize(id)).collect();
    allowlist.iter().any(|entry| {
        let pattern = normalize(entry);
        ids.iter().any(|id| wildcard_match(&pattern, id))
    })
}

fn normalize(s: &str) -> String {
    s.trim().trim_start_matches('@').to_lowercase()
}

/// `*`-only wildcard match with greedy backtracking.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[test]
    fn empty_allowlist_admits_everyone() {
        assert!(is_allowed(&["42"], &[]));
    }

    #[rstest]
    #[case(&["42", "mina"], "mina", true)]
    #[case(&["42", "Mina"], "@mina", true)]
    #[case(&["42", "mina"], "42", true)]
    #[case(&["42", "mina"], "jun", false)]
    #[case(&["42"], "4*", true)]
    #[case(&["user@example.com"], "*@example.com", true)]
    #[case(&["user@other.com"], "*@example.com", false)]
    #[case(&["tutor_kim_bot"], "tutor_*_bot", true)]
    #[case(&["tutor_kim_bo"], "tutor_*_bot", false)]
    fn matches_identities(#[case] ids: &[&str], #[case] entry: &str, #[case] allowed: bool) {
        assert_eq!(is_allowed(ids, &[entry.to_string()]), allowed);
    }
}
