/// Expand `${NAME}` references in raw config text from the process
/// environment. References that do not resolve are kept verbatim so the
/// validator can point at them.
pub fn substitute_env(input: &str) -> String {
    expand(input, |name| std::env::var(name).ok())
}

pub(crate) fn expand(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            },
            _ => {
                out.push_str("${");
                rest = after;
            },
        }
    }
    out.push_str(rest);
    out
}

/// Names of `${NAME}` references still present in `input`.
pub fn unresolved_refs(input: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                names.push(&after[..end]);
                rest = &after[end + 1..];
            },
            _ => rest = after,
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn fake_env(name: &str) -> Option<String> {
        match name {
            "RINGLE_TOKEN" => Some("123:abc".into()),
            "EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[rstest]
    #[case("token = \"${RINGLE_TOKEN}\"", "token = \"123:abc\"")]
    #[case("a${EMPTY}b", "ab")]
    #[case("${MISSING}", "${MISSING}")]
    #[case("cost: $5 ${", "cost: $5 ${")]
    #[case("${}", "${}")]
    #[case("no refs", "no refs")]
    fn expands_references(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(expand(input, fake_env), expected);
    }

    #[test]
    fn lists_unresolved() {
        let text = expand("x=${RINGLE_TOKEN} y=${NOPE} z=${ALSO_NOPE}", fake_env);
        assert_eq!(unresolved_refs(&text), vec!["NOPE", "ALSO_NOPE"]);
    }
}
