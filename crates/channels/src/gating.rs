//! Sender whitelist matching.

/// Check whether `candidate` matches any whitelist entry.
///
/// Matching is case-insensitive and ignores a leading `@` on either side.
/// Entries may use `*` as a wildcard for any sequence of characters. An empty
/// whitelist matches nobody: the command path must never open up by accident
/// when the last entry is removed.
pub fn is_allowed(candidate: &str, whitelist: &[String]) -> bool {
    let candidate = canonical(candidate);
    if candidate.is_empty() {
        return false;
    }
    whitelist.iter().any(|entry| {
        let pattern = canonical(entry);
        if pattern.contains('*') {
            glob_match(&pattern, &candidate)
        } else {
            pattern == candidate
        }
    })
}

/// A sender is allowed when either its numeric id or its username matches.
pub fn sender_allowed(sender_id: &str, sender_handle: Option<&str>, whitelist: &[String]) -> bool {
    is_allowed(sender_id, whitelist) || sender_handle.is_some_and(|h| is_allowed(h, whitelist))
}

fn canonical(value: &str) -> String {
    value.trim().trim_start_matches('@').to_lowercase()
}

/// Glob matching supporting `*` as a wildcard for any sequence of chars.
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(head) = parts.next() else {
        return text.is_empty();
    };
    let Some(mut rest) = text.strip_prefix(head) else {
        return false;
    };

    let middle_and_tail: Vec<&str> = parts.collect();
    let Some((tail, middle)) = middle_and_tail.split_last() else {
        return rest.is_empty();
    };

    for segment in middle.iter().filter(|s| !s.is_empty()) {
        match rest.find(segment) {
            Some(idx) => rest = &rest[idx + segment.len()..],
            None => return false,
        }
    }
    rest.len() >= tail.len() && rest.ends_with(tail)
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn list(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|e| (*e).to_string()).collect()
    }

    #[test]
    fn empty_whitelist_allows_nobody() {
        assert!(!is_allowed("anyone", &[]));
        assert!(!sender_allowed("42", Some("anyone"), &[]));
    }

    #[rstest]
    #[case("alice", true)]
    #[case("Alice", true)]
    #[case("@alice", true)]
    #[case("charlie", false)]
    #[case("", false)]
    fn exact_match(#[case] candidate: &str, #[case] expected: bool) {
        assert_eq!(is_allowed(candidate, &list(&["@alice", "bob"])), expected);
    }

    #[rstest]
    #[case("admin_*", "admin_alice", true)]
    #[case("admin_*", "user_bob", false)]
    #[case("*_bot", "news_bot", true)]
    #[case("*_bot", "news_bots", false)]
    #[case("user_*_admin", "user_123_admin", true)]
    #[case("user_*_admin", "user_123_mod", false)]
    #[case("a*b*c", "abc", true)]
    #[case("a*b*c", "axxbyyc", true)]
    #[case("a*b*c", "acb", false)]
    #[case("*", "anything", true)]
    fn glob_patterns(#[case] pattern: &str, #[case] candidate: &str, #[case] expected: bool) {
        assert_eq!(is_allowed(candidate, &list(&[pattern])), expected);
    }

    #[test]
    fn sender_matches_by_id_or_handle() {
        let whitelist = list(&["377114917", "fabien"]);
        assert!(sender_allowed("377114917", None, &whitelist));
        assert!(sender_allowed("1", Some("Fabien"), &whitelist));
        assert!(!sender_allowed("1", Some("other"), &whitelist));
        assert!(!sender_allowed("1", None, &whitelist));
    }
}
