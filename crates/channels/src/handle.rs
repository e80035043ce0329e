//! Canonical form of a Telegram chat handle.

const SCHEMES: &[&str] = &["https://", "http://"];
const HOSTS: &[&str] = &["t.me/", "telegram.me/"];

/// Normalize a channel reference to its bare, lowercase handle.
///
/// Accepts `@name`, `https://t.me/name`, `t.me/name` and plain `name`, with
/// prefixes matched case-insensitively. Stripping repeats until nothing
/// changes, so `normalize_handle(normalize_handle(x)) == normalize_handle(x)`.
pub fn normalize_handle(raw: &str) -> String {
    let mut current = raw.trim();
    loop {
        let next = strip_once(current);
        if next.len() == current.len() {
            break;
        }
        current = next;
    }
    current.to_lowercase()
}

fn strip_once(value: &str) -> &str {
    let mut value = value.trim();
    for prefix in SCHEMES.iter().chain(HOSTS) {
        value = strip_prefix_ignore_case(value, prefix);
    }
    value
        .trim_start_matches('@')
        .trim_end_matches('/')
        .trim()
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> &'a str {
    match value.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &value[prefix.len()..],
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("foo", "foo")]
    #[case("@foo", "foo")]
    #[case("https://t.me/foo", "foo")]
    #[case("HTTPS://T.ME/foo", "foo")]
    #[case("http://t.me/foo/", "foo")]
    #[case("t.me/foo", "foo")]
    #[case("https://telegram.me/@Foo", "foo")]
    #[case("  @@News  ", "news")]
    #[case("https://t.me/https://t.me/foo", "foo")]
    #[case("", "")]
    fn normalizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_handle(input), expected);
    }

    #[rstest]
    #[case("@foo")]
    #[case("https://t.me/@t.me/Bar")]
    #[case("@https://T.me/baz/")]
    #[case("plain_handle")]
    fn idempotent(#[case] input: &str) {
        let once = normalize_handle(input);
        assert_eq!(normalize_handle(&once), once);
    }

    #[test]
    fn all_forms_agree() {
        assert_eq!(normalize_handle("@foo"), normalize_handle("https://t.me/foo"));
        assert_eq!(normalize_handle("@foo"), "foo");
    }
}
