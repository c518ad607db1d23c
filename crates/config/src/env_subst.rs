/// Expand `${NAME}` and `${NAME:-fallback}` placeholders from the process
/// environment.
///
/// A placeholder whose variable is unset and has no fallback is kept
/// verbatim, so a missing secret shows up as a failed login rather than an
/// empty password.
pub fn substitute_env(input: &str) -> String {
    expand(input, |name| std::env::var(name).ok())
}

fn expand(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let body = &after[..end];
        let (name, fallback) = match body.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (body, None),
        };

        match (name.is_empty(), lookup(name), fallback) {
            (false, Some(value), _) => out.push_str(&value),
            (false, None, Some(fallback)) => out.push_str(fallback),
            _ => {
                out.push_str("${");
                out.push_str(body);
                out.push('}');
            },
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "WARDEN_PASSWD" => Some("/srv/passwd".to_string()),
            _ => None,
        }
    }

    #[test]
    fn expands_known_variable() {
        assert_eq!(expand("path = \"${WARDEN_PASSWD}\"", lookup), "path = \"/srv/passwd\"");
    }

    #[test]
    fn unknown_variable_is_kept() {
        assert_eq!(expand("${WARDEN_MISSING}", lookup), "${WARDEN_MISSING}");
        assert_eq!(expand("${}", lookup), "${}");
    }

    #[test]
    fn fallback_applies_only_when_unset() {
        assert_eq!(expand("${WARDEN_MISSING:-/etc/passwd}", lookup), "/etc/passwd");
        assert_eq!(expand("${WARDEN_PASSWD:-/etc/passwd}", lookup), "/srv/passwd");
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        assert_eq!(expand("a ${WARDEN_PASSWD", lookup), "a ${WARDEN_PASSWD");
        assert_eq!(substitute_env("plain text"), "plain text");
    }
}
