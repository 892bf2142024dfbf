/// Replace `${ENV_VAR}` placeholders in raw config text.
///
/// Unresolvable variables are left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// Same as [`substitute_env`] with a custom lookup, so tests never touch the
/// process environment.
pub fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => result.push_str(&value),
                    None => {
                        result.push_str("${");
                        result.push_str(name);
                        result.push('}');
                    },
                }
                rest = &after[end + 1..];
            },
            _ => {
                // Unclosed or empty placeholder: emit literally.
                result.push_str("${");
                rest = after;
            },
        }
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "RELAY_TOKEN" => Some("s3cret".to_string()),
            "RELAY_PORT" => Some("8080".to_string()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_vars() {
        assert_eq!(
            substitute_env_with("token = \"${RELAY_TOKEN}\"\nport = ${RELAY_PORT}", lookup),
            "token = \"s3cret\"\nport = 8080"
        );
    }

    #[test]
    fn leaves_unknown_var() {
        assert_eq!(
            substitute_env_with("${RELAY_MISSING_XYZ}", lookup),
            "${RELAY_MISSING_XYZ}"
        );
    }

    #[test]
    fn malformed_placeholders_are_literal() {
        assert_eq!(substitute_env_with("a ${ b", lookup), "a ${ b");
        assert_eq!(substitute_env_with("${}", lookup), "${}");
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_env("plain text"), "plain text");
    }
}
