//! `${VAR}` expansion for notifier options such as URLs and header values.

use crate::traits::NotifyError;

/// Replace every `${NAME}` reference with the value of the environment variable.
///
/// Text outside references is copied unchanged. A `$` not followed by `{` is literal.
pub fn expand_env(input: &str) -> Result<String, NotifyError> {
    expand_with(input, |name| std::env::var(name).ok())
}

fn expand_with<F>(input: &str, lookup: F) -> Result<String, NotifyError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| {
            NotifyError::Config(format!("unterminated ${{...}} reference in '{input}'"))
        })?;
        let name = &after[..end];
        if name.is_empty() {
            return Err(NotifyError::Config(format!("empty ${{}} reference in '{input}'")));
        }
        let value = lookup(name)
            .ok_or_else(|| NotifyError::Config(format!("environment variable {name} is not set")))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake(name: &str) -> Option<String> {
        match name {
            "HOOK_HOST" => Some("hooks.internal".to_string()),
            "TOKEN" => Some("s3cr3t".to_string()),
            _ => None,
        }
    }

    #[test]
    fn expands_multiple_references() {
        let out = expand_with("https://${HOOK_HOST}/alerts?t=${TOKEN}", fake).unwrap();
        assert_eq!(out, "https://hooks.internal/alerts?t=s3cr3t");
    }

    #[test]
    fn plain_dollar_is_literal() {
        assert_eq!(expand_with("cost: $5", fake).unwrap(), "cost: $5");
    }

    #[test]
    fn missing_variable_names_the_variable() {
        match expand_with("https://${NOPE}/x", fake).unwrap_err() {
            NotifyError::Config(msg) => assert!(msg.contains("NOPE")),
            other => panic!("expected Config error, got: {other:?}"),
        }
    }

    #[test]
    fn unterminated_reference_is_rejected() {
        assert!(matches!(
            expand_with("https://${HOOK_HOST/x", fake),
            Err(NotifyError::Config(_))
        ));
        assert!(matches!(expand_with("${}", fake), Err(NotifyError::Config(_))));
    }

    #[test]
    fn reads_process_environment() {
        std::env::set_var("VIGIL_ENV_EXPAND_TEST", "ok");
        assert_eq!(expand_env("${VIGIL_ENV_EXPAND_TEST}!").unwrap(), "ok!");
        std::env::remove_var("VIGIL_ENV_EXPAND_TEST");
    }
}
