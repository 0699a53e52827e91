use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Substitute `{{ env.NAME }}` placeholders in raw config text
///
/// `{{ env.NAME | default("value") }}` falls back to `value` when `NAME` is
/// unset. Comment lines are left untouched so that commented-out settings
/// never require their variables.
pub fn expand_env(input: &str) -> Result<String, String> {
    let mut output = String::with_capacity(input.len());

    for (i, line) in input.split('\n').enumerate() {
        if i > 0 {
            output.push('\n');
        }

        if line.trim_start().starts_with('#') {
            output.push_str(line);
        } else {
            expand_line(line, &mut output)?;
        }
    }

    Ok(output)
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\{\{\s*([A-Za-z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\)\s*)?\}\}"#).expect("must be valid regex")
    })
}

fn expand_line(line: &str, output: &mut String) -> Result<(), String> {
    let mut rest = 0;

    for caps in placeholder().captures_iter(line) {
        let Some(whole) = caps.get(0) else { continue };
        output.push_str(&line[rest..whole.start()]);
        output.push_str(&resolve(&caps)?);
        rest = whole.end();
    }

    output.push_str(&line[rest..]);
    Ok(())
}

fn resolve(caps: &Captures<'_>) -> Result<String, String> {
    let path = caps.get(1).map_or("", |m| m.as_str());

    let Some(name) = path.strip_prefix("env.").filter(|n| !n.is_empty() && !n.contains('.')) else {
        return Err(format!("only variables scoped with 'env.' are supported: `{path}`"));
    };

    match (std::env::var(name), caps.get(2)) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(fallback)) => Ok(fallback.as_str().to_owned()),
        (Err(_), None) => Err(format!("environment variable not found: `{name}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_placeholders_is_unchanged() {
        let input = "[store]\ntype = \"memory\"\n";
        assert_eq!(expand_env(input).unwrap(), input);
    }

    #[test]
    fn substitutes_variables() {
        temp_env::with_vars([("CADABRA_A", Some("one")), ("CADABRA_B", Some("two"))], || {
            let result = expand_env("a = \"{{ env.CADABRA_A }}\"\nb = \"{{env.CADABRA_B}}-{{ env.CADABRA_A }}\"").unwrap();
            assert_eq!(result, "a = \"one\"\nb = \"two-one\"");
        });
    }

    #[test]
    fn missing_variable_is_an_error() {
        temp_env::with_var_unset("CADABRA_MISSING", || {
            let err = expand_env("token = \"{{ env.CADABRA_MISSING }}\"").unwrap_err();
            assert!(err.contains("CADABRA_MISSING"));
        });
    }

    #[test]
    fn default_applies_only_when_unset() {
        temp_env::with_var_unset("CADABRA_ZONE", || {
            let result = expand_env("time_zone = \"{{ env.CADABRA_ZONE | default(\"UTC\") }}\"").unwrap();
            assert_eq!(result, "time_zone = \"UTC\"");
        });

        temp_env::with_var("CADABRA_ZONE", Some("Europe/Paris"), || {
            let result = expand_env("time_zone = \"{{ env.CADABRA_ZONE | default(\"UTC\") }}\"").unwrap();
            assert_eq!(result, "time_zone = \"Europe/Paris\"");
        });
    }

    #[test]
    fn empty_default_is_allowed() {
        temp_env::with_var_unset("CADABRA_EMPTY", || {
            let result = expand_env("prefix = \"{{ env.CADABRA_EMPTY | default(\"\") }}\"").unwrap();
            assert_eq!(result, "prefix = \"\"");
        });
    }

    #[test]
    fn only_env_scope_is_supported() {
        let err = expand_env("key = \"{{ vault.SECRET }}\"").unwrap_err();
        assert!(err.contains("only variables scoped with 'env.'"));

        let err = expand_env("key = \"{{ env.A.B }}\"").unwrap_err();
        assert!(err.contains("only variables scoped with 'env.'"));
    }

    #[test]
    fn comment_lines_are_not_expanded() {
        temp_env::with_var_unset("CADABRA_COMMENTED", || {
            let input = "  # token = \"{{ env.CADABRA_COMMENTED }}\"";
            assert_eq!(expand_env(input).unwrap(), input);
        });
    }
}
