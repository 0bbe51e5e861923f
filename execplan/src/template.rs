//! Built-in document templates and `${name}` substitution.

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use regex_lite::{Captures, Regex};

use crate::error::{ExecPlanError, Result};

pub const EXECPLAN_TEMPLATE: &str = include_str!("../templates/EXECPLAN_TEMPLATE.md");
pub const MILESTONE_TEMPLATE: &str = include_str!("../templates/MILESTONE_FILE_TEMPLATE.md");

#[allow(clippy::expect_used)]
fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER_RE: OnceCell<Regex> = OnceCell::new();
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\$\{(\w+)\}").expect("valid placeholder regex"))
}

/// Replaces every `${name}` in `template`. Unknown names are an error so a
/// template/variable mismatch never produces a half-rendered document.
pub fn render(template: &str, vars: &HashMap<&str, String>) -> Result<String> {
    if let Some(missing) = placeholder_regex()
        .captures_iter(template)
        .filter_map(|caps| caps.get(1))
        .map(|name| name.as_str())
        .find(|name| !vars.contains_key(name))
    {
        return Err(ExecPlanError::Validation(format!(
            "Template placeholder '${{{missing}}}' has no value"
        )));
    }

    let rendered = placeholder_regex().replace_all(template, |caps: &Captures<'_>| {
        vars.get(&caps[1]).cloned().unwrap_or_default()
    });
    Ok(rendered.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front_matter::FrontMatter;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_substitutes_all() {
        let vars = HashMap::from([("name", "plan".to_string()), ("n", "3".to_string())]);
        assert_eq!(render("${name}-${n}-${name}", &vars).unwrap(), "plan-3-plan");
    }

    #[test]
    fn test_render_rejects_missing_variable() {
        let err = render("${unknown}", &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("${unknown}"));
    }

    #[test]
    fn test_builtin_templates_declare_expected_placeholders() {
        let names = |template: &str| -> Vec<String> {
            let mut names: Vec<String> = placeholder_regex()
                .captures_iter(template)
                .map(|caps| caps[1].to_string())
                .collect();
            names.sort();
            names.dedup();
            names
        };
        assert_eq!(
            names(EXECPLAN_TEMPLATE),
            vec![
                "created", "domain", "id", "kind", "owner_yaml", "title_text", "title_yaml",
                "updated"
            ]
        );
        assert_eq!(
            names(MILESTONE_TEMPLATE),
            vec![
                "created",
                "domain",
                "execplan_id",
                "milestone_id",
                "ms",
                "owner_yaml",
                "title_text",
                "title_yaml",
                "updated"
            ]
        );
    }

    #[test]
    fn test_rendered_execplan_front_matter_parses() {
        let vars = HashMap::from([
            ("id", "EP-20260207-001".to_string()),
            ("title_yaml", "\"Auth: Refresh\"".to_string()),
            ("title_text", "Auth: Refresh".to_string()),
            ("kind", "feature".to_string()),
            ("domain", "backend".to_string()),
            ("owner_yaml", "\"@codex\"".to_string()),
            ("created", "2026-02-07".to_string()),
            ("updated", "2026-02-07".to_string()),
        ]);
        let text = render(EXECPLAN_TEMPLATE, &vars).unwrap();
        let fm = FrontMatter::parse_document(&text).unwrap();
        assert_eq!(fm.get_str("title").as_deref(), Some("Auth: Refresh"));
        assert_eq!(fm.get_str("owner").as_deref(), Some("@codex"));
        assert_eq!(fm.get_str("status").as_deref(), Some("planned"));
        assert!(text.contains("\n# Auth: Refresh\n"));
    }
}
