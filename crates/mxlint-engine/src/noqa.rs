//! Noqa skip directives embedded in a document's `Documentation` field.

const NOQA: &str = "# noqa";
const NOQA_ALIAS: &str = "#noqa";

/// A parsed directive line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoqaDirective {
    /// The line is not a directive.
    None,
    /// Skip every rule. `reason` is the full trimmed line.
    All { reason: String },
    /// Skip only the listed rule numbers.
    Rules { rules: Vec<String>, reason: String },
}

impl NoqaDirective {
    /// The skip reason when this directive applies to `rule_number`.
    pub fn skips(&self, rule_number: &str) -> Option<&str> {
        match self {
            NoqaDirective::None => None,
            NoqaDirective::All { reason } => Some(reason),
            NoqaDirective::Rules { rules, reason } => {
                rules.iter().any(|r| r == rule_number).then_some(reason.as_str())
            }
        }
    }
}

/// Parse one line of documentation.
///
/// The prefix is matched case-insensitively. A bare directive, or one whose
/// rule list is empty or does not start with `:`, skips all rules. Text after
/// the first space of a rule list is kept as part of the reason.
pub fn parse_noqa_directive(line: &str) -> NoqaDirective {
    let line = line.trim();
    let lower = line.to_ascii_lowercase();

    let prefix_len = if lower.starts_with(NOQA) {
        NOQA.len()
    } else if lower.starts_with(NOQA_ALIAS) {
        NOQA_ALIAS.len()
    } else {
        return NoqaDirective::None;
    };

    let reason = line.to_string();
    let rest = line[prefix_len..].trim();
    if let Some(list) = rest.strip_prefix(':') {
        let list = list.split(' ').next().unwrap_or_default();
        let rules: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from)
            .collect();
        if !rules.is_empty() {
            return NoqaDirective::Rules { rules, reason };
        }
    }
    NoqaDirective::All { reason }
}

/// Scan every documentation line and return the reason of the first
/// directive that skips `rule_number`. With `ignore_noqa` nothing is skipped.
pub fn should_skip_rule(documentation: &str, rule_number: &str, ignore_noqa: bool) -> Option<String> {
    if ignore_noqa {
        return None;
    }
    documentation
        .lines()
        .map(parse_noqa_directive)
        .find_map(|directive| directive.skips(rule_number).map(String::from))
}

/// The `Documentation` field of a decoded document, when it is a string.
pub fn documentation(document: &serde_json::Value) -> Option<&str> {
    document.get("Documentation").and_then(|d| d.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(list: &[&str], reason: &str) -> NoqaDirective {
        NoqaDirective::Rules {
            rules: list.iter().map(|s| s.to_string()).collect(),
            reason: reason.into(),
        }
    }

    #[test]
    fn bare_directive_skips_all() {
        assert_eq!(
            parse_noqa_directive("#noqa"),
            NoqaDirective::All {
                reason: "#noqa".into()
            }
        );
        assert_eq!(
            parse_noqa_directive("  # noqa  "),
            NoqaDirective::All {
                reason: "# noqa".into()
            }
        );
    }

    #[test]
    fn prefix_is_case_insensitive() {
        assert_eq!(
            parse_noqa_directive("#NOQA:001_0002"),
            rules(&["001_0002"], "#NOQA:001_0002")
        );
        assert!(matches!(
            parse_noqa_directive("# NoQa"),
            NoqaDirective::All { .. }
        ));
    }

    #[test]
    fn rule_list_with_reason() {
        let line = "#noqa:001_0001, 001_0002 legacy module, fix later";
        // Only text before the first space is the list.
        assert_eq!(parse_noqa_directive(line), rules(&["001_0001"], line));

        let line = "# noqa:001_0001,001_0002 legacy";
        assert_eq!(
            parse_noqa_directive(line),
            rules(&["001_0001", "001_0002"], line)
        );
    }

    #[test]
    fn empty_rule_list_skips_all() {
        assert!(matches!(
            parse_noqa_directive("#noqa:"),
            NoqaDirective::All { .. }
        ));
        assert!(matches!(
            parse_noqa_directive("#noqa:,, because"),
            NoqaDirective::All { .. }
        ));
    }

    #[test]
    fn trailing_text_without_colon_skips_all() {
        assert_eq!(
            parse_noqa_directive("#noqa because reasons"),
            NoqaDirective::All {
                reason: "#noqa because reasons".into()
            }
        );
    }

    #[test]
    fn non_directive_lines() {
        assert_eq!(parse_noqa_directive("just text"), NoqaDirective::None);
        assert_eq!(parse_noqa_directive("see #noqa"), NoqaDirective::None);
        assert_eq!(parse_noqa_directive(""), NoqaDirective::None);
    }

    #[test]
    fn should_skip_scans_all_lines() {
        let doc = "Some description\n#noqa:001_0001\n#noqa:001_0002 second";
        assert_eq!(
            should_skip_rule(doc, "001_0002", false),
            Some("#noqa:001_0002 second".into())
        );
        assert_eq!(
            should_skip_rule(doc, "001_0001", false),
            Some("#noqa:001_0001".into())
        );
        assert_eq!(should_skip_rule(doc, "001_0003", false), None);
    }

    #[test]
    fn skip_all_applies_to_every_rule() {
        let doc = "first\n# noqa";
        assert_eq!(should_skip_rule(doc, "anything", false), Some("# noqa".into()));
        assert_eq!(should_skip_rule(doc, "", false), Some("# noqa".into()));
    }

    #[test]
    fn ignore_noqa_never_skips() {
        assert_eq!(should_skip_rule("#noqa", "001_0001", true), None);
        assert_eq!(should_skip_rule("#noqa:001_0001", "001_0001", true), None);
    }

    #[test]
    fn documentation_field_must_be_string() {
        let doc = serde_json::json!({"Documentation": "#noqa"});
        assert_eq!(documentation(&doc), Some("#noqa"));
        let doc = serde_json::json!({"Documentation": 5});
        assert_eq!(documentation(&doc), None);
        assert_eq!(documentation(&serde_json::json!(["x"])), None);
    }
}
