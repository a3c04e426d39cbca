const KNOWN_STATEMENTS: &[&str] = &[
    "allow",
    "deny",
    "auditallow",
    "dontaudit",
    "allowxperm",
    "auditallowxperm",
    "dontauditxperm",
    "permissive",
    "enforce",
    "typeattribute",
    "type",
    "attribute",
    "type_transition",
    "type_change",
    "type_member",
    "genfscon",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleWarning {
    pub index: usize,
    pub rule: String,
    pub message: String,
}

/// 把规则文本拆成有序的规则列表，去掉空行和注释。
pub fn parse_rules(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with('#') && !line.starts_with(';'))
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect()
}

pub fn format_rules(rules: &[String]) -> String {
    let mut out = rules.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Advisory only; the editor never rejects rules on lint results.
pub fn lint_rule(rule: &str) -> Option<String> {
    let keyword = rule.split_whitespace().next().unwrap_or_default();
    if keyword.is_empty() || !keyword.chars().all(|c| c.is_ascii_alphabetic() || c == '_') {
        return Some("规则必须以语句关键字开头".to_string());
    }
    if !KNOWN_STATEMENTS.contains(&keyword) {
        return Some(format!("未知的语句: {}", keyword));
    }
    if rule.split_whitespace().count() < 2 {
        return Some(format!("{} 缺少参数", keyword));
    }
    None
}

pub fn lint_rules(rules: &[String]) -> Vec<RuleWarning> {
    rules
        .iter()
        .enumerate()
        .filter_map(|(index, rule)| {
            lint_rule(rule).map(|message| RuleWarning {
                index,
                rule: rule.clone(),
                message,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rules_skips_comments_and_blanks() {
        let text = r#"
    ; allow the app to talk to su
    allow   appdomain su:unix_stream_socket { connectto getattr }

    # permissive for debugging
    permissive shell
"#;
        let rules = parse_rules(text);
        assert_eq!(
            rules,
            vec![
                "allow appdomain su:unix_stream_socket { connectto getattr }".to_string(),
                "permissive shell".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_rules_keeps_order() {
        let rules = parse_rules("type a\nattribute b\nallow a b file read\n");
        assert_eq!(rules[0], "type a");
        assert_eq!(rules[2], "allow a b file read");
    }

    #[test]
    fn test_format_rules() {
        assert_eq!(format_rules(&[]), "");
        let rules = vec!["type a".to_string(), "permissive a".to_string()];
        assert_eq!(format_rules(&rules), "type a\npermissive a\n");
        assert_eq!(parse_rules(&format_rules(&rules)), rules);
    }

    #[test]
    fn test_lint_rule() {
        assert!(lint_rule("allow magisk shell file read").is_none());
        assert!(lint_rule("type_transition a b file c").is_none());
        assert!(lint_rule("alow magisk shell file read").is_some());
        assert!(lint_rule("permissive").is_some());
        assert!(lint_rule("{ read }").is_some());
    }

    #[test]
    fn test_lint_rules_reports_index() {
        let rules = vec![
            "allow a b file read".to_string(),
            "bogus a".to_string(),
        ];
        let warnings = lint_rules(&rules);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].index, 1);
        assert_eq!(warnings[0].rule, "bogus a");
    }
}
