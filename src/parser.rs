use crate::models::Priority;
use regex::Regex;

/// Result of parsing the quick-add line of the task prompt.
#[derive(Debug, PartialEq)]
pub struct ParsedTask {
    pub title: String,
    pub priority: Option<Priority>,
    /// Column slug picked with `#slug`.
    pub status: Option<String>,
}

fn parse_priority(token: &str) -> Option<Priority> {
    match token.to_lowercase().as_str() {
        "low" | "l" | "1" => Some(Priority::Low),
        "medium" | "med" | "m" | "2" => Some(Priority::Medium),
        "high" | "h" | "3" => Some(Priority::High),
        _ => None,
    }
}

pub fn parse_task_input(input: &str) -> ParsedTask {
    let priority_re = Regex::new(r"!(\w+)\s*").unwrap();
    let column_re = Regex::new(r"(?:^|\s)#([a-z0-9][a-z0-9-]*)").unwrap();
    let spaces_re = Regex::new(r"\s+").unwrap();

    // first recognised token wins, unknown ones are still stripped
    let priority = priority_re
        .captures_iter(input)
        .filter_map(|caps| caps.get(1).and_then(|m| parse_priority(m.as_str())))
        .next();

    let status = column_re
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    let stripped = priority_re.replace_all(input, "");
    let stripped = column_re.replace_all(&stripped, " ");
    let title = spaces_re.replace_all(&stripped, " ").trim().to_string();

    ParsedTask {
        title,
        priority,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(
        "Rotate API keys !high before Friday",
        "Rotate API keys before Friday",
        Some(Priority::High)
    )]
    #[case("!H Renew TLS certificate", "Renew TLS certificate", Some(Priority::High))]
    #[case(
        "Review   onboarding !m   checklist",
        "Review onboarding checklist",
        Some(Priority::Medium)
    )]
    #[case("Archive old sprints !1", "Archive old sprints", Some(Priority::Low))]
    #[case(" !low !high  Tidy   backlog !medium ", "Tidy backlog", Some(Priority::Low))]
    #[case("Call vendor !asap today", "Call vendor today", None)]
    #[case("!asap !3 Restore backups", "Restore backups", Some(Priority::High))]
    #[case("Plain title", "Plain title", None)]
    fn test_priority_tokens(
        #[case] input: &str,
        #[case] title: &str,
        #[case] priority: Option<Priority>,
    ) {
        let parsed = parse_task_input(input);
        assert_eq!(parsed.title, title);
        assert_eq!(parsed.priority, priority);
        assert_eq!(parsed.status, None);
    }

    #[test]
    fn test_column_and_priority_together() {
        assert_eq!(
            parse_task_input("#in-progress Migrate billing tables !h"),
            ParsedTask {
                title: "Migrate billing tables".to_string(),
                priority: Some(Priority::High),
                status: Some("in-progress".to_string()),
            }
        );
    }

    #[test]
    fn test_first_column_tag_is_used() {
        let parsed = parse_task_input("Ship release #review #done");
        assert_eq!(parsed.status.as_deref(), Some("review"));
        assert_eq!(parsed.title, "Ship release");
    }

    #[test]
    fn test_hash_inside_word_is_not_a_column() {
        let parsed = parse_task_input("Close ticket#42 upstream");
        assert_eq!(parsed.title, "Close ticket#42 upstream");
        assert_eq!(parsed.status, None);
    }
}
