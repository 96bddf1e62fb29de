use crate::models::{ChangeType, ChangelogEntry, Column, Project, Task};
use chrono::{DateTime, Utc};

/// Instant the task entered its current column.
///
/// That is the latest `status` change into the current status, or the
/// creation time when the task never moved.
pub fn stage_entered_at(task: &Task, changelog: &[ChangelogEntry]) -> DateTime<Utc> {
    changelog
        .iter()
        .filter(|e| {
            e.change_type == ChangeType::Status
                && e.to_value.as_deref() == Some(task.status.as_str())
        })
        .map(|e| e.created_at)
        .max()
        .unwrap_or(task.created_at)
}

pub fn time_in_stage_ms(task: &Task, changelog: &[ChangelogEntry], now: DateTime<Utc>) -> i64 {
    (now - stage_entered_at(task, changelog))
        .num_milliseconds()
        .max(0)
}

/// Tasks in the done column are never stale.
pub fn is_stale(
    task: &Task,
    changelog: &[ChangelogEntry],
    project: &Project,
    columns: &[Column],
    now: DateTime<Utc>,
) -> bool {
    let in_done = columns
        .iter()
        .any(|c| c.slug == task.status && c.is_done_column);
    if in_done {
        return false;
    }
    let threshold_ms = i64::from(project.stale_threshold_hours()) * 3_600_000;
    time_in_stage_ms(task, changelog, now) > threshold_ms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use chrono::Duration;

    fn base() -> DateTime<Utc> {
        "2024-05-01T09:00:00Z".parse().unwrap()
    }

    fn task(status: &str) -> Task {
        Task {
            id: "t1".to_string(),
            project_id: "p1".to_string(),
            title: "Ship it".to_string(),
            description: None,
            status: status.to_string(),
            priority: Priority::High,
            order: 0,
            created_at: base(),
            archived_at: None,
            updated_at: None,
        }
    }

    fn moved(to: &str, at: DateTime<Utc>) -> ChangelogEntry {
        ChangelogEntry {
            id: format!("c-{}", to),
            task_id: "t1".to_string(),
            change_type: ChangeType::Status,
            from_value: Some("todo".to_string()),
            to_value: Some(to.to_string()),
            project_name: None,
            created_at: at,
        }
    }

    fn project(hours: Option<u32>) -> Project {
        Project {
            id: "p1".to_string(),
            name: "Board".to_string(),
            color: "#fff".to_string(),
            stale_threshold_hours: hours,
            created_at: base(),
        }
    }

    fn columns() -> Vec<Column> {
        ["todo", "doing", "done"]
            .iter()
            .enumerate()
            .map(|(i, slug)| Column {
                id: slug.to_string(),
                project_id: "p1".to_string(),
                name: slug.to_string(),
                slug: slug.to_string(),
                color: None,
                order: i as i32,
                is_done_column: *slug == "done",
            })
            .collect()
    }

    #[test]
    fn test_never_moved_task_counts_from_creation() {
        let now = base() + Duration::hours(3);
        assert_eq!(time_in_stage_ms(&task("todo"), &[], now), 3 * 3_600_000);
    }

    #[test]
    fn test_uses_latest_entry_into_current_status() {
        let log = vec![
            moved("doing", base() + Duration::hours(1)),
            moved("todo", base() + Duration::hours(2)),
            moved("doing", base() + Duration::hours(5)),
        ];
        let now = base() + Duration::hours(6);
        assert_eq!(
            stage_entered_at(&task("doing"), &log),
            base() + Duration::hours(5)
        );
        assert_eq!(time_in_stage_ms(&task("doing"), &log, now), 3_600_000);
    }

    #[test]
    fn test_stale_after_threshold() {
        let log = vec![moved("doing", base())];
        let now = base() + Duration::hours(49);
        assert!(is_stale(&task("doing"), &log, &project(None), &columns(), now));
        assert!(!is_stale(
            &task("doing"),
            &log,
            &project(Some(72)),
            &columns(),
            now
        ));
    }

    #[test]
    fn test_done_tasks_are_never_stale() {
        let now = base() + Duration::days(30);
        assert!(!is_stale(&task("done"), &[], &project(Some(1)), &columns(), now));
    }
}
