use crate::models::{
    ChangeType, ChangelogEntry, Column, ColumnTotal, Project, ProjectTimeReport, Task,
    TaskWorkTime, WorkTimeEntry,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

fn find_column<'a>(slug: &str, columns: &'a [Column]) -> Option<&'a Column> {
    columns.iter().find(|c| c.slug == slug)
}

// A slug that no longer matches any column never counts as work.
fn is_work_column(slug: &str, columns: &[Column]) -> bool {
    find_column(slug, columns).is_some_and(Column::is_work_column)
}

fn column_name(slug: &str, columns: &[Column]) -> String {
    find_column(slug, columns)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| slug.to_string())
}

/// Derives the time a task spent in work columns from its changelog.
///
/// `changelog` must be in ascending `created_at` order. Entries other than
/// `created` and `status` are ignored. A visit that has not ended yet runs
/// until `now` and is reported with `end_time: None`.
pub fn calculate_task_work_time(
    task_id: &str,
    changelog: &[ChangelogEntry],
    columns: &[Column],
    now: DateTime<Utc>,
) -> TaskWorkTime {
    let transitions: Vec<&ChangelogEntry> = changelog
        .iter()
        .filter(|e| matches!(e.change_type, ChangeType::Created | ChangeType::Status))
        .collect();

    let mut entries = Vec::new();
    let mut total_work_time_ms = 0;

    for (i, entry) in transitions.iter().enumerate() {
        // `created` only tells us the initial column, which is never a work interval
        if entry.change_type != ChangeType::Status {
            continue;
        }
        let Some(entered) = entry.to_value.as_deref() else {
            continue;
        };
        if !is_work_column(entered, columns) {
            continue;
        }

        let next = transitions.get(i + 1);
        let start_time = entry.created_at;
        let end = next.map_or(now, |n| n.created_at);
        let duration_ms = (end - start_time).num_milliseconds();

        entries.push(WorkTimeEntry {
            column_slug: entered.to_string(),
            column_name: column_name(entered, columns),
            start_time,
            end_time: next.map(|n| n.created_at),
            duration_ms,
        });
        total_work_time_ms += duration_ms;
    }

    TaskWorkTime {
        task_id: task_id.to_string(),
        task_title: None,
        total_work_time_ms,
        entries,
    }
}

/// Builds the work-time report for every task of a project.
///
/// Tasks without any work time are left out of the task breakdown. Both
/// breakdowns are sorted by total time, longest first.
pub fn calculate_project_work_time(
    project: &Project,
    tasks: &[Task],
    changelogs: &HashMap<String, Vec<ChangelogEntry>>,
    columns: &[Column],
    now: DateTime<Utc>,
) -> ProjectTimeReport {
    let mut task_breakdown = Vec::new();
    let mut column_breakdown: Vec<ColumnTotal> = Vec::new();

    for task in tasks {
        let changelog = changelogs
            .get(&task.id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let mut work_time = calculate_task_work_time(&task.id, changelog, columns, now);
        if work_time.total_work_time_ms <= 0 {
            continue;
        }

        for entry in &work_time.entries {
            match column_breakdown
                .iter_mut()
                .find(|c| c.column_slug == entry.column_slug)
            {
                Some(total) => total.total_time_ms += entry.duration_ms,
                None => column_breakdown.push(ColumnTotal {
                    column_slug: entry.column_slug.clone(),
                    column_name: entry.column_name.clone(),
                    total_time_ms: entry.duration_ms,
                }),
            }
        }

        work_time.task_title = Some(task.title.clone());
        task_breakdown.push(work_time);
    }

    task_breakdown.sort_by(|a, b| b.total_work_time_ms.cmp(&a.total_work_time_ms));
    column_breakdown.sort_by(|a, b| b.total_time_ms.cmp(&a.total_time_ms));

    let total_work_time_ms = task_breakdown.iter().map(|t| t.total_work_time_ms).sum();

    log::debug!(
        "work-time report for {}: {} tasks, {} ms",
        project.name,
        task_breakdown.len(),
        total_work_time_ms
    );

    ProjectTimeReport {
        project_id: project.id.clone(),
        project_name: project.name.clone(),
        total_work_time_ms,
        task_breakdown,
        column_breakdown,
        generated_at: now,
    }
}

// "< 1m", "45m", "2h", "2h 30m"
pub fn format_work_time(ms: i64) -> String {
    if ms < 60_000 {
        return "< 1m".to_string();
    }
    let total_minutes = ms / 60_000;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    match (hours, minutes) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}

pub fn format_work_time_long(ms: i64) -> String {
    if ms < 60_000 {
        return "Less than 1 minute".to_string();
    }
    let total_minutes = ms / 60_000;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    let hour_str = if hours == 1 {
        "1 hour".to_string()
    } else {
        format!("{} hours", hours)
    };
    let min_str = if minutes == 1 {
        "1 minute".to_string()
    } else {
        format!("{} minutes", minutes)
    };

    match (hours, minutes) {
        (0, _) => min_str,
        (_, 0) => hour_str,
        _ => format!("{} {}", hour_str, min_str),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn column(slug: &str, order: i32, done: bool) -> Column {
        Column {
            id: format!("col-{}", slug),
            project_id: "p1".to_string(),
            name: slug.to_uppercase(),
            slug: slug.to_string(),
            color: None,
            order,
            is_done_column: done,
        }
    }

    fn created(task_id: &str, ms: i64) -> ChangelogEntry {
        ChangelogEntry {
            id: format!("{}-created", task_id),
            task_id: task_id.to_string(),
            change_type: ChangeType::Created,
            from_value: None,
            to_value: None,
            project_name: None,
            created_at: at(ms),
        }
    }

    fn status(task_id: &str, from: &str, to: &str, ms: i64) -> ChangelogEntry {
        ChangelogEntry {
            id: format!("{}-{}-{}", task_id, to, ms),
            task_id: task_id.to_string(),
            change_type: ChangeType::Status,
            from_value: Some(from.to_string()),
            to_value: Some(to.to_string()),
            project_name: None,
            created_at: at(ms),
        }
    }

    fn task(id: &str, title: &str) -> Task {
        Task {
            id: id.to_string(),
            project_id: "p1".to_string(),
            title: title.to_string(),
            description: None,
            status: "todo".to_string(),
            priority: Priority::Medium,
            order: 0,
            created_at: at(0),
            archived_at: None,
            updated_at: None,
        }
    }

    #[fixture]
    fn columns() -> Vec<Column> {
        vec![
            column("todo", 0, false),
            column("doing", 1, false),
            column("review", 2, false),
            column("done", 3, true),
        ]
    }

    #[fixture]
    fn project() -> Project {
        Project {
            id: "p1".to_string(),
            name: "Board".to_string(),
            color: "#e9a23b".to_string(),
            stale_threshold_hours: None,
            created_at: at(0),
        }
    }

    #[test]
    fn test_reference_scenario() {
        let columns = vec![
            column("todo", 0, false),
            column("doing", 1, false),
            column("done", 2, true),
        ];
        let changelog = vec![
            created("t1", 1000),
            status("t1", "todo", "doing", 2000),
            status("t1", "doing", "done", 5000),
        ];

        let result = calculate_task_work_time("t1", &changelog, &columns, at(9000));

        assert_eq!(result.total_work_time_ms, 3000);
        assert_eq!(result.entries.len(), 1);
        let entry = &result.entries[0];
        assert_eq!(entry.column_slug, "doing");
        assert_eq!(entry.column_name, "DOING");
        assert_eq!(entry.start_time, at(2000));
        assert_eq!(entry.end_time, Some(at(5000)));
        assert_eq!(entry.duration_ms, 3000);
    }

    #[rstest]
    fn test_no_status_entries_yields_nothing(columns: Vec<Column>) {
        let changelog = vec![created("t1", 1000)];
        let result = calculate_task_work_time("t1", &changelog, &columns, at(50_000));
        assert_eq!(result.total_work_time_ms, 0);
        assert!(result.entries.is_empty());
    }

    #[rstest]
    fn test_empty_changelog_yields_nothing(columns: Vec<Column>) {
        let result = calculate_task_work_time("t1", &[], &columns, at(50_000));
        assert_eq!(result.total_work_time_ms, 0);
        assert!(result.entries.is_empty());
    }

    #[rstest]
    fn test_only_non_work_targets_yield_zero(columns: Vec<Column>) {
        let changelog = vec![
            created("t1", 1000),
            status("t1", "todo", "done", 2000),
            status("t1", "done", "todo", 4000),
        ];
        let result = calculate_task_work_time("t1", &changelog, &columns, at(50_000));
        assert_eq!(result.total_work_time_ms, 0);
        assert!(result.entries.is_empty());
    }

    #[rstest]
    fn test_ongoing_visit_runs_until_now(columns: Vec<Column>) {
        let changelog = vec![created("t1", 1000), status("t1", "todo", "doing", 2000)];
        let result = calculate_task_work_time("t1", &changelog, &columns, at(10_500));

        assert_eq!(result.total_work_time_ms, 8500);
        assert_eq!(result.entries[0].end_time, None);
        assert_eq!(result.entries[0].duration_ms, 8500);
    }

    #[rstest]
    fn test_multiple_visits_sum(columns: Vec<Column>) {
        let changelog = vec![
            created("t1", 0),
            status("t1", "todo", "doing", 1000),
            status("t1", "doing", "review", 4000),
            status("t1", "review", "doing", 6000),
            status("t1", "doing", "done", 7000),
        ];
        let result = calculate_task_work_time("t1", &changelog, &columns, at(100_000));

        let durations: Vec<i64> = result.entries.iter().map(|e| e.duration_ms).collect();
        assert_eq!(durations, vec![3000, 2000, 1000]);
        assert_eq!(result.total_work_time_ms, 6000);
    }

    #[rstest]
    fn test_other_change_types_do_not_split_intervals(columns: Vec<Column>) {
        let mut title_change = status("t1", "old", "new", 3000);
        title_change.change_type = ChangeType::Title;
        let changelog = vec![
            created("t1", 0),
            status("t1", "todo", "doing", 1000),
            title_change,
            status("t1", "doing", "done", 5000),
        ];
        let result = calculate_task_work_time("t1", &changelog, &columns, at(100_000));
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.total_work_time_ms, 4000);
    }

    #[rstest]
    fn test_deleted_column_is_not_work(columns: Vec<Column>) {
        let changelog = vec![
            created("t1", 0),
            status("t1", "todo", "qa", 1000),
            status("t1", "qa", "done", 5000),
        ];
        let result = calculate_task_work_time("t1", &changelog, &columns, at(100_000));
        assert_eq!(result.total_work_time_ms, 0);
    }

    #[rstest]
    fn test_inputs_are_not_consumed_and_result_is_repeatable(columns: Vec<Column>) {
        let changelog = vec![created("t1", 0), status("t1", "todo", "doing", 1000)];
        let first = calculate_task_work_time("t1", &changelog, &columns, at(2000));
        let second = calculate_task_work_time("t1", &changelog, &columns, at(2000));
        assert_eq!(first, second);
    }

    #[rstest]
    fn test_project_report_sorts_and_balances(columns: Vec<Column>, project: Project) {
        let tasks = vec![task("a", "Short"), task("b", "Long"), task("c", "Idle")];
        let mut changelogs = HashMap::new();
        changelogs.insert(
            "a".to_string(),
            vec![
                created("a", 0),
                status("a", "todo", "review", 1000),
                status("a", "review", "done", 2000),
            ],
        );
        changelogs.insert(
            "b".to_string(),
            vec![
                created("b", 0),
                status("b", "todo", "doing", 1000),
                status("b", "doing", "review", 6000),
                status("b", "review", "done", 7000),
            ],
        );
        changelogs.insert("c".to_string(), vec![created("c", 0)]);

        let report =
            calculate_project_work_time(&project, &tasks, &changelogs, &columns, at(10_000));

        let order: Vec<&str> = report
            .task_breakdown
            .iter()
            .map(|t| t.task_id.as_str())
            .collect();
        assert_eq!(order, vec!["b", "a"]);
        assert_eq!(report.task_breakdown[0].task_title.as_deref(), Some("Long"));

        let cols: Vec<(&str, i64)> = report
            .column_breakdown
            .iter()
            .map(|c| (c.column_slug.as_str(), c.total_time_ms))
            .collect();
        assert_eq!(cols, vec![("doing", 5000), ("review", 2000)]);

        let column_sum: i64 = report.column_breakdown.iter().map(|c| c.total_time_ms).sum();
        let task_sum: i64 = report
            .task_breakdown
            .iter()
            .map(|t| t.total_work_time_ms)
            .sum();
        assert_eq!(column_sum, task_sum);
        assert_eq!(report.total_work_time_ms, 7000);
        assert_eq!(report.generated_at, at(10_000));
    }

    #[rstest]
    fn test_project_report_for_task_without_changelog(columns: Vec<Column>, project: Project) {
        let tasks = vec![task("a", "Orphan")];
        let report =
            calculate_project_work_time(&project, &tasks, &HashMap::new(), &columns, at(10_000));
        assert!(report.task_breakdown.is_empty());
        assert!(report.column_breakdown.is_empty());
        assert_eq!(report.total_work_time_ms, 0);
    }

    #[rstest]
    #[case(0, "< 1m")]
    #[case(59_999, "< 1m")]
    #[case(45 * 60_000, "45m")]
    #[case(2 * 3_600_000, "2h")]
    #[case(2 * 3_600_000 + 30 * 60_000, "2h 30m")]
    fn test_format_work_time(#[case] ms: i64, #[case] expected: &str) {
        assert_eq!(format_work_time(ms), expected);
    }

    #[rstest]
    #[case(30_000, "Less than 1 minute")]
    #[case(60_000, "1 minute")]
    #[case(3_600_000, "1 hour")]
    #[case(3_660_000, "1 hour 1 minute")]
    #[case(2 * 3_600_000 + 30 * 60_000, "2 hours 30 minutes")]
    fn test_format_work_time_long(#[case] ms: i64, #[case] expected: &str) {
        assert_eq!(format_work_time_long(ms), expected);
    }
}
