use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_STALE_THRESHOLD_HOURS: u32 = 48;

// Project row
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub stale_threshold_hours: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn stale_threshold_hours(&self) -> u32 {
        self.stale_threshold_hours
            .unwrap_or(DEFAULT_STALE_THRESHOLD_HOURS)
            .max(1)
    }
}

// Column row, `slug` is what tasks store as their status
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Column {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub color: Option<String>,
    pub order: i32,
    pub is_done_column: bool,
}

impl Column {
    /// Time spent here counts as work: not the first column and not the done column.
    pub fn is_work_column(&self) -> bool {
        self.order > 0 && !self.is_done_column
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn next(self) -> Priority {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High => Priority::Low,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Task row
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: String,
    #[serde(default)]
    pub priority: Priority,
    pub order: i32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Status,
    Priority,
    Title,
    Moved,
    Description,
    AttachmentAdded,
    AttachmentRemoved,
}

impl ChangeType {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeType::Created => "Created",
            ChangeType::Status => "Status",
            ChangeType::Priority => "Priority",
            ChangeType::Title => "Title",
            ChangeType::Moved => "Moved",
            ChangeType::Description => "Description",
            ChangeType::AttachmentAdded => "Attachment added",
            ChangeType::AttachmentRemoved => "Attachment removed",
        }
    }
}

// Changelog row, append-only
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ChangelogEntry {
    pub id: String,
    pub task_id: String,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    #[serde(default)]
    pub from_value: Option<String>,
    #[serde(default)]
    pub to_value: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Todo {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Note {
    pub id: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    TaskCreated,
    TaskUpdated,
    StatusChanged,
    PriorityChanged,
    TaskArchived,
    TaskDeleted,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Notification {
    pub id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// Attachment metadata, the file itself lives in object storage
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Attachment {
    pub id: String,
    pub task_id: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
}

/// One visit of a task to a work column.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkTimeEntry {
    pub column_slug: String,
    pub column_name: String,
    pub start_time: DateTime<Utc>,
    /// `None` while the task is still sitting in the column.
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaskWorkTime {
    pub task_id: String,
    pub task_title: Option<String>,
    pub total_work_time_ms: i64,
    pub entries: Vec<WorkTimeEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnTotal {
    pub column_slug: String,
    pub column_name: String,
    pub total_time_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectTimeReport {
    pub project_id: String,
    pub project_name: String,
    pub total_work_time_ms: i64,
    pub task_breakdown: Vec<TaskWorkTime>,
    pub column_breakdown: Vec<ColumnTotal>,
    /// Instant used as the end of ongoing intervals.
    pub generated_at: DateTime<Utc>,
}
