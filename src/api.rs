use crate::columns::{self, NewColumn};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{
    Attachment, ChangeType, ChangelogEntry, Column, Note, Notification, NotificationType,
    Priority, Project, Task, Todo,
};
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

pub const MAX_ATTACHMENTS_PER_TASK: usize = 5;
pub const MAX_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;
// Ids per `in.(..)` filter, keeps request URLs short.
const ID_CHUNK: usize = 100;
// Rows per page, below the server's default `max-rows` of 1000.
const PAGE_SIZE: usize = 500;

pub const ALLOWED_FILE_TYPES: [&str; 9] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "text/csv",
];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewChangelogEntry {
    pub task_id: String,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub from_value: Option<String>,
    pub to_value: Option<String>,
    pub project_name: Option<String>,
}

impl NewChangelogEntry {
    fn new(task_id: &str, change_type: ChangeType) -> Self {
        NewChangelogEntry {
            task_id: task_id.to_string(),
            change_type,
            from_value: None,
            to_value: None,
            project_name: None,
        }
    }

    fn change(task_id: &str, change_type: ChangeType, from: &str, to: &str) -> Self {
        NewChangelogEntry {
            from_value: Some(from.to_string()),
            to_value: Some(to.to_string()),
            ..NewChangelogEntry::new(task_id, change_type)
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl TaskUpdate {
    /// Update carrying only the fields an edit of title and description changed.
    pub fn from_edit(current: &Task, title: &str, description: &str) -> TaskUpdate {
        let title = title.trim();
        let description = description.trim();
        TaskUpdate {
            title: (!title.is_empty() && title != current.title).then(|| title.to_string()),
            description: (description != current.description.as_deref().unwrap_or("").trim())
                .then(|| description.to_string()),
            ..TaskUpdate::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == TaskUpdate::default()
    }

    /// Applies the update to a local copy of the row.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(status) = &self.status {
            task.status = status.clone();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(order) = self.order {
            task.order = order;
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_threshold_hours: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ColumnUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_done_column: Option<bool>,
}

/// Changelog rows describing the difference between `current` and `update`.
pub fn changelog_for_update(current: &Task, update: &TaskUpdate) -> Vec<NewChangelogEntry> {
    let mut entries = Vec::new();
    if let Some(status) = update.status.as_deref().filter(|s| *s != current.status) {
        entries.push(NewChangelogEntry::change(
            &current.id,
            ChangeType::Status,
            &current.status,
            status,
        ));
    }
    if let Some(priority) = update.priority.filter(|p| *p != current.priority) {
        entries.push(NewChangelogEntry::change(
            &current.id,
            ChangeType::Priority,
            current.priority.as_str(),
            priority.as_str(),
        ));
    }
    if let Some(title) = update.title.as_deref().filter(|t| *t != current.title) {
        entries.push(NewChangelogEntry::change(
            &current.id,
            ChangeType::Title,
            &current.title,
            title,
        ));
    }
    if let Some(description) = &update.description {
        if current.description.as_ref() != Some(description) {
            entries.push(NewChangelogEntry::new(&current.id, ChangeType::Description));
        }
    }
    entries
}

/// Changelog rows for moving a task to `target_status`, possibly in another project.
pub fn changelog_for_move(
    current: &Task,
    target_project: &Project,
    target_status: &str,
) -> Vec<NewChangelogEntry> {
    let mut entries = Vec::new();
    if target_project.id != current.project_id {
        entries.push(NewChangelogEntry {
            project_name: Some(target_project.name.clone()),
            ..NewChangelogEntry::new(&current.id, ChangeType::Moved)
        });
    }
    if target_status != current.status {
        entries.push(NewChangelogEntry::change(
            &current.id,
            ChangeType::Status,
            &current.status,
            target_status,
        ));
    }
    entries
}

/// Status rows for tasks pushed out of a deleted column.
pub fn changelog_for_column_removal(
    task_ids: &[String],
    removed_slug: &str,
    fallback_slug: &str,
) -> Vec<NewChangelogEntry> {
    task_ids
        .iter()
        .map(|id| NewChangelogEntry::change(id, ChangeType::Status, removed_slug, fallback_slug))
        .collect()
}

/// New `archived_at` for a task landing in `target_status`.
pub fn archive_stamp(
    current: &Task,
    target_status: &str,
    target_columns: &[Column],
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let into_done = columns::done_column(target_columns).is_some_and(|c| c.slug == target_status);
    if !into_done {
        None
    } else if current.archived_at.is_some() && current.status == target_status {
        current.archived_at
    } else {
        Some(now)
    }
}

pub fn validate_attachment(existing: usize, file_type: &str, file_size: u64) -> Result<()> {
    if existing >= MAX_ATTACHMENTS_PER_TASK {
        return Err(Error::Validation(format!(
            "A task can have at most {} attachments",
            MAX_ATTACHMENTS_PER_TASK
        )));
    }
    if file_size > MAX_FILE_SIZE_BYTES {
        return Err(Error::Validation("File exceeds the 5 MB limit".to_string()));
    }
    if !ALLOWED_FILE_TYPES.contains(&file_type) {
        return Err(Error::Validation(format!(
            "File type {} is not allowed",
            file_type
        )));
    }
    Ok(())
}

/// MIME type for a file name, when its extension is one we accept.
pub fn file_type_for(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "csv" => "text/csv",
        _ => return None,
    };
    Some(mime)
}

// Offset of the next page, or None once a short page shows the end.
fn next_offset(offset: usize, page_len: usize) -> Option<usize> {
    (page_len >= PAGE_SIZE).then_some(offset + page_len)
}

fn note_patch(content: &str, now: DateTime<Utc>) -> serde_json::Value {
    json!({ "content": content, "updated_at": now })
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

fn in_list(values: &[String]) -> String {
    format!("in.({})", values.join(","))
}

/// Client for the PostgREST endpoint of the hosted backend.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    anon_key: String,
    access_token: String,
    user_id: Option<String>,
}

impl ApiClient {
    pub fn new(config: &Config) -> ApiClient {
        ApiClient {
            client: Client::new(),
            base_url: format!("{}/rest/v1", config.url),
            anon_key: config.anon_key.clone(),
            access_token: config.access_token.clone(),
            user_id: config.user_id.clone(),
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.base_url, table))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.access_token))
    }

    fn write(&self, method: Method, table: &str) -> RequestBuilder {
        self.request(method, table)
            .header("Prefer", "return=representation")
    }

    async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let res = req.send().await?;

        if res.status().is_success() {
            Ok(res.json::<T>().await?)
        } else {
            let status = res.status().as_u16();
            let message = res.text().await?;
            log::warn!("api error {}: {}", status, message);
            Err(Error::Api { status, message })
        }
    }

    /// Follows `limit`/`offset` pages until the server returns a short one.
    /// `build` must apply a total order so pages do not overlap.
    async fn fetch_paged<T, F>(&self, build: F) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut rows = Vec::new();
        let mut offset = 0;
        loop {
            let req = build().query(&[("limit", PAGE_SIZE), ("offset", offset)]);
            let page: Vec<T> = self.fetch(req).await?;
            let page_len = page.len();
            rows.extend(page);
            match next_offset(offset, page_len) {
                Some(next) => offset = next,
                None => return Ok(rows),
            }
        }
    }

    async fn fetch_one<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
        self.fetch::<Vec<T>>(req)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(what.to_string()))
    }

    async fn execute(&self, req: RequestBuilder) -> Result<()> {
        let res = req.send().await?;

        if res.status().is_success() {
            Ok(())
        } else {
            let status = res.status().as_u16();
            let message = res.text().await?;
            log::warn!("api error {}: {}", status, message);
            Err(Error::Api { status, message })
        }
    }

    fn with_owner(&self, mut body: serde_json::Value) -> serde_json::Value {
        if let Some(user_id) = &self.user_id {
            body["user_id"] = json!(user_id);
        }
        body
    }

    // Projects

    pub async fn fetch_projects(&self) -> Result<Vec<Project>> {
        let req = self
            .request(Method::GET, "projects")
            .query(&[("select", "*"), ("order", "created_at.asc")]);
        self.fetch(req).await
    }

    /// Creates a project together with its default columns.
    pub async fn create_project(&self, name: &str, color: &str) -> Result<Project> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Project name cannot be empty".to_string()));
        }
        let body = self.with_owner(json!({ "name": name, "color": color }));
        let req = self.write(Method::POST, "projects").json(&body);
        let project: Project = self.fetch_one(req, "project").await?;

        for column in columns::default_columns() {
            self.create_column(&project.id, &column).await?;
        }
        log::info!("created project {} ({})", project.name, project.id);
        Ok(project)
    }

    pub async fn update_project(&self, id: &str, update: &ProjectUpdate) -> Result<Project> {
        let req = self
            .write(Method::PATCH, "projects")
            .query(&[("id", eq(id))])
            .json(update);
        self.fetch_one(req, "project").await
    }

    pub async fn delete_project(&self, id: &str) -> Result<()> {
        let req = self
            .request(Method::DELETE, "projects")
            .query(&[("id", eq(id))]);
        self.execute(req).await
    }

    // Columns

    pub async fn fetch_columns(&self, project_id: &str) -> Result<Vec<Column>> {
        let req = self.request(Method::GET, "project_columns").query(&[
            ("select", "*".to_string()),
            ("project_id", eq(project_id)),
            ("order", "order.asc".to_string()),
        ]);
        self.fetch(req).await
    }

    pub async fn create_column(&self, project_id: &str, column: &NewColumn) -> Result<Column> {
        let mut body = serde_json::to_value(column)?;
        body["project_id"] = json!(project_id);
        let req = self.write(Method::POST, "project_columns").json(&body);
        self.fetch_one(req, "column").await
    }

    pub async fn update_column(&self, id: &str, update: &ColumnUpdate) -> Result<Column> {
        let req = self
            .write(Method::PATCH, "project_columns")
            .query(&[("id", eq(id))])
            .json(update);
        self.fetch_one(req, "column").await
    }

    /// Makes `id` the done column, clearing the flag on the previous one first.
    pub async fn set_done_column(&self, columns: &[Column], id: &str) -> Result<Vec<Column>> {
        let mut updated = columns.to_vec();
        if let Some(previous) = columns::set_done_column(&mut updated, id)? {
            let clear = ColumnUpdate {
                is_done_column: Some(false),
                ..ColumnUpdate::default()
            };
            self.update_column(&previous, &clear).await?;
        }
        let set = ColumnUpdate {
            is_done_column: Some(true),
            ..ColumnUpdate::default()
        };
        self.update_column(id, &set).await?;
        Ok(updated)
    }

    pub async fn reorder_columns(
        &self,
        columns: &[Column],
        ordered_ids: &[String],
    ) -> Result<Vec<Column>> {
        let reordered = columns::reorder(columns, ordered_ids)?;
        for column in &reordered {
            let update = ColumnUpdate {
                order: Some(column.order),
                ..ColumnUpdate::default()
            };
            self.update_column(&column.id, &update).await?;
        }
        Ok(reordered)
    }

    /// Deletes a column after moving its tasks elsewhere and renumbers the rest.
    pub async fn delete_column(
        &self,
        project_id: &str,
        columns: &[Column],
        id: &str,
        move_tasks_to: Option<&str>,
    ) -> Result<Vec<Column>> {
        let plan = columns::plan_deletion(columns, id, move_tasks_to)?;

        if let Some(fallback) = &plan.fallback_slug {
            let req = self
                .write(Method::PATCH, "tasks")
                .query(&[
                    ("project_id", eq(project_id)),
                    ("status", eq(&plan.removed_slug)),
                ])
                .json(&json!({ "status": fallback }));
            let moved: Vec<Task> = self.fetch(req).await?;
            let ids: Vec<String> = moved.into_iter().map(|t| t.id).collect();
            self.append_changelog(&changelog_for_column_removal(
                &ids,
                &plan.removed_slug,
                fallback,
            ))
            .await?;
        }

        let req = self
            .request(Method::DELETE, "project_columns")
            .query(&[("id", eq(id))]);
        self.execute(req).await?;

        for (column_id, order) in &plan.renumbered {
            let update = ColumnUpdate {
                order: Some(*order),
                ..ColumnUpdate::default()
            };
            self.update_column(column_id, &update).await?;
        }
        log::info!("deleted column {}", plan.removed_slug);
        Ok(plan.remaining)
    }

    // Tasks

    pub async fn fetch_tasks(&self, project_id: &str) -> Result<Vec<Task>> {
        let req = self.request(Method::GET, "tasks").query(&[
            ("select", "*".to_string()),
            ("project_id", eq(project_id)),
            ("archived_at", "is.null".to_string()),
            ("order", "order.asc".to_string()),
        ]);
        self.fetch(req).await
    }

    pub async fn fetch_archived_tasks(&self, project_id: Option<&str>) -> Result<Vec<Task>> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("archived_at", "not.is.null".to_string()),
            ("order", "archived_at.desc".to_string()),
        ];
        if let Some(project_id) = project_id {
            query.push(("project_id", eq(project_id)));
        }
        let req = self.request(Method::GET, "tasks").query(&query);
        self.fetch(req).await
    }

    pub async fn create_task(
        &self,
        project_id: &str,
        title: &str,
        status: &str,
        priority: Priority,
        order: i32,
    ) -> Result<Task> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::Validation("Task title cannot be empty".to_string()));
        }

        let body = self.with_owner(json!({
            "project_id": project_id,
            "title": title,
            "status": status,
            "priority": priority,
            "order": order,
        }));
        let req = self.write(Method::POST, "tasks").json(&body);
        let task: Task = self.fetch_one(req, "task").await?;

        self.append_changelog(&[NewChangelogEntry::new(&task.id, ChangeType::Created)])
            .await?;
        log::info!("created task {} in {}", task.id, status);
        Ok(task)
    }

    pub async fn update_task(&self, current: &Task, update: &TaskUpdate) -> Result<Task> {
        let req = self
            .write(Method::PATCH, "tasks")
            .query(&[("id", eq(&current.id))])
            .json(update);
        let task: Task = self.fetch_one(req, "task").await?;

        self.append_changelog(&changelog_for_update(current, update))
            .await?;
        Ok(task)
    }

    pub async fn move_task(
        &self,
        current: &Task,
        target_project: &Project,
        target_columns: &[Column],
        target_status: &str,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        if !target_columns.iter().any(|c| c.slug == target_status) {
            return Err(Error::Validation(format!(
                "Column '{}' does not exist in {}",
                target_status, target_project.name
            )));
        }

        let body = json!({
            "project_id": target_project.id,
            "status": target_status,
            "archived_at": archive_stamp(current, target_status, target_columns, now),
        });
        let req = self
            .write(Method::PATCH, "tasks")
            .query(&[("id", eq(&current.id))])
            .json(&body);
        let task: Task = self.fetch_one(req, "task").await?;

        self.append_changelog(&changelog_for_move(current, target_project, target_status))
            .await?;
        Ok(task)
    }

    /// Puts an archived task back into the first column of its project.
    pub async fn unarchive_task(&self, current: &Task, columns: &[Column]) -> Result<Task> {
        let first = columns::first_column(columns)
            .ok_or_else(|| Error::NotFound("column".to_string()))?;
        let req = self
            .write(Method::PATCH, "tasks")
            .query(&[("id", eq(&current.id))])
            .json(&json!({ "status": first.slug, "archived_at": null }));
        let task: Task = self.fetch_one(req, "task").await?;

        if first.slug != current.status {
            self.append_changelog(&[NewChangelogEntry::change(
                &current.id,
                ChangeType::Status,
                &current.status,
                &first.slug,
            )])
            .await?;
        }
        Ok(task)
    }

    pub async fn delete_task(&self, id: &str) -> Result<()> {
        let req = self
            .request(Method::DELETE, "tasks")
            .query(&[("id", eq(id))]);
        self.execute(req).await
    }

    // Changelog

    async fn append_changelog(&self, entries: &[NewChangelogEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let req = self.request(Method::POST, "task_changelog").json(entries);
        self.execute(req).await
    }

    /// Changelog of one task, oldest first.
    pub async fn fetch_changelog(&self, task_id: &str) -> Result<Vec<ChangelogEntry>> {
        self.fetch_paged(|| {
            self.request(Method::GET, "task_changelog").query(&[
                ("select", "*".to_string()),
                ("task_id", eq(task_id)),
                ("order", "created_at.asc,id.asc".to_string()),
            ])
        })
        .await
    }

    /// Changelogs of several tasks keyed by task id, each oldest first.
    pub async fn fetch_changelogs(
        &self,
        task_ids: &[String],
    ) -> Result<HashMap<String, Vec<ChangelogEntry>>> {
        if task_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut rows: Vec<ChangelogEntry> = Vec::new();
        for chunk in task_ids.chunks(ID_CHUNK) {
            let filter = in_list(chunk);
            let page: Vec<ChangelogEntry> = self
                .fetch_paged(|| {
                    self.request(Method::GET, "task_changelog").query(&[
                        ("select", "*".to_string()),
                        ("task_id", filter.clone()),
                        ("order", "created_at.asc,id.asc".to_string()),
                    ])
                })
                .await?;
            rows.extend(page);
        }
        Ok(group_by_task(rows))
    }

    /// Every task of a project, archived ones included.
    pub async fn fetch_all_project_tasks(&self, project_id: &str) -> Result<Vec<Task>> {
        let req = self.request(Method::GET, "tasks").query(&[
            ("select", "*".to_string()),
            ("project_id", eq(project_id)),
        ]);
        self.fetch(req).await
    }

    // Todos

    pub async fn fetch_todos(&self) -> Result<Vec<Todo>> {
        let req = self
            .request(Method::GET, "todos")
            .query(&[("select", "*"), ("order", "created_at.asc")]);
        self.fetch(req).await
    }

    pub async fn create_todo(&self, text: &str) -> Result<Todo> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("Todo cannot be empty".to_string()));
        }
        let body = self.with_owner(json!({ "text": text }));
        let req = self.write(Method::POST, "todos").json(&body);
        self.fetch_one(req, "todo").await
    }

    pub async fn toggle_todo(&self, todo: &Todo) -> Result<Todo> {
        let req = self
            .write(Method::PATCH, "todos")
            .query(&[("id", eq(&todo.id))])
            .json(&json!({ "completed": !todo.completed }));
        self.fetch_one(req, "todo").await
    }

    pub async fn delete_todo(&self, id: &str) -> Result<()> {
        let req = self.request(Method::DELETE, "todos").query(&[("id", eq(id))]);
        self.execute(req).await
    }

    // Notes

    pub async fn fetch_note(&self) -> Result<Option<Note>> {
        let req = self
            .request(Method::GET, "notes")
            .query(&[("select", "*"), ("limit", "1")]);
        let notes: Vec<Note> = self.fetch(req).await?;
        Ok(notes.into_iter().next())
    }

    /// Updates the existing note or inserts the first one.
    pub async fn save_note(
        &self,
        existing: Option<&Note>,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Note> {
        match existing {
            Some(note) => {
                let req = self
                    .write(Method::PATCH, "notes")
                    .query(&[("id", eq(&note.id))])
                    .json(&note_patch(content, now));
                self.fetch_one(req, "note").await
            }
            None => {
                let body = self.with_owner(json!({ "content": content }));
                let req = self.write(Method::POST, "notes").json(&body);
                self.fetch_one(req, "note").await
            }
        }
    }

    // Notifications

    pub async fn fetch_notifications(&self) -> Result<Vec<Notification>> {
        let req = self
            .request(Method::GET, "notifications")
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        self.fetch(req).await
    }

    pub async fn create_notification(
        &self,
        notification_type: NotificationType,
        project_id: Option<&str>,
        task_id: Option<&str>,
        title: &str,
        body: Option<&str>,
    ) -> Result<()> {
        let payload = self.with_owner(json!({
            "type": notification_type,
            "project_id": project_id,
            "task_id": task_id,
            "title": title,
            "body": body,
        }));
        let req = self.request(Method::POST, "notifications").json(&payload);
        self.execute(req).await
    }

    pub async fn mark_notification_read(&self, id: &str) -> Result<()> {
        let req = self
            .request(Method::PATCH, "notifications")
            .query(&[("id", eq(id))])
            .json(&json!({ "is_read": true }));
        self.execute(req).await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<()> {
        let req = self
            .request(Method::PATCH, "notifications")
            .query(&[("is_read", "eq.false")])
            .json(&json!({ "is_read": true }));
        self.execute(req).await
    }

    pub async fn delete_notification(&self, id: &str) -> Result<()> {
        let req = self
            .request(Method::DELETE, "notifications")
            .query(&[("id", eq(id))]);
        self.execute(req).await
    }

    // Attachments

    pub async fn fetch_attachments(&self, task_id: &str) -> Result<Vec<Attachment>> {
        let req = self.request(Method::GET, "task_attachments").query(&[
            ("select", "*".to_string()),
            ("task_id", eq(task_id)),
            ("order", "created_at.desc".to_string()),
        ]);
        self.fetch(req).await
    }

    pub async fn fetch_attachment_counts(
        &self,
        task_ids: &[String],
    ) -> Result<HashMap<String, usize>> {
        if task_ids.is_empty() {
            return Ok(HashMap::new());
        }
        #[derive(serde::Deserialize)]
        struct Row {
            task_id: String,
        }
        let mut rows: Vec<Row> = Vec::new();
        for chunk in task_ids.chunks(ID_CHUNK) {
            let filter = in_list(chunk);
            let page: Vec<Row> = self
                .fetch_paged(|| {
                    self.request(Method::GET, "task_attachments").query(&[
                        ("select", "task_id".to_string()),
                        ("task_id", filter.clone()),
                        ("order", "id.asc".to_string()),
                    ])
                })
                .await?;
            rows.extend(page);
        }
        let mut counts = HashMap::new();
        for row in rows {
            *counts.entry(row.task_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Records attachment metadata for a task once the file passes the limits.
    pub async fn add_attachment(
        &self,
        task_id: &str,
        existing: usize,
        file_name: &str,
        file_size: u64,
        storage_path: &str,
    ) -> Result<Attachment> {
        let file_type = file_type_for(file_name).ok_or_else(|| {
            Error::Validation(format!("File type of {} is not allowed", file_name))
        })?;
        validate_attachment(existing, file_type, file_size)?;

        let body = self.with_owner(json!({
            "task_id": task_id,
            "file_name": file_name,
            "file_type": file_type,
            "file_size": file_size,
            "storage_path": storage_path,
        }));
        let req = self.write(Method::POST, "task_attachments").json(&body);
        let attachment: Attachment = self.fetch_one(req, "attachment").await?;

        let mut entry = NewChangelogEntry::new(task_id, ChangeType::AttachmentAdded);
        entry.to_value = Some(attachment.file_name.clone());
        self.append_changelog(&[entry]).await?;
        Ok(attachment)
    }

    pub async fn remove_attachment(&self, attachment: &Attachment) -> Result<()> {
        let req = self
            .request(Method::DELETE, "task_attachments")
            .query(&[("id", eq(&attachment.id))]);
        self.execute(req).await?;

        let mut entry = NewChangelogEntry::new(&attachment.task_id, ChangeType::AttachmentRemoved);
        entry.from_value = Some(attachment.file_name.clone());
        self.append_changelog(&[entry]).await
    }
}

fn group_by_task(rows: Vec<ChangelogEntry>) -> HashMap<String, Vec<ChangelogEntry>> {
    let mut grouped: HashMap<String, Vec<ChangelogEntry>> = HashMap::new();
    for row in rows {
        grouped.entry(row.task_id.clone()).or_default().push(row);
    }
    for entries in grouped.values_mut() {
        entries.sort_by_key(|e| e.created_at);
    }
    grouped
}
