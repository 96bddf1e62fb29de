use crate::api::{archive_stamp, ApiClient, ColumnUpdate, ProjectUpdate, TaskUpdate};
use crate::columns;
use crate::error::{Error, Result};
use crate::models::{Attachment, Column, NotificationType, Priority, Project, Task};
use crate::parser::parse_task_input;
use crate::stage;
use crate::store::{Action, BoardState, Collection, Store};
use crate::worktime::calculate_project_work_time;
use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use mockable::Clock;
use ratatui::widgets::ListState;
use std::io;
use std::path::Path;

const PROJECT_COLORS: [&str; 6] = [
    "#e9a23b", "#7fb069", "#5b8def", "#d16ba5", "#e4572e", "#8e7dbe",
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum View {
    Board,
    Todos,
    Notes,
    Notifications,
    Archive,
    Report,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputMode {
    Normal,
    Editing,
    Insert,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ActiveInput {
    Title,
    Description,
}

/// What the input popup is collecting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Prompt {
    Task,
    Todo,
    Column,
    RenameColumn,
    Project,
    RenameProject,
    EditTask,
    ArchiveSearch,
    DeleteProject,
    Attachment,
    Note,
}

impl Prompt {
    /// Prompts with a second, description field.
    pub fn has_description(self) -> bool {
        matches!(self, Prompt::Task | Prompt::EditTask)
    }
}

pub struct App<C: Clock> {
    api: ApiClient,
    clock: C,
    pub store: Store,
    pub view: View,
    pub input_mode: InputMode,
    pub prompt: Prompt,
    pub active_input: ActiveInput,
    pub input_title: String,
    pub input_description: String,
    pub selected_column: usize,
    pub selected_row: usize,
    pub show_detail: bool,
    pub detail_attachments: Vec<Attachment>,
    pub list_state: ListState,
    /// Priorities shown on the board; empty shows every task.
    pub priority_filter: Vec<Priority>,
    /// Case-insensitive text the archive list is narrowed to.
    pub archive_query: String,
}

impl<C: Clock> App<C> {
    pub fn new(api: ApiClient, clock: C) -> App<C> {
        App {
            api,
            clock,
            store: Store::new(),
            view: View::Board,
            input_mode: InputMode::Normal,
            prompt: Prompt::Task,
            active_input: ActiveInput::Title,
            input_title: String::new(),
            input_description: String::new(),
            selected_column: 0,
            selected_row: 0,
            show_detail: false,
            detail_attachments: Vec::new(),
            list_state: ListState::default(),
            priority_filter: Vec::new(),
            archive_query: String::new(),
        }
    }

    pub fn state(&self) -> &BoardState {
        self.store.state()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    fn report_error(&mut self, context: &str, err: crate::error::Error) {
        self.store.dispatch(Action::Failed(format!("{}: {}", context, err)));
    }

    // Loading

    pub async fn load_all(&mut self) {
        if let Err(err) = self.refresh_projects().await {
            self.report_error("Error fetching projects", err);
        }
        if let Err(err) = self.refresh_board().await {
            self.report_error("Error fetching board", err);
        }
        if let Err(err) = self.refresh_notifications().await {
            self.report_error("Error fetching notifications", err);
        }
    }

    pub async fn refresh_projects(&mut self) -> Result<()> {
        let generation = self.store.begin(Collection::Projects);
        let projects = self.api.fetch_projects().await?;
        self.store.dispatch(Action::ProjectsLoaded {
            generation,
            projects,
        });
        Ok(())
    }

    pub async fn refresh_board(&mut self) -> Result<()> {
        let Some(project_id) = self.state().active_project_id.clone() else {
            return Ok(());
        };
        let generation = self.store.begin(Collection::Board);
        let columns = self.api.fetch_columns(&project_id).await?;
        let tasks = self.api.fetch_tasks(&project_id).await?;
        let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        let changelogs = self.api.fetch_changelogs(&ids).await?;
        let attachment_counts = self.api.fetch_attachment_counts(&ids).await?;
        log::debug!("loaded {} tasks for project {}", tasks.len(), project_id);
        self.store.dispatch(Action::BoardLoaded {
            generation,
            project_id,
            columns,
            tasks,
            changelogs,
            attachment_counts,
        });
        self.clamp_selection();
        Ok(())
    }

    pub async fn refresh_todos(&mut self) -> Result<()> {
        let generation = self.store.begin(Collection::Todos);
        let todos = self.api.fetch_todos().await?;
        self.store
            .dispatch(Action::TodosLoaded { generation, todos });
        Ok(())
    }

    pub async fn refresh_note(&mut self) -> Result<()> {
        let note = self.api.fetch_note().await?;
        self.store.dispatch(Action::NoteLoaded(note));
        Ok(())
    }

    pub async fn refresh_notifications(&mut self) -> Result<()> {
        let generation = self.store.begin(Collection::Notifications);
        let notifications = self.api.fetch_notifications().await?;
        self.store.dispatch(Action::NotificationsLoaded {
            generation,
            notifications,
        });
        Ok(())
    }

    pub async fn refresh_archive(&mut self) -> Result<()> {
        let generation = self.store.begin(Collection::Archive);
        let project_id = self.state().active_project_id.clone();
        let tasks = self.api.fetch_archived_tasks(project_id.as_deref()).await?;
        self.store
            .dispatch(Action::ArchiveLoaded { generation, tasks });
        Ok(())
    }

    /// Computes the work-time report over every task of the active project.
    pub async fn build_report(&mut self) -> Result<()> {
        let Some(project) = self.state().active_project().cloned() else {
            return Ok(());
        };
        let columns = self.state().columns.clone();
        let tasks = self.api.fetch_all_project_tasks(&project.id).await?;
        let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        let changelogs = self.api.fetch_changelogs(&ids).await?;
        let now = self.now();
        let report = calculate_project_work_time(&project, &tasks, &changelogs, &columns, now);
        self.store.dispatch(Action::ReportReady(report));
        Ok(())
    }

    // Board navigation

    pub fn current_column(&self) -> Option<&Column> {
        self.state().columns.get(self.selected_column)
    }

    /// Tasks of a column that pass the priority filter.
    pub fn visible_tasks(&self, slug: &str) -> Vec<&Task> {
        self.state()
            .tasks_in(slug)
            .into_iter()
            .filter(|t| {
                self.priority_filter.is_empty() || self.priority_filter.contains(&t.priority)
            })
            .collect()
    }

    pub fn selected_task(&self) -> Option<&Task> {
        let column = self.current_column()?;
        self.visible_tasks(&column.slug)
            .get(self.selected_row)
            .copied()
    }

    fn column_len(&self) -> usize {
        self.current_column()
            .map(|c| self.visible_tasks(&c.slug).len())
            .unwrap_or(0)
    }

    /// Archived tasks matching the archive search.
    pub fn visible_archive(&self) -> Vec<&Task> {
        self.state()
            .archived
            .iter()
            .filter(|t| matches_query(t, &self.archive_query))
            .collect()
    }

    pub fn toggle_priority_filter(&mut self, priority: Priority) {
        match self.priority_filter.iter().position(|p| *p == priority) {
            Some(i) => {
                self.priority_filter.remove(i);
            }
            None => self.priority_filter.push(priority),
        }
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let columns = self.state().columns.len();
        if columns == 0 {
            self.selected_column = 0;
        } else if self.selected_column >= columns {
            self.selected_column = columns - 1;
        }
        let rows = self.column_len();
        if rows == 0 {
            self.selected_row = 0;
        } else if self.selected_row >= rows {
            self.selected_row = rows - 1;
        }
    }

    pub fn next_column(&mut self) {
        let columns = self.state().columns.len();
        if columns > 0 && self.selected_column + 1 < columns {
            self.selected_column += 1;
        }
        self.clamp_selection();
    }

    pub fn previous_column(&mut self) {
        if self.selected_column > 0 {
            self.selected_column -= 1;
        }
        self.clamp_selection();
    }

    pub fn next(&mut self) {
        let rows = self.column_len();
        if rows == 0 {
            return;
        }
        self.selected_row = if self.selected_row >= rows - 1 {
            0
        } else {
            self.selected_row + 1
        };
    }

    pub fn previous(&mut self) {
        let rows = self.column_len();
        if rows == 0 {
            return;
        }
        self.selected_row = if self.selected_row == 0 {
            rows - 1
        } else {
            self.selected_row - 1
        };
    }

    fn list_len(&self) -> usize {
        let state = self.state();
        match self.view {
            View::Todos => state.todos.len(),
            View::Notifications => state.notifications.len(),
            View::Archive => self.visible_archive().len(),
            View::Report => state
                .report
                .as_ref()
                .map(|r| r.task_breakdown.len())
                .unwrap_or(0),
            View::Board | View::Notes => 0,
        }
    }

    pub fn list_next(&mut self) {
        let len = self.list_len();
        if len == 0 {
            self.list_state.select(None);
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn list_previous(&mut self) {
        let len = self.list_len();
        if len == 0 {
            self.list_state.select(None);
            return;
        }
        let i = match self.list_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.list_state.select(Some(i));
    }

    pub async fn switch_view(&mut self, view: View) {
        self.view = view;
        self.list_state = ListState::default();
        let result = match view {
            View::Board => Ok(()),
            View::Todos => self.refresh_todos().await,
            View::Notes => self.refresh_note().await,
            View::Notifications => self.refresh_notifications().await,
            View::Archive => self.refresh_archive().await,
            View::Report => self.build_report().await,
        };
        if let Err(err) = result {
            self.report_error("Error loading view", err);
        }
        if self.list_len() > 0 {
            self.list_state.select(Some(0));
        }
    }

    pub async fn cycle_project(&mut self, forward: bool) {
        let state = self.state();
        let count = state.projects.len();
        if count == 0 {
            return;
        }
        let current = state
            .active_project_id
            .as_deref()
            .and_then(|id| state.projects.iter().position(|p| p.id == id))
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % count
        } else {
            (current + count - 1) % count
        };
        let id = state.projects[next].id.clone();
        self.store.dispatch(Action::ProjectSelected(id));
        self.selected_column = 0;
        self.selected_row = 0;
        self.show_detail = false;
        if let Err(err) = self.refresh_board().await {
            self.report_error("Error fetching board", err);
        }
    }

    // Task operations

    pub async fn open_detail(&mut self) {
        let Some(task_id) = self.selected_task().map(|t| t.id.clone()) else {
            return;
        };
        self.show_detail = true;
        match self.api.fetch_changelog(&task_id).await {
            Ok(entries) => self.store.dispatch(Action::ChangelogLoaded {
                task_id: task_id.clone(),
                entries,
            }),
            Err(err) => self.report_error("Error fetching changelog", err),
        }
        match self.api.fetch_attachments(&task_id).await {
            Ok(attachments) => self.detail_attachments = attachments,
            Err(err) => self.report_error("Error fetching attachments", err),
        }
    }

    async fn reload_changelog(&mut self, task_id: &str) {
        match self.api.fetch_changelog(task_id).await {
            Ok(entries) => self.store.dispatch(Action::ChangelogLoaded {
                task_id: task_id.to_string(),
                entries,
            }),
            Err(err) => self.report_error("Error fetching changelog", err),
        }
    }

    async fn notify(&mut self, kind: NotificationType, task: &Task, title: String) {
        if let Err(err) = self
            .api
            .create_notification(kind, Some(&task.project_id), Some(&task.id), &title, None)
            .await
        {
            log::warn!("could not record notification: {}", err);
        }
    }

    fn awaiting_server(&mut self, task_id: &str) -> bool {
        let pending = self.store.has_pending(task_id);
        if pending {
            self.store.dispatch(Action::Status(
                "Still saving the previous change".to_string(),
            ));
        }
        pending
    }

    /// Moves the selected task one column left or right.
    pub async fn shift_task(&mut self, forward: bool) {
        let Some(task) = self.selected_task().cloned() else {
            return;
        };
        if self.awaiting_server(&task.id) {
            return;
        }
        let columns = self.state().columns.clone();
        let Some(index) = columns.iter().position(|c| c.slug == task.status) else {
            return;
        };
        let target = if forward {
            columns.get(index + 1)
        } else {
            index.checked_sub(1).and_then(|i| columns.get(i))
        };
        let Some(target) = target.cloned() else {
            return;
        };
        let Some(project) = self.state().active_project().cloned() else {
            return;
        };

        let now = self.now();
        let mut optimistic = task.clone();
        optimistic.status = target.slug.clone();
        optimistic.archived_at = archive_stamp(&task, &target.slug, &columns, now);
        self.store.dispatch(Action::TaskEdited(optimistic));

        match self
            .api
            .move_task(&task, &project, &columns, &target.slug, now)
            .await
        {
            Ok(server) => {
                let archived = server.archived_at.is_some();
                self.store.dispatch(Action::TaskConfirmed(server));
                self.reload_changelog(&task.id).await;
                let (kind, title) = if archived {
                    (NotificationType::TaskArchived, format!("Archived: {}", task.title))
                } else {
                    (
                        NotificationType::StatusChanged,
                        format!("{} moved to {}", task.title, target.name),
                    )
                };
                self.notify(kind, &task, title).await;
            }
            Err(err) => self.store.dispatch(Action::TaskEditFailed {
                task_id: task.id.clone(),
                error: format!("Error moving task: {}", err),
            }),
        }

        if !archived_or_moved(&self.store, &task.id) {
            self.selected_column = if forward {
                self.selected_column + 1
            } else {
                self.selected_column.saturating_sub(1)
            };
            let column = self.state().columns.get(self.selected_column).cloned();
            if let Some(column) = column {
                self.selected_row = self
                    .visible_tasks(&column.slug)
                    .iter()
                    .position(|t| t.id == task.id)
                    .unwrap_or(0);
            }
        }
        self.clamp_selection();
    }

    /// Sends the selected task to the next project, keeping its column when
    /// the target has one with the same slug.
    pub async fn move_to_next_project(&mut self) {
        let Some(task) = self.selected_task().cloned() else {
            return;
        };
        if self.awaiting_server(&task.id) {
            return;
        }
        let target = {
            let projects = &self.state().projects;
            projects
                .iter()
                .position(|p| p.id == task.project_id)
                .and_then(|i| projects.get((i + 1) % projects.len()))
                .filter(|p| p.id != task.project_id)
                .cloned()
        };
        let Some(target) = target else {
            self.store
                .dispatch(Action::Status("No other project to move to".to_string()));
            return;
        };

        match self.move_into_project(&task, &target).await {
            Ok(server) => {
                self.store.dispatch(Action::TaskConfirmed(server));
                self.notify(
                    NotificationType::TaskUpdated,
                    &task,
                    format!("{} moved to {}", task.title, target.name),
                )
                .await;
            }
            Err(err) => self.report_error("Error moving task", err),
        }
        self.show_detail = false;
        self.clamp_selection();
    }

    async fn move_into_project(&self, task: &Task, target: &Project) -> Result<Task> {
        let columns = self.api.fetch_columns(&target.id).await?;
        let status = columns::landing_slug(&columns, &task.status)
            .map(str::to_string)
            .ok_or_else(|| Error::NotFound(format!("columns of {}", target.name)))?;
        self.api
            .move_task(task, target, &columns, &status, self.now())
            .await
    }

    pub async fn update_selected(&mut self, update: TaskUpdate) {
        let Some(task) = self.selected_task().cloned() else {
            return;
        };
        if self.awaiting_server(&task.id) {
            return;
        }
        let mut optimistic = task.clone();
        update.apply_to(&mut optimistic);
        self.store.dispatch(Action::TaskEdited(optimistic));

        match self.api.update_task(&task, &update).await {
            Ok(server) => {
                self.store.dispatch(Action::TaskConfirmed(server));
                self.reload_changelog(&task.id).await;
                if let Some(priority) = update.priority {
                    let title = format!("{} is now {} priority", task.title, priority);
                    self.notify(NotificationType::PriorityChanged, &task, title)
                        .await;
                }
            }
            Err(err) => self.store.dispatch(Action::TaskEditFailed {
                task_id: task.id.clone(),
                error: format!("Error updating task: {}", err),
            }),
        }
    }

    async fn edit_task(&mut self) -> Result<()> {
        let Some(task) = self.selected_task() else {
            return Ok(());
        };
        let update = TaskUpdate::from_edit(task, &self.input_title, &self.input_description);
        if !update.is_empty() {
            self.update_selected(update).await;
        }
        Ok(())
    }

    pub async fn cycle_priority(&mut self) {
        let Some(priority) = self.selected_task().map(|t| t.priority.next()) else {
            return;
        };
        self.update_selected(TaskUpdate {
            priority: Some(priority),
            ..TaskUpdate::default()
        })
        .await;
    }

    pub async fn delete_selected(&mut self) {
        let Some(task) = self.selected_task().cloned() else {
            return;
        };
        match self.api.delete_task(&task.id).await {
            Ok(()) => {
                self.store.dispatch(Action::TaskRemoved(task.id.clone()));
                self.notify(
                    NotificationType::TaskDeleted,
                    &task,
                    format!("Deleted: {}", task.title),
                )
                .await;
            }
            Err(err) => self.report_error("Error deleting task", err),
        }
        self.show_detail = false;
        self.clamp_selection();
    }

    // The prompt holds a local path; only its metadata is recorded.
    async fn attach_file(&mut self) -> Result<()> {
        let Some(task_id) = self.selected_task().map(|t| t.id.clone()) else {
            return Ok(());
        };
        let path = self.input_title.trim().to_string();
        let metadata = std::fs::metadata(&path)?;
        let file_name = Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        let existing = self
            .state()
            .attachment_counts
            .get(&task_id)
            .copied()
            .unwrap_or(0);

        let attachment = self
            .api
            .add_attachment(&task_id, existing, &file_name, metadata.len(), &path)
            .await?;
        log::info!("attached {} to task {}", attachment.file_name, task_id);
        self.store.dispatch(Action::AttachmentCounted {
            task_id: task_id.clone(),
            count: existing + 1,
        });
        if self.show_detail {
            self.detail_attachments.insert(0, attachment);
        }
        self.reload_changelog(&task_id).await;
        Ok(())
    }

    /// Removes the newest attachment of the task shown in the detail panel.
    pub async fn remove_latest_attachment(&mut self) {
        if !self.show_detail || self.detail_attachments.is_empty() {
            return;
        }
        let attachment = self.detail_attachments[0].clone();
        match self.api.remove_attachment(&attachment).await {
            Ok(()) => {
                self.detail_attachments.remove(0);
                self.store.dispatch(Action::AttachmentCounted {
                    task_id: attachment.task_id.clone(),
                    count: self.detail_attachments.len(),
                });
                self.reload_changelog(&attachment.task_id).await;
            }
            Err(err) => self.report_error("Error removing attachment", err),
        }
    }

    async fn create_task(&mut self) -> Result<()> {
        let parsed = parse_task_input(&self.input_title);
        let state = self.state();
        let Some(project_id) = state.active_project_id.clone() else {
            return Ok(());
        };
        let status = parsed
            .status
            .filter(|slug| state.columns.iter().any(|c| &c.slug == slug))
            .or_else(|| self.current_column().map(|c| c.slug.clone()))
            .or_else(|| columns::first_column(&state.columns).map(|c| c.slug.clone()));
        let Some(status) = status else {
            self.store
                .dispatch(Action::Status("Add a column first".to_string()));
            return Ok(());
        };
        let order = state.next_order(&status);
        let priority = parsed.priority.unwrap_or_default();

        let task = self
            .api
            .create_task(&project_id, &parsed.title, &status, priority, order)
            .await?;

        let description = self.input_description.trim().to_string();
        let task = if description.is_empty() {
            task
        } else {
            let update = TaskUpdate {
                description: Some(description),
                ..TaskUpdate::default()
            };
            self.api.update_task(&task, &update).await?
        };

        self.store.dispatch(Action::TaskInserted(task.clone()));
        self.reload_changelog(&task.id).await;
        self.notify(
            NotificationType::TaskCreated,
            &task,
            format!("New task: {}", task.title),
        )
        .await;
        Ok(())
    }

    // Columns

    async fn create_column(&mut self) -> Result<()> {
        let Some(project_id) = self.state().active_project_id.clone() else {
            return Ok(());
        };
        let new = columns::prepare_new_column(&self.state().columns, &self.input_title, None)?;
        let column = self.api.create_column(&project_id, &new).await?;
        let mut all = self.state().columns.clone();
        all.push(column);
        self.store.dispatch(Action::ColumnsReplaced(all));
        Ok(())
    }

    // Only the display name changes; the slug stays because task statuses point at it.
    async fn rename_column(&mut self) -> Result<()> {
        let Some(id) = self.current_column().map(|c| c.id.clone()) else {
            return Ok(());
        };
        let update = ColumnUpdate {
            name: Some(self.input_title.trim().to_string()),
            ..ColumnUpdate::default()
        };
        let renamed = self.api.update_column(&id, &update).await?;
        self.replace_column(renamed);
        Ok(())
    }

    pub async fn recolor_column(&mut self) {
        let Some(column) = self.current_column() else {
            return;
        };
        let id = column.id.clone();
        let update = ColumnUpdate {
            color: Some(next_color(column.color.as_deref()).to_string()),
            ..ColumnUpdate::default()
        };
        match self.api.update_column(&id, &update).await {
            Ok(updated) => self.replace_column(updated),
            Err(err) => self.report_error("Error updating column", err),
        }
    }

    fn replace_column(&mut self, updated: Column) {
        let all = self
            .state()
            .columns
            .iter()
            .map(|c| if c.id == updated.id { updated.clone() } else { c.clone() })
            .collect();
        self.store.dispatch(Action::ColumnsReplaced(all));
    }

    pub async fn mark_done_column(&mut self) {
        let Some(id) = self.current_column().map(|c| c.id.clone()) else {
            return;
        };
        let columns = self.state().columns.clone();
        match self.api.set_done_column(&columns, &id).await {
            Ok(updated) => self.store.dispatch(Action::ColumnsReplaced(updated)),
            Err(err) => self.report_error("Error updating column", err),
        }
    }

    pub async fn move_column(&mut self, forward: bool) {
        let columns = self.state().columns.clone();
        let from = self.selected_column;
        let to = if forward {
            from + 1
        } else {
            match from.checked_sub(1) {
                Some(i) => i,
                None => return,
            }
        };
        if to >= columns.len() {
            return;
        }
        let mut ids: Vec<String> = columns.iter().map(|c| c.id.clone()).collect();
        ids.swap(from, to);
        match self.api.reorder_columns(&columns, &ids).await {
            Ok(reordered) => {
                self.store.dispatch(Action::ColumnsReplaced(reordered));
                self.selected_column = to;
            }
            Err(err) => self.report_error("Error reordering columns", err),
        }
    }

    pub async fn delete_column(&mut self) {
        let Some(project_id) = self.state().active_project_id.clone() else {
            return;
        };
        let Some(id) = self.current_column().map(|c| c.id.clone()) else {
            return;
        };
        let columns = self.state().columns.clone();
        if columns.len() <= 1 {
            self.store.dispatch(Action::Status(
                "A project needs at least one column".to_string(),
            ));
            return;
        }
        match self.api.delete_column(&project_id, &columns, &id, None).await {
            Ok(_) => {
                self.selected_column = self.selected_column.saturating_sub(1);
                if let Err(err) = self.refresh_board().await {
                    self.report_error("Error fetching board", err);
                }
            }
            Err(err) => self.report_error("Error deleting column", err),
        }
    }

    // Projects

    async fn create_project(&mut self) -> Result<()> {
        let color = PROJECT_COLORS[self.state().projects.len() % PROJECT_COLORS.len()];
        let project = self.api.create_project(&self.input_title, color).await?;
        let id = project.id.clone();
        self.store.dispatch(Action::ProjectUpserted(project));
        self.store.dispatch(Action::ProjectSelected(id));
        self.selected_column = 0;
        self.selected_row = 0;
        self.refresh_board().await
    }

    // Confirmed by typing the project name into the prompt.
    async fn delete_project(&mut self) -> Result<()> {
        let Some(project) = self.state().active_project().cloned() else {
            return Ok(());
        };
        if self.input_title.trim() != project.name {
            self.store.dispatch(Action::Status(
                "Name did not match, project kept".to_string(),
            ));
            return Ok(());
        }
        self.api.delete_project(&project.id).await?;
        log::info!("deleted project {} ({})", project.name, project.id);
        self.store.dispatch(Action::ProjectRemoved(project.id));
        self.selected_column = 0;
        self.selected_row = 0;
        self.show_detail = false;
        self.refresh_board().await
    }

    async fn update_project(&mut self, update: ProjectUpdate) -> Result<()> {
        let Some(id) = self.state().active_project_id.clone() else {
            return Ok(());
        };
        let updated = self.api.update_project(&id, &update).await?;
        self.store.dispatch(Action::ProjectUpserted(updated));
        Ok(())
    }

    pub async fn recolor_project(&mut self) {
        let Some(project) = self.state().active_project() else {
            return;
        };
        let update = ProjectUpdate {
            color: Some(next_color(Some(&project.color)).to_string()),
            ..ProjectUpdate::default()
        };
        if let Err(err) = self.update_project(update).await {
            self.report_error("Error updating project", err);
        }
    }

    /// Adjusts the stale threshold of the active project by `delta_hours`.
    pub async fn adjust_stale_threshold(&mut self, delta_hours: i64) {
        let Some(project) = self.state().active_project() else {
            return;
        };
        let hours = (i64::from(project.stale_threshold_hours()) + delta_hours).max(1) as u32;
        let update = ProjectUpdate {
            stale_threshold_hours: Some(hours),
            ..ProjectUpdate::default()
        };
        match self.update_project(update).await {
            Ok(()) => self
                .store
                .dispatch(Action::Status(format!("Stale threshold: {}h", hours))),
            Err(err) => self.report_error("Error updating project", err),
        }
    }

    // Todos and notes

    async fn create_todo(&mut self) -> Result<()> {
        let todo = self.api.create_todo(&self.input_title).await?;
        self.store.dispatch(Action::TodoUpserted(todo));
        Ok(())
    }

    async fn save_note(&mut self) -> Result<()> {
        let existing = self.state().note.clone();
        let note = self
            .api
            .save_note(existing.as_ref(), &self.input_title, self.now())
            .await?;
        self.store.dispatch(Action::NoteLoaded(Some(note)));
        Ok(())
    }

    async fn handle_list_action(&mut self, code: KeyCode) {
        let Some(index) = self.list_state.selected() else {
            return;
        };
        let result = match (self.view, code) {
            (View::Todos, KeyCode::Char(' ')) => {
                let todo = self.state().todos.get(index).cloned();
                match todo {
                    Some(todo) => self
                        .api
                        .toggle_todo(&todo)
                        .await
                        .map(|t| self.store.dispatch(Action::TodoUpserted(t))),
                    None => Ok(()),
                }
            }
            (View::Todos, KeyCode::Char('d')) => {
                let id = self.state().todos.get(index).map(|t| t.id.clone());
                match id {
                    Some(id) => self
                        .api
                        .delete_todo(&id)
                        .await
                        .map(|()| self.store.dispatch(Action::TodoRemoved(id))),
                    None => Ok(()),
                }
            }
            (View::Notifications, KeyCode::Enter) => {
                let id = self.state().notifications.get(index).map(|n| n.id.clone());
                match id {
                    Some(id) => self
                        .api
                        .mark_notification_read(&id)
                        .await
                        .map(|()| self.store.dispatch(Action::NotificationRead(id))),
                    None => Ok(()),
                }
            }
            (View::Notifications, KeyCode::Char('d')) => {
                let id = self.state().notifications.get(index).map(|n| n.id.clone());
                match id {
                    Some(id) => self
                        .api
                        .delete_notification(&id)
                        .await
                        .map(|()| self.store.dispatch(Action::NotificationRemoved(id))),
                    None => Ok(()),
                }
            }
            (View::Archive, KeyCode::Char('u')) => {
                let task = self.visible_archive().get(index).map(|t| (*t).clone());
                match task {
                    Some(task) => self.unarchive(task).await,
                    None => Ok(()),
                }
            }
            (View::Archive, KeyCode::Char('d')) => {
                let id = self.visible_archive().get(index).map(|t| t.id.clone());
                match id {
                    Some(id) => self
                        .api
                        .delete_task(&id)
                        .await
                        .map(|()| self.store.dispatch(Action::TaskRemoved(id))),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            self.report_error("Request failed", err);
        }
        let len = self.list_len();
        if len == 0 {
            self.list_state.select(None);
        } else if index >= len {
            self.list_state.select(Some(len - 1));
        }
    }

    async fn unarchive(&mut self, task: Task) -> Result<()> {
        let columns = if task.project_id.as_str()
            == self.state().active_project_id.as_deref().unwrap_or_default()
        {
            self.state().columns.clone()
        } else {
            self.api.fetch_columns(&task.project_id).await?
        };
        let restored = self.api.unarchive_task(&task, &columns).await?;
        self.store.dispatch(Action::TaskConfirmed(restored));
        self.refresh_archive().await
    }

    fn open_prompt(&mut self, prompt: Prompt) {
        self.prompt = prompt;
        self.input_mode = InputMode::Editing;
        self.active_input = ActiveInput::Title;
        self.input_description.clear();
        self.input_title = match prompt {
            Prompt::Note => self
                .state()
                .note
                .as_ref()
                .map(|n| n.content.clone())
                .unwrap_or_default(),
            Prompt::RenameColumn => self
                .current_column()
                .map(|c| c.name.clone())
                .unwrap_or_default(),
            Prompt::RenameProject => self
                .state()
                .active_project()
                .map(|p| p.name.clone())
                .unwrap_or_default(),
            Prompt::EditTask => self
                .selected_task()
                .map(|t| t.title.clone())
                .unwrap_or_default(),
            Prompt::ArchiveSearch => self.archive_query.clone(),
            _ => String::new(),
        };
        if prompt == Prompt::EditTask {
            self.input_description = self
                .selected_task()
                .and_then(|t| t.description.clone())
                .unwrap_or_default();
        }
    }

    fn close_prompt(&mut self) {
        self.input_title.clear();
        self.input_description.clear();
        self.input_mode = InputMode::Normal;
    }

    fn active_buffer(&mut self) -> &mut String {
        match (self.prompt, self.active_input) {
            (Prompt::Task | Prompt::EditTask, ActiveInput::Description) => {
                &mut self.input_description
            }
            _ => &mut self.input_title,
        }
    }

    async fn submit_prompt(&mut self) {
        let optional = matches!(self.prompt, Prompt::Note | Prompt::ArchiveSearch);
        if !optional && self.input_title.trim().is_empty() {
            self.store
                .dispatch(Action::Status("Input cannot be empty.".to_string()));
            return;
        }
        let result = match self.prompt {
            Prompt::Task => self.create_task().await,
            Prompt::EditTask => self.edit_task().await,
            Prompt::ArchiveSearch => {
                self.archive_query = self.input_title.trim().to_string();
                let first = (!self.visible_archive().is_empty()).then_some(0);
                self.list_state.select(first);
                Ok(())
            }
            Prompt::Todo => self.create_todo().await,
            Prompt::Column => self.create_column().await,
            Prompt::RenameColumn => self.rename_column().await,
            Prompt::Project => self.create_project().await,
            Prompt::RenameProject => {
                let update = ProjectUpdate {
                    name: Some(self.input_title.trim().to_string()),
                    ..ProjectUpdate::default()
                };
                self.update_project(update).await
            }
            Prompt::DeleteProject => self.delete_project().await,
            Prompt::Attachment => self.attach_file().await,
            Prompt::Note => self.save_note().await,
        };
        if let Err(err) = result {
            self.report_error("Error saving", err);
        }
        self.close_prompt();
    }

    pub async fn handle_input(&mut self, key: KeyEvent) -> io::Result<bool> {
        match self.input_mode {
            InputMode::Normal => match (self.view, key.code) {
                (_, KeyCode::Char('q')) => return Ok(true),
                (View::Board, _) => self.handle_board_key(key.code).await,
                (_, KeyCode::Esc) => self.view = View::Board,
                (View::Notes, KeyCode::Char('e')) => self.open_prompt(Prompt::Note),
                (View::Archive, KeyCode::Char('/')) => self.open_prompt(Prompt::ArchiveSearch),
                (View::Todos, KeyCode::Char('a')) => self.open_prompt(Prompt::Todo),
                (View::Notifications, KeyCode::Char('R')) => {
                    match self.api.mark_all_notifications_read().await {
                        Ok(()) => self.store.dispatch(Action::AllNotificationsRead),
                        Err(err) => self.report_error("Error updating notifications", err),
                    }
                }
                (_, KeyCode::Char('j')) => self.list_next(),
                (_, KeyCode::Char('k')) => self.list_previous(),
                (_, KeyCode::Char('r')) => self.switch_view(self.view).await,
                (_, code) => self.handle_list_action(code).await,
            },

            InputMode::Editing => match key.code {
                KeyCode::Char('i') => {
                    self.input_mode = InputMode::Insert;
                }
                KeyCode::Tab if self.prompt.has_description() => {
                    self.active_input = match self.active_input {
                        ActiveInput::Title => ActiveInput::Description,
                        ActiveInput::Description => ActiveInput::Title,
                    };
                }
                KeyCode::Enter => self.submit_prompt().await,
                KeyCode::Esc => self.close_prompt(),
                _ => {}
            },

            InputMode::Insert => match key.code {
                KeyCode::Char(c) => self.active_buffer().push(c),
                KeyCode::Enter if self.prompt == Prompt::Note => self.input_title.push('\n'),
                KeyCode::Backspace => {
                    self.active_buffer().pop();
                }
                KeyCode::Esc => {
                    self.input_mode = InputMode::Editing;
                }
                _ => {}
            },
        }
        Ok(false)
    }

    async fn handle_board_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('j') => self.next(),
            KeyCode::Char('k') => self.previous(),
            KeyCode::Char('l') => self.next_column(),
            KeyCode::Char('h') => self.previous_column(),
            KeyCode::Char('L') => self.shift_task(true).await,
            KeyCode::Char('H') => self.shift_task(false).await,
            KeyCode::Char('p') => self.cycle_priority().await,
            KeyCode::Char('D') => self.delete_selected().await,
            KeyCode::Char('a') => self.open_prompt(Prompt::Task),
            KeyCode::Char('e') if self.selected_task().is_some() => {
                self.open_prompt(Prompt::EditTask)
            }
            KeyCode::Char('O') => self.recolor_column().await,
            KeyCode::Char('c') => self.open_prompt(Prompt::Column),
            KeyCode::Char('P') => self.open_prompt(Prompt::Project),
            KeyCode::Char('E') if self.state().active_project().is_some() => {
                self.open_prompt(Prompt::RenameProject)
            }
            KeyCode::Char('C') => self.recolor_project().await,
            KeyCode::Char('K') if self.state().active_project().is_some() => {
                self.open_prompt(Prompt::DeleteProject)
            }
            KeyCode::Char('f') if self.selected_task().is_some() => {
                self.open_prompt(Prompt::Attachment)
            }
            KeyCode::Char('F') => self.remove_latest_attachment().await,
            KeyCode::Char('R') => self.open_prompt(Prompt::RenameColumn),
            KeyCode::Char('X') => self.delete_column().await,
            KeyCode::Char('m') => self.mark_done_column().await,
            KeyCode::Char('<') => self.move_column(false).await,
            KeyCode::Char('>') => self.move_column(true).await,
            KeyCode::Char('+') => self.adjust_stale_threshold(12).await,
            KeyCode::Char('-') => self.adjust_stale_threshold(-12).await,
            KeyCode::Char(']') => self.cycle_project(true).await,
            KeyCode::Char('[') => self.cycle_project(false).await,
            KeyCode::Char('t') => self.switch_view(View::Todos).await,
            KeyCode::Char('n') => self.switch_view(View::Notes).await,
            KeyCode::Char('i') => self.switch_view(View::Notifications).await,
            KeyCode::Char('A') => self.switch_view(View::Archive).await,
            KeyCode::Char('w') => self.switch_view(View::Report).await,
            KeyCode::Char('r') => {
                if let Err(err) = self.refresh_board().await {
                    self.report_error("Error fetching board", err);
                }
            }
            KeyCode::Char('x') => self.store.dispatch(Action::ConflictsDismissed),
            KeyCode::Char('M') => self.move_to_next_project().await,
            KeyCode::Char('1') => self.toggle_priority_filter(Priority::Low),
            KeyCode::Char('2') => self.toggle_priority_filter(Priority::Medium),
            KeyCode::Char('3') => self.toggle_priority_filter(Priority::High),
            KeyCode::Enter => {
                if self.show_detail {
                    self.show_detail = false;
                } else {
                    self.open_detail().await;
                }
            }
            KeyCode::Esc => self.show_detail = false,
            _ => {}
        }
    }

    /// Milliseconds the task has been in its current column and whether that is too long.
    pub fn stage_info(&self, task: &Task) -> (i64, bool) {
        let state = self.state();
        let changelog = state.changelog(&task.id);
        let now = self.now();
        let ms = stage::time_in_stage_ms(task, changelog, now);
        let stale = state
            .active_project()
            .map(|p| stage::is_stale(task, changelog, p, &state.columns, now))
            .unwrap_or(false);
        (ms, stale)
    }
}

// Next preset after `current`, starting over at the first one.
fn next_color(current: Option<&str>) -> &'static str {
    let next = current
        .and_then(|c| PROJECT_COLORS.iter().position(|p| *p == c))
        .map(|i| (i + 1) % PROJECT_COLORS.len())
        .unwrap_or(0);
    PROJECT_COLORS[next]
}

/// Case-insensitive match on title or description; an empty query matches all.
pub fn matches_query(task: &Task, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    query.is_empty()
        || task.title.to_lowercase().contains(&query)
        || task
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(&query))
}

// A task that was archived or left the project is no longer on the board.
fn archived_or_moved(store: &Store, task_id: &str) -> bool {
    store.state().task(task_id).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::{Duration, Local};
    use crossterm::event::KeyModifiers;
    use rstest::rstest;
    use std::collections::HashMap;
    use std::path::PathBuf;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn local(&self) -> DateTime<Local> {
            self.0.with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn created_at() -> DateTime<Utc> {
        "2024-05-01T09:00:00Z".parse().unwrap()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> App<FixedClock> {
        app_at(created_at() + Duration::hours(1))
    }

    fn app_at(now: DateTime<Utc>) -> App<FixedClock> {
        let config = Config {
            url: "http://localhost:54321".to_string(),
            anon_key: "anon".to_string(),
            access_token: "token".to_string(),
            user_id: None,
            log_file: PathBuf::from("/tmp/kanban-tui-test.log"),
        };
        let mut app = App::new(ApiClient::new(&config), FixedClock(now));
        let created_at = created_at();
        let generation = app.store.begin(Collection::Projects);
        app.store.dispatch(Action::ProjectsLoaded {
            generation,
            projects: vec![Project {
                id: "p1".to_string(),
                name: "Board".to_string(),
                color: "#fff".to_string(),
                stale_threshold_hours: None,
                created_at,
            }],
        });
        let columns = ["todo", "doing", "done"]
            .iter()
            .enumerate()
            .map(|(i, slug)| Column {
                id: format!("c{}", i),
                project_id: "p1".to_string(),
                name: slug.to_string(),
                slug: slug.to_string(),
                color: None,
                order: i as i32,
                is_done_column: *slug == "done",
            })
            .collect();
        let tasks = (0..3)
            .map(|i| Task {
                id: format!("t{}", i),
                project_id: "p1".to_string(),
                title: format!("Task {}", i),
                description: (i == 0).then(|| "Notes from the kickoff".to_string()),
                status: (if i < 2 { "todo" } else { "doing" }).to_string(),
                priority: Priority::Low,
                order: i,
                created_at,
                archived_at: None,
                updated_at: None,
            })
            .collect();
        let generation = app.store.begin(Collection::Board);
        app.store.dispatch(Action::BoardLoaded {
            generation,
            project_id: "p1".to_string(),
            columns,
            tasks,
            changelogs: HashMap::new(),
            attachment_counts: HashMap::new(),
        });
        app
    }

    #[tokio::test]
    async fn test_row_navigation_wraps() {
        let mut app = app();
        assert_eq!(app.selected_task().unwrap().id, "t0");
        app.handle_input(key(KeyCode::Char('j'))).await.unwrap();
        assert_eq!(app.selected_task().unwrap().id, "t1");
        app.handle_input(key(KeyCode::Char('j'))).await.unwrap();
        assert_eq!(app.selected_task().unwrap().id, "t0");
        app.handle_input(key(KeyCode::Char('k'))).await.unwrap();
        assert_eq!(app.selected_task().unwrap().id, "t1");
    }

    #[tokio::test]
    async fn test_column_navigation_clamps_row() {
        let mut app = app();
        app.selected_row = 1;
        app.handle_input(key(KeyCode::Char('l'))).await.unwrap();
        assert_eq!(app.selected_column, 1);
        assert_eq!(app.selected_row, 0);
        assert_eq!(app.selected_task().unwrap().id, "t2");

        app.handle_input(key(KeyCode::Char('l'))).await.unwrap();
        app.handle_input(key(KeyCode::Char('l'))).await.unwrap();
        assert_eq!(app.selected_column, 2);
        assert!(app.selected_task().is_none());
    }

    #[tokio::test]
    async fn test_task_prompt_collects_title_and_description() {
        let mut app = app();
        app.handle_input(key(KeyCode::Char('a'))).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Editing);
        assert_eq!(app.prompt, Prompt::Task);

        app.handle_input(key(KeyCode::Char('i'))).await.unwrap();
        for c in "Fix".chars() {
            app.handle_input(key(KeyCode::Char(c))).await.unwrap();
        }
        app.handle_input(key(KeyCode::Esc)).await.unwrap();
        app.handle_input(key(KeyCode::Tab)).await.unwrap();
        app.handle_input(key(KeyCode::Char('i'))).await.unwrap();
        app.handle_input(key(KeyCode::Char('x'))).await.unwrap();
        app.handle_input(key(KeyCode::Backspace)).await.unwrap();
        app.handle_input(key(KeyCode::Char('y'))).await.unwrap();

        assert_eq!(app.input_title, "Fix");
        assert_eq!(app.input_description, "y");

        app.handle_input(key(KeyCode::Esc)).await.unwrap();
        app.handle_input(key(KeyCode::Esc)).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(app.input_title.is_empty());
    }

    #[tokio::test]
    async fn test_empty_prompt_is_not_submitted() {
        let mut app = app();
        app.handle_input(key(KeyCode::Char('a'))).await.unwrap();
        app.handle_input(key(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Editing);
        assert_eq!(app.state().status.as_deref(), Some("Input cannot be empty."));
    }

    #[tokio::test]
    async fn test_quit() {
        let mut app = app();
        assert!(app.handle_input(key(KeyCode::Char('q'))).await.unwrap());
    }

    #[rstest]
    #[case(47, false)]
    #[case(48, false)]
    #[case(49, true)]
    fn test_stage_info_against_default_threshold(#[case] hours: i64, #[case] stale: bool) {
        let app = app_at(created_at() + Duration::hours(hours));
        let task = app.state().task("t0").unwrap().clone();
        assert_eq!(app.stage_info(&task), (hours * 3_600_000, stale));
    }

    #[tokio::test]
    async fn test_pending_edit_blocks_another_change() {
        let mut app = app();
        let mut saving = app.state().task("t0").unwrap().clone();
        saving.title = "Renamed locally".to_string();
        app.store.dispatch(Action::TaskEdited(saving.clone()));

        app.handle_input(key(KeyCode::Char('p'))).await.unwrap();
        assert_eq!(
            app.state().status.as_deref(),
            Some("Still saving the previous change")
        );
        app.handle_input(key(KeyCode::Char('L'))).await.unwrap();
        let task = app.state().task("t0").unwrap();
        assert_eq!(task.priority, Priority::Low);
        assert_eq!(task.status, "todo");
        assert_eq!(task.title, "Renamed locally");
    }

    #[tokio::test]
    async fn test_edit_prompt_starts_from_selected_task() {
        let mut app = app();
        app.handle_input(key(KeyCode::Char('e'))).await.unwrap();
        assert_eq!(app.prompt, Prompt::EditTask);
        assert_eq!(app.input_title, "Task 0");
        assert_eq!(app.input_description, "Notes from the kickoff");

        app.handle_input(key(KeyCode::Tab)).await.unwrap();
        assert_eq!(app.active_input, ActiveInput::Description);
    }

    #[tokio::test]
    async fn test_edit_needs_a_selected_task() {
        let mut app = app();
        app.selected_column = 2;
        app.handle_input(key(KeyCode::Char('e'))).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[rstest]
    #[case(None, "#e9a23b")]
    #[case(Some("#e9a23b"), "#7fb069")]
    #[case(Some("#8e7dbe"), "#e9a23b")]
    #[case(Some("#123456"), "#e9a23b")]
    fn test_next_color(#[case] current: Option<&str>, #[case] expected: &str) {
        assert_eq!(next_color(current), expected);
    }

    #[rstest]
    #[case("", true)]
    #[case("task 0", true)]
    #[case("KICKOFF", true)]
    #[case("retro", false)]
    fn test_archive_query(#[case] query: &str, #[case] hit: bool) {
        let app = app();
        let task = app.state().task("t0").unwrap();
        assert_eq!(matches_query(task, query), hit);
    }

    #[tokio::test]
    async fn test_archive_search_narrows_list() {
        let mut app = app();
        let archived = app.state().tasks.clone();
        let generation = app.store.begin(Collection::Archive);
        app.store.dispatch(Action::ArchiveLoaded {
            generation,
            tasks: archived,
        });
        app.view = View::Archive;
        app.handle_input(key(KeyCode::Char('/'))).await.unwrap();
        assert_eq!(app.prompt, Prompt::ArchiveSearch);
        app.handle_input(key(KeyCode::Char('i'))).await.unwrap();
        for c in "task 2".chars() {
            app.handle_input(key(KeyCode::Char(c))).await.unwrap();
        }
        app.handle_input(key(KeyCode::Esc)).await.unwrap();
        app.handle_input(key(KeyCode::Enter)).await.unwrap();

        assert_eq!(app.archive_query, "task 2");
        let ids: Vec<&str> = app.visible_archive().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t2"]);
        assert_eq!(app.list_len(), 1);
        assert_eq!(app.list_state.selected(), Some(0));
    }

    #[tokio::test]
    async fn test_rename_prompt_starts_from_column_name() {
        let mut app = app();
        app.handle_input(key(KeyCode::Char('l'))).await.unwrap();
        app.handle_input(key(KeyCode::Char('R'))).await.unwrap();
        assert_eq!(app.prompt, Prompt::RenameColumn);
        assert_eq!(app.input_title, "doing");
    }

    #[tokio::test]
    async fn test_project_prompts() {
        let mut app = app();
        app.handle_input(key(KeyCode::Char('E'))).await.unwrap();
        assert_eq!(app.prompt, Prompt::RenameProject);
        assert_eq!(app.input_title, "Board");
        app.handle_input(key(KeyCode::Esc)).await.unwrap();

        app.handle_input(key(KeyCode::Char('K'))).await.unwrap();
        assert_eq!(app.prompt, Prompt::DeleteProject);
        assert!(app.input_title.is_empty());
    }

    #[tokio::test]
    async fn test_attach_needs_a_selected_task() {
        let mut app = app();
        app.selected_column = 2;
        app.handle_input(key(KeyCode::Char('f'))).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);

        app.selected_column = 0;
        app.handle_input(key(KeyCode::Char('f'))).await.unwrap();
        assert_eq!(app.prompt, Prompt::Attachment);
    }

    #[tokio::test]
    async fn test_priority_filter_hides_tasks() {
        let mut app = app();
        let mut urgent = app.state().task("t1").unwrap().clone();
        urgent.priority = Priority::High;
        app.store.dispatch(Action::TaskEdited(urgent));
        app.handle_input(key(KeyCode::Char('3'))).await.unwrap();
        let visible: Vec<&str> = app.visible_tasks("todo").iter().map(|t| t.id.as_str()).collect();
        assert_eq!(visible, vec!["t1"]);
        assert_eq!(app.selected_task().unwrap().id, "t1");

        app.handle_input(key(KeyCode::Char('3'))).await.unwrap();
        assert_eq!(app.visible_tasks("todo").len(), 2);
    }
}
