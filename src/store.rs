//! Application state and the reducer that owns every mutation of it.
//!
//! Remote results and local edits both arrive as [`Action`]s. Fetches carry a
//! generation so a slow response cannot overwrite a newer one, and optimistic
//! task edits are reconciled against the server row instead of blindly
//! replacing it.

use crate::models::{
    ChangelogEntry, Column, Note, Notification, Project, ProjectTimeReport, Task, Todo,
};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Projects,
    Board,
    Archive,
    Todos,
    Notifications,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Conflict {
    pub task_id: String,
    pub task_title: String,
    pub fields: Vec<&'static str>,
}

#[derive(Clone, Debug)]
struct PendingEdit {
    snapshot: Task,
    optimistic: Task,
}

#[derive(Debug, Default)]
pub struct BoardState {
    pub projects: Vec<Project>,
    pub active_project_id: Option<String>,
    pub columns: Vec<Column>,
    pub tasks: Vec<Task>,
    pub changelogs: HashMap<String, Vec<ChangelogEntry>>,
    pub attachment_counts: HashMap<String, usize>,
    pub archived: Vec<Task>,
    pub todos: Vec<Todo>,
    pub note: Option<Note>,
    pub notifications: Vec<Notification>,
    pub report: Option<ProjectTimeReport>,
    pub conflicts: Vec<Conflict>,
    pub status: Option<String>,
}

impl BoardState {
    pub fn active_project(&self) -> Option<&Project> {
        let id = self.active_project_id.as_deref()?;
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Tasks of one column in board order.
    pub fn tasks_in(&self, slug: &str) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.iter().filter(|t| t.status == slug).collect();
        tasks.sort_by_key(|t| t.order);
        tasks
    }

    /// `order` for a task appended to a column: the number already there.
    pub fn next_order(&self, slug: &str) -> i32 {
        self.tasks.iter().filter(|t| t.status == slug).count() as i32
    }

    pub fn changelog(&self, task_id: &str) -> &[ChangelogEntry] {
        self.changelogs
            .get(task_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.is_read).count()
    }
}

#[derive(Debug)]
pub enum Action {
    ProjectsLoaded {
        generation: u64,
        projects: Vec<Project>,
    },
    ProjectSelected(String),
    ProjectUpserted(Project),
    ProjectRemoved(String),
    BoardLoaded {
        generation: u64,
        project_id: String,
        columns: Vec<Column>,
        tasks: Vec<Task>,
        changelogs: HashMap<String, Vec<ChangelogEntry>>,
        attachment_counts: HashMap<String, usize>,
    },
    ColumnsReplaced(Vec<Column>),
    TaskInserted(Task),
    /// Local edit shown before the server has answered.
    TaskEdited(Task),
    TaskConfirmed(Task),
    TaskEditFailed {
        task_id: String,
        error: String,
    },
    TaskRemoved(String),
    ChangelogLoaded {
        task_id: String,
        entries: Vec<ChangelogEntry>,
    },
    AttachmentCounted {
        task_id: String,
        count: usize,
    },
    ArchiveLoaded {
        generation: u64,
        tasks: Vec<Task>,
    },
    TodosLoaded {
        generation: u64,
        todos: Vec<Todo>,
    },
    TodoUpserted(Todo),
    TodoRemoved(String),
    NoteLoaded(Option<Note>),
    NotificationsLoaded {
        generation: u64,
        notifications: Vec<Notification>,
    },
    NotificationRead(String),
    AllNotificationsRead,
    NotificationRemoved(String),
    ReportReady(ProjectTimeReport),
    Status(String),
    Failed(String),
    ConflictsDismissed,
}

fn changed_fields(a: &Task, b: &Task) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if a.title != b.title {
        fields.push("title");
    }
    if a.description != b.description {
        fields.push("description");
    }
    if a.status != b.status {
        fields.push("status");
    }
    if a.priority != b.priority {
        fields.push("priority");
    }
    if a.order != b.order {
        fields.push("order");
    }
    if a.project_id != b.project_id {
        fields.push("project");
    }
    fields
}

#[derive(Debug, Default)]
pub struct Store {
    state: BoardState,
    generations: HashMap<Collection, u64>,
    pending: HashMap<String, PendingEdit>,
}

impl Store {
    pub fn new() -> Store {
        Store::default()
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    /// Starts a fetch of `collection` and returns the generation its result must carry.
    pub fn begin(&mut self, collection: Collection) -> u64 {
        let generation = self.generations.entry(collection).or_insert(0);
        *generation += 1;
        *generation
    }

    fn is_current(&self, collection: Collection, generation: u64) -> bool {
        let latest = self.generations.get(&collection).copied().unwrap_or(0);
        if generation < latest {
            log::debug!(
                "dropping superseded {:?} result (generation {} < {})",
                collection,
                generation,
                latest
            );
            return false;
        }
        true
    }

    pub fn has_pending(&self, task_id: &str) -> bool {
        self.pending.contains_key(task_id)
    }

    pub fn dispatch(&mut self, action: Action) {
        match action {
            Action::ProjectsLoaded {
                generation,
                projects,
            } => {
                if !self.is_current(Collection::Projects, generation) {
                    return;
                }
                self.state.projects = projects;
                let active_exists = self
                    .state
                    .active_project_id
                    .as_deref()
                    .is_some_and(|id| self.state.projects.iter().any(|p| p.id == id));
                if !active_exists {
                    let first = self.state.projects.first().map(|p| p.id.clone());
                    self.select_project(first);
                }
            }
            Action::ProjectSelected(id) => self.select_project(Some(id)),
            Action::ProjectUpserted(project) => {
                match self.state.projects.iter_mut().find(|p| p.id == project.id) {
                    Some(existing) => *existing = project,
                    None => self.state.projects.push(project),
                }
            }
            Action::ProjectRemoved(id) => {
                self.state.projects.retain(|p| p.id != id);
                if self.state.active_project_id.as_deref() == Some(id.as_str()) {
                    let first = self.state.projects.first().map(|p| p.id.clone());
                    self.select_project(first);
                }
            }
            Action::BoardLoaded {
                generation,
                project_id,
                columns,
                tasks,
                changelogs,
                attachment_counts,
            } => {
                if !self.is_current(Collection::Board, generation)
                    || self.state.active_project_id.as_deref() != Some(project_id.as_str())
                {
                    return;
                }
                self.state.columns = columns;
                self.state.columns.sort_by_key(|c| c.order);
                // rows with an unconfirmed local edit keep the local version
                let pending = &self.pending;
                let local: Vec<Task> = self
                    .state
                    .tasks
                    .iter()
                    .filter(|t| pending.contains_key(&t.id))
                    .cloned()
                    .collect();
                self.state.tasks = tasks;
                for task in local {
                    if let Some(slot) = self.state.tasks.iter_mut().find(|t| t.id == task.id) {
                        *slot = task;
                    }
                }
                self.state.changelogs = changelogs;
                self.state.attachment_counts = attachment_counts;
            }
            Action::ColumnsReplaced(mut columns) => {
                columns.sort_by_key(|c| c.order);
                self.state.columns = columns;
            }
            Action::TaskInserted(task) => {
                if self.state.active_project_id.as_deref() == Some(task.project_id.as_str()) {
                    self.state.tasks.push(task);
                }
            }
            Action::TaskEdited(optimistic) => self.apply_optimistic(optimistic),
            Action::TaskConfirmed(server) => self.confirm(server),
            Action::TaskEditFailed { task_id, error } => {
                if let Some(edit) = self.pending.remove(&task_id) {
                    self.put_task(edit.snapshot);
                }
                self.state.status = Some(error);
            }
            Action::TaskRemoved(id) => {
                self.pending.remove(&id);
                self.state.tasks.retain(|t| t.id != id);
                self.state.archived.retain(|t| t.id != id);
                self.state.changelogs.remove(&id);
            }
            Action::ChangelogLoaded { task_id, entries } => {
                self.state.changelogs.insert(task_id, entries);
            }
            Action::AttachmentCounted { task_id, count } => {
                self.state.attachment_counts.insert(task_id, count);
            }
            Action::ArchiveLoaded { generation, tasks } => {
                if self.is_current(Collection::Archive, generation) {
                    self.state.archived = tasks;
                }
            }
            Action::TodosLoaded { generation, todos } => {
                if self.is_current(Collection::Todos, generation) {
                    self.state.todos = todos;
                }
            }
            Action::TodoUpserted(todo) => {
                match self.state.todos.iter_mut().find(|t| t.id == todo.id) {
                    Some(existing) => *existing = todo,
                    None => self.state.todos.push(todo),
                }
            }
            Action::TodoRemoved(id) => self.state.todos.retain(|t| t.id != id),
            Action::NoteLoaded(note) => self.state.note = note,
            Action::NotificationsLoaded {
                generation,
                notifications,
            } => {
                if self.is_current(Collection::Notifications, generation) {
                    self.state.notifications = notifications;
                }
            }
            Action::NotificationRead(id) => {
                if let Some(n) = self.state.notifications.iter_mut().find(|n| n.id == id) {
                    n.is_read = true;
                }
            }
            Action::AllNotificationsRead => {
                for n in &mut self.state.notifications {
                    n.is_read = true;
                }
            }
            Action::NotificationRemoved(id) => self.state.notifications.retain(|n| n.id != id),
            Action::ReportReady(report) => {
                if self.state.active_project_id.as_deref() == Some(report.project_id.as_str()) {
                    self.state.report = Some(report);
                }
            }
            Action::Status(message) => self.state.status = Some(message),
            Action::Failed(message) => {
                log::error!("{}", message);
                self.state.status = Some(message);
            }
            Action::ConflictsDismissed => self.state.conflicts.clear(),
        }
    }

    fn select_project(&mut self, id: Option<String>) {
        if self.state.active_project_id == id {
            return;
        }
        self.state.active_project_id = id;
        self.state.columns.clear();
        self.state.tasks.clear();
        self.state.changelogs.clear();
        self.state.attachment_counts.clear();
        self.state.report = None;
        self.pending.clear();
    }

    // Inserts or replaces a task, dropping it when it left the active project.
    fn put_task(&mut self, task: Task) {
        let in_active = self.state.active_project_id.as_deref() == Some(task.project_id.as_str());
        let position = self.state.tasks.iter().position(|t| t.id == task.id);
        match (position, in_active && task.archived_at.is_none()) {
            (Some(i), true) => self.state.tasks[i] = task,
            (Some(i), false) => {
                self.state.tasks.remove(i);
            }
            (None, true) => self.state.tasks.push(task),
            (None, false) => {}
        }
    }

    fn apply_optimistic(&mut self, optimistic: Task) {
        let Some(current) = self.state.task(&optimistic.id).cloned() else {
            log::warn!("optimistic edit for unknown task {}", optimistic.id);
            return;
        };
        // a second edit before the first is confirmed keeps the original snapshot
        let snapshot = match self.pending.remove(&optimistic.id) {
            Some(edit) => edit.snapshot,
            None => current,
        };
        self.pending.insert(
            optimistic.id.clone(),
            PendingEdit {
                snapshot,
                optimistic: optimistic.clone(),
            },
        );
        self.put_task(optimistic);
    }

    fn confirm(&mut self, server: Task) {
        if let Some(edit) = self.pending.remove(&server.id) {
            let ours = changed_fields(&edit.snapshot, &edit.optimistic);
            let theirs: Vec<&'static str> = changed_fields(&edit.optimistic, &server)
                .into_iter()
                .filter(|f| !ours.contains(f))
                .collect();
            if !theirs.is_empty() {
                log::warn!("task {} changed remotely: {:?}", server.id, theirs);
                self.state.conflicts.push(Conflict {
                    task_id: server.id.clone(),
                    task_title: server.title.clone(),
                    fields: theirs,
                });
            }
            self.put_task(server);
            return;
        }

        let stale = self
            .state
            .task(&server.id)
            .and_then(|local| Some(local.updated_at? > server.updated_at?))
            .unwrap_or(false);
        if stale {
            log::debug!("ignoring older copy of task {}", server.id);
            return;
        }
        self.put_task(server);
    }
}
