use crate::app::{matches_query, ActiveInput, App, InputMode, Prompt, View};
use crate::models::{Priority, ProjectTimeReport, Task};
use crate::store::BoardState;
use crate::worktime::{format_work_time, format_work_time_long};
use crossterm::event::{self, Event as CEvent, KeyEventKind};
use mockable::Clock;
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

fn centered_rect_absolute(width: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length((r.height.saturating_sub(height)) / 2),
                Constraint::Length(height),
                Constraint::Length((r.height.saturating_sub(height) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Length((r.width.saturating_sub(width)) / 2),
                Constraint::Length(width),
                Constraint::Length((r.width.saturating_sub(width) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn key_hint(keys: &[(&'static str, &'static str)]) -> Text<'static> {
    let mut spans = Vec::new();
    for (key, label) in keys {
        spans.push(Span::styled(
            format!(" {} ", key),
            Style::default().fg(Color::Red),
        ));
        spans.push(Span::raw(format!(": {} ", label)));
    }
    Text::from(Line::from(spans))
}

fn get_legend(input_mode: &InputMode, view: View) -> Text<'static> {
    match (input_mode, view) {
        (InputMode::Normal, View::Board) => key_hint(&[
            ("q", "Quit"),
            ("hjkl", "Navigate"),
            ("H/L", "Move Task"),
            ("a", "Add Task"),
            ("e", "Edit Task"),
            ("p", "Priority"),
            ("D", "Delete"),
            ("Enter", "Details"),
            ("[ ]", "Project"),
            ("P/E/K", "New/Rename/Delete Project"),
            ("C", "Project Color"),
            ("M", "Move to Next Project"),
            ("1/2/3", "Filter Priority"),
            ("f/F", "Attach/Detach"),
            ("c/R/X", "Add/Rename/Delete Column"),
            ("O", "Column Color"),
            ("< >", "Reorder"),
            ("m", "Done Column"),
            ("+/-", "Stale Threshold"),
            ("t", "Todos"),
            ("n", "Notes"),
            ("i", "Inbox"),
            ("A", "Archive"),
            ("w", "Work Time"),
        ]),
        (InputMode::Normal, View::Todos) => key_hint(&[
            ("Esc", "Board"),
            ("j/k", "Navigate"),
            ("a", "Add"),
            ("Space", "Toggle"),
            ("d", "Delete"),
        ]),
        (InputMode::Normal, View::Notes) => key_hint(&[("Esc", "Board"), ("e", "Edit")]),
        (InputMode::Normal, View::Notifications) => key_hint(&[
            ("Esc", "Board"),
            ("j/k", "Navigate"),
            ("Enter", "Mark Read"),
            ("R", "Mark All Read"),
            ("d", "Delete"),
        ]),
        (InputMode::Normal, View::Archive) => key_hint(&[
            ("Esc", "Board"),
            ("j/k", "Navigate"),
            ("u", "Restore"),
            ("/", "Search"),
            ("d", "Delete"),
        ]),
        (InputMode::Normal, View::Report) => {
            key_hint(&[("Esc", "Board"), ("j/k", "Navigate"), ("r", "Recalculate")])
        }
        (InputMode::Editing, _) => key_hint(&[
            ("i", "Insert Mode"),
            ("Tab", "Switch Field"),
            ("Enter", "Submit"),
            ("Esc", "Cancel"),
        ]),
        (InputMode::Insert, _) => key_hint(&[("Esc", "Exit Insert Mode")]),
    }
}

fn priority_style(priority: Priority) -> Style {
    match priority {
        Priority::High => Style::default().fg(Color::Red),
        Priority::Medium => Style::default().fg(Color::Yellow),
        Priority::Low => Style::default().fg(Color::Blue),
    }
}

// "#rrggbb" as stored on projects and columns.
fn hex_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let value = u32::from_str_radix(hex, 16).ok()?;
    Some(Color::Rgb(
        (value >> 16) as u8,
        (value >> 8) as u8,
        value as u8,
    ))
}

fn bold(label: &str) -> Span<'static> {
    Span::styled(
        label.to_string(),
        Style::default().add_modifier(Modifier::BOLD),
    )
}

fn draw_header<C: Clock>(f: &mut Frame, app: &App<C>, area: Rect) {
    let state = app.state();
    let mut spans = match state.active_project() {
        Some(project) => vec![
            Span::styled(
                project.name.clone(),
                Style::default()
                    .fg(hex_color(&project.color).unwrap_or(Color::Yellow))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(
                "  (stale after {}h)",
                project.stale_threshold_hours()
            )),
        ],
        None => vec![Span::raw("No project, press P to create one")],
    };
    if !app.priority_filter.is_empty() {
        let shown: Vec<&str> = app.priority_filter.iter().map(|p| p.as_str()).collect();
        spans.push(Span::styled(
            format!("  showing {}", shown.join("/")),
            Style::default().fg(Color::Green),
        ));
    }
    let unread = state.unread_count();
    if unread > 0 {
        spans.push(Span::styled(
            format!("  {} unread", unread),
            Style::default().fg(Color::Cyan),
        ));
    }
    if !state.conflicts.is_empty() {
        let names: Vec<String> = state
            .conflicts
            .iter()
            .map(|c| format!("{} ({})", c.task_title, c.fields.join(", ")))
            .collect();
        spans.push(Span::styled(
            format!("  Changed elsewhere: {} [x to dismiss]", names.join("; ")),
            Style::default().fg(Color::Magenta),
        ));
    }
    if let Some(status) = &state.status {
        spans.push(Span::styled(
            format!("  {}", status),
            Style::default().fg(Color::Red),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn task_item<C: Clock>(app: &App<C>, task: &Task) -> ListItem<'static> {
    let state = app.state();
    let (stage_ms, stale) = app.stage_info(task);
    let mut spans = vec![
        Span::styled(
            format!("{} ", task.priority.as_str().chars().next().unwrap_or('-')),
            priority_style(task.priority),
        ),
        Span::raw(task.title.clone()),
        Span::styled(
            format!(" {}", format_work_time(stage_ms)),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    if let Some(count) = state.attachment_counts.get(&task.id).filter(|c| **c > 0) {
        spans.push(Span::styled(
            format!(" +{}", count),
            Style::default().fg(Color::Cyan),
        ));
    }
    if stale {
        spans.push(Span::styled(" STALE", Style::default().fg(Color::Red)));
    }
    ListItem::new(Line::from(spans))
}

fn draw_board<C: Clock>(f: &mut Frame, app: &App<C>, area: Rect) {
    let state = app.state();
    let (board_area, detail_area) = if app.show_detail {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)].as_ref())
            .split(area);
        (chunks[0], Some(chunks[1]))
    } else {
        (area, None)
    };

    if state.columns.is_empty() {
        let paragraph = Paragraph::new("No columns yet. Press c to add one.")
            .block(Block::default().borders(Borders::ALL).title("Board"));
        f.render_widget(paragraph, board_area);
        return;
    }

    let count = state.columns.len() as u32;
    let constraints: Vec<Constraint> = (0..count).map(|_| Constraint::Ratio(1, count)).collect();
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(board_area);

    for (i, column) in state.columns.iter().enumerate() {
        let tasks = app.visible_tasks(&column.slug);
        let mut title = format!("{} ({})", column.name, tasks.len());
        if column.is_done_column {
            title.push_str(" done");
        }
        let selected = i == app.selected_column;
        let border_style = if selected {
            Style::default().fg(Color::Green)
        } else {
            match column.color.as_deref().and_then(hex_color) {
                Some(color) => Style::default().fg(color),
                None => Style::default(),
            }
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(title);

        let items: Vec<ListItem> = tasks.iter().map(|t| task_item(app, t)).collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">> ");

        let mut list_state = ListState::default();
        if selected && !tasks.is_empty() {
            list_state.select(Some(app.selected_row));
        }
        f.render_stateful_widget(list, chunks[i], &mut list_state);
    }

    if let Some(detail_area) = detail_area {
        draw_detail(f, app, detail_area);
    }
}

fn draw_detail<C: Clock>(f: &mut Frame, app: &App<C>, area: Rect) {
    let detail_block = Block::default().borders(Borders::ALL).title("Task Details");
    let Some(task) = app.selected_task() else {
        let paragraph = Paragraph::new("No task selected")
            .block(detail_block)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
        return;
    };
    let state = app.state();
    let (stage_ms, stale) = app.stage_info(task);

    let mut lines: Vec<Line<'static>> = vec![
        Line::from(vec![bold("Title: "), Span::raw(task.title.clone())]),
        Line::from(vec![
            bold("Priority: "),
            Span::styled(task.priority.to_string(), priority_style(task.priority)),
        ]),
        Line::from(vec![
            bold("Created: "),
            Span::raw(task.created_at.format("%Y-%m-%d %H:%M").to_string()),
        ]),
        Line::from(vec![
            bold("In stage: "),
            Span::raw(format_work_time_long(stage_ms)),
            if stale {
                Span::styled(" (stale)", Style::default().fg(Color::Red))
            } else {
                Span::raw("")
            },
        ]),
        Line::from(bold("Description: ")),
    ];

    match task.description.as_deref().map(str::trim) {
        Some(desc) if !desc.is_empty() => {
            lines.extend(desc.lines().map(|l| Line::from(Span::raw(l.to_string()))));
        }
        _ => lines.push(Line::from(Span::raw("No description".to_string()))),
    }

    lines.push(Line::from(bold("Attachments: ")));
    if app.detail_attachments.is_empty() {
        lines.push(Line::from(Span::raw("None".to_string())));
    }
    for attachment in &app.detail_attachments {
        lines.push(Line::from(Span::raw(format!(
            "  {} ({} KB)",
            attachment.file_name,
            attachment.file_size / 1024
        ))));
    }

    lines.push(Line::from(bold("History: ")));
    for entry in state.changelog(&task.id).iter().rev() {
        let detail = match (&entry.from_value, &entry.to_value, &entry.project_name) {
            (Some(from), Some(to), _) => format!("{} -> {}", from, to),
            (None, Some(to), _) => to.clone(),
            (_, _, Some(project)) => format!("to {}", project),
            _ => String::new(),
        };
        lines.push(Line::from(vec![
            Span::styled(
                entry.created_at.format("%m-%d %H:%M ").to_string(),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw(format!("{} {}", entry.change_type.label(), detail)),
        ]));
    }

    let paragraph = Paragraph::new(lines)
        .block(detail_block)
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn list_widget(title: &str, items: Vec<ListItem<'static>>, empty: &'static str) -> List<'static> {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title.to_string());
    if items.is_empty() {
        return List::new(vec![ListItem::new(empty)]).block(block);
    }
    List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ")
}

fn draw_todos(f: &mut Frame, state: &BoardState, list_state: &mut ListState, area: Rect) {
    let items = state
        .todos
        .iter()
        .map(|todo| {
            let (mark, style) = if todo.completed {
                ("[x] ", Style::default().fg(Color::DarkGray))
            } else {
                ("[ ] ", Style::default())
            };
            ListItem::new(Line::from(vec![
                Span::raw(mark),
                Span::styled(todo.text.clone(), style),
            ]))
        })
        .collect();
    f.render_stateful_widget(list_widget("Todos", items, "No todos"), area, list_state);
}

fn draw_notes(f: &mut Frame, state: &BoardState, area: Rect) {
    let (content, title) = match &state.note {
        Some(note) => (
            note.content.clone(),
            format!("Notes (saved {})", note.updated_at.format("%Y-%m-%d %H:%M")),
        ),
        None => ("Nothing written yet.".to_string(), "Notes".to_string()),
    };
    let paragraph = Paragraph::new(content)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn draw_notifications(f: &mut Frame, state: &BoardState, list_state: &mut ListState, area: Rect) {
    let items = state
        .notifications
        .iter()
        .map(|n| {
            let marker = if n.is_read {
                Span::raw("  ")
            } else {
                Span::styled("* ", Style::default().fg(Color::Cyan))
            };
            let mut spans = vec![
                marker,
                Span::styled(
                    n.created_at.format("%m-%d %H:%M ").to_string(),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(n.title.clone()),
            ];
            if let Some(body) = &n.body {
                spans.push(Span::raw(format!(" - {}", body)));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();
    let title = format!("Notifications ({} unread)", state.unread_count());
    f.render_stateful_widget(
        list_widget(&title, items, "No notifications"),
        area,
        list_state,
    );
}

fn draw_archive(
    f: &mut Frame,
    state: &BoardState,
    query: &str,
    list_state: &mut ListState,
    area: Rect,
) {
    let items = state
        .archived
        .iter()
        .filter(|task| matches_query(task, query))
        .map(|task| {
            let archived = task
                .archived_at
                .map(|at| at.format("%Y-%m-%d ").to_string())
                .unwrap_or_default();
            ListItem::new(Line::from(vec![
                Span::styled(archived, Style::default().fg(Color::DarkGray)),
                Span::raw(task.title.clone()),
            ]))
        })
        .collect();
    let title = if query.is_empty() {
        "Archive".to_string()
    } else {
        format!("Archive matching \"{}\"", query)
    };
    f.render_stateful_widget(
        list_widget(&title, items, "No archived tasks"),
        area,
        list_state,
    );
}

fn draw_report(
    f: &mut Frame,
    report: Option<&ProjectTimeReport>,
    list_state: &mut ListState,
    area: Rect,
) {
    let Some(report) = report else {
        let paragraph = Paragraph::new("No report yet. Press r to calculate.")
            .block(Block::default().borders(Borders::ALL).title("Work Time"));
        f.render_widget(paragraph, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3 + report.column_breakdown.len() as u16),
                Constraint::Min(0),
            ]
            .as_ref(),
        )
        .split(area);

    let mut summary = vec![Line::from(vec![
        bold("Total: "),
        Span::raw(format_work_time_long(report.total_work_time_ms)),
        Span::styled(
            format!("  as of {}", report.generated_at.format("%H:%M")),
            Style::default().fg(Color::DarkGray),
        ),
    ])];
    for column in &report.column_breakdown {
        summary.push(Line::from(format!(
            "  {:<20} {}",
            column.column_name,
            format_work_time(column.total_time_ms)
        )));
    }
    let header = Paragraph::new(summary).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Work Time: {}", report.project_name)),
    );
    f.render_widget(header, chunks[0]);

    let items = report
        .task_breakdown
        .iter()
        .map(|task| {
            let mut lines = vec![Line::from(vec![
                Span::styled(
                    format!("{:>8} ", format_work_time(task.total_work_time_ms)),
                    Style::default().fg(Color::Yellow),
                ),
                Span::raw(task.task_title.clone().unwrap_or_else(|| task.task_id.clone())),
            ])];
            for entry in &task.entries {
                let end = match entry.end_time {
                    Some(end) => end.format("%m-%d %H:%M").to_string(),
                    None => "ongoing".to_string(),
                };
                lines.push(Line::from(Span::styled(
                    format!(
                        "           {} {} -> {} ({})",
                        entry.column_name,
                        entry.start_time.format("%m-%d %H:%M"),
                        end,
                        format_work_time(entry.duration_ms)
                    ),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            ListItem::new(lines)
        })
        .collect();
    f.render_stateful_widget(
        list_widget("Tasks", items, "No work time recorded"),
        chunks[1],
        list_state,
    );
}

fn draw_prompt<C: Clock>(f: &mut Frame, app: &App<C>, area: Rect) {
    let popup_width_percentage = 60;
    let popup_width = (area.width * popup_width_percentage / 100).saturating_sub(2);

    let title = match app.prompt {
        Prompt::Task => "New Task (!high, #column)",
        Prompt::Todo => "New Todo",
        Prompt::Column => "New Column",
        Prompt::RenameColumn => "Rename Column",
        Prompt::Project => "New Project",
        Prompt::RenameProject => "Rename Project",
        Prompt::EditTask => "Edit Task",
        Prompt::ArchiveSearch => "Search Archive (empty shows all)",
        Prompt::DeleteProject => "Type the project name to delete it",
        Prompt::Attachment => "Attach File (path)",
        Prompt::Note => "Edit Notes",
    };

    let title_lines = calculate_wrapped_lines(&app.input_title, popup_width).max(1) as u16;
    let description_lines = if app.prompt.has_description() {
        calculate_wrapped_lines(&app.input_description, popup_width).max(1) as u16 + 2
    } else {
        0
    };
    let popup_height = std::cmp::min(
        title_lines + 2 + description_lines,
        area.height.saturating_sub(2),
    );
    let popup_area = centered_rect_absolute(popup_width + 2, popup_height, area);
    f.render_widget(Clear, popup_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(title_lines + 2), Constraint::Min(0)].as_ref())
        .split(popup_area);

    let active_style = |input: ActiveInput| {
        if app.active_input == input {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    };

    let title_block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .style(active_style(ActiveInput::Title));
    let input = Paragraph::new(app.input_title.as_str())
        .style(Style::default().fg(Color::White))
        .block(title_block)
        .wrap(Wrap { trim: false });
    f.render_widget(input, chunks[0]);

    if app.prompt.has_description() {
        let description_block = Block::default()
            .title("Description")
            .borders(Borders::ALL)
            .style(active_style(ActiveInput::Description));
        let input = Paragraph::new(app.input_description.as_str())
            .style(Style::default().fg(Color::White))
            .block(description_block)
            .wrap(Wrap { trim: false });
        f.render_widget(input, chunks[1]);
    }
}

pub fn draw<C: Clock>(f: &mut Frame, app: &mut App<C>) {
    let size = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(2)].as_ref())
        .split(size);

    let header_chunk = chunks[0];
    let body_chunk = chunks[1];
    let footer_chunk = chunks[2];

    draw_header(f, app, header_chunk);

    let state = app.store.state();
    match app.view {
        View::Board => draw_board(f, app, body_chunk),
        View::Todos => draw_todos(f, state, &mut app.list_state, body_chunk),
        View::Notes => draw_notes(f, state, body_chunk),
        View::Notifications => draw_notifications(f, state, &mut app.list_state, body_chunk),
        View::Archive => {
            draw_archive(f, state, &app.archive_query, &mut app.list_state, body_chunk)
        }
        View::Report => draw_report(f, state.report.as_ref(), &mut app.list_state, body_chunk),
    }

    if app.input_mode != InputMode::Normal {
        draw_prompt(f, app, body_chunk);
    }

    let legend = Paragraph::new(get_legend(&app.input_mode, app.view))
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });

    f.render_widget(legend, footer_chunk);
}

pub async fn run_app<B: Backend, C: Clock>(
    terminal: &mut Terminal<B>,
    mut app: App<C>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| draw(f, &mut app))?;

        // Handle input
        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let should_quit = app.handle_input(key).await?;
                if should_quit {
                    return Ok(());
                }
            }
        }
    }
}

fn calculate_wrapped_lines(text: &str, max_width: u16) -> usize {
    let max_width = max_width.max(1) as usize;
    text.lines()
        .map(|line| line.chars().count().div_ceil(max_width).max(1))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_lines() {
        assert_eq!(calculate_wrapped_lines("", 10), 0);
        assert_eq!(calculate_wrapped_lines("short", 10), 1);
        assert_eq!(calculate_wrapped_lines("exactly10!", 10), 1);
        assert_eq!(calculate_wrapped_lines("eleven chars", 10), 2);
        assert_eq!(calculate_wrapped_lines("a\n\nb", 10), 3);
    }

    #[test]
    fn test_hex_color() {
        assert_eq!(hex_color("#e9a23b"), Some(Color::Rgb(0xe9, 0xa2, 0x3b)));
        assert_eq!(hex_color("e9a23b"), None);
        assert_eq!(hex_color("#fff"), None);
        assert_eq!(hex_color("#zzzzzz"), None);
    }

    #[test]
    fn test_centered_rect_fits_inside() {
        let outer = Rect::new(0, 0, 100, 40);
        let inner = centered_rect_absolute(60, 10, outer);
        assert_eq!(inner.width, 60);
        assert_eq!(inner.height, 10);
        assert_eq!(inner.x, 20);
        assert_eq!(inner.y, 15);
    }
}
