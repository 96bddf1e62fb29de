use crate::error::{Error, Result};
use crate::models::Column;
use regex::Regex;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewColumn {
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    pub order: i32,
    pub is_done_column: bool,
}

/// Columns every new project starts with.
pub fn default_columns() -> Vec<NewColumn> {
    [("To Do", "todo", false), ("In Progress", "in-progress", false), ("Done", "done", true)]
        .iter()
        .enumerate()
        .map(|(i, (name, slug, done))| NewColumn {
            name: name.to_string(),
            slug: slug.to_string(),
            color: None,
            order: i as i32,
            is_done_column: *done,
        })
        .collect()
}

pub fn generate_slug(name: &str) -> String {
    let non_alnum = Regex::new(r"[^a-z0-9]+").unwrap();
    non_alnum
        .replace_all(&name.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

pub fn is_slug_unique(columns: &[Column], slug: &str, exclude_id: Option<&str>) -> bool {
    !columns
        .iter()
        .any(|c| c.slug == slug && Some(c.id.as_str()) != exclude_id)
}

pub fn first_column(columns: &[Column]) -> Option<&Column> {
    columns.iter().min_by_key(|c| c.order)
}

pub fn done_column(columns: &[Column]) -> Option<&Column> {
    columns.iter().find(|c| c.is_done_column)
}

/// Column a task with status `slug` lands in when it joins a board with
/// `columns`: the same slug when present, else the first column.
pub fn landing_slug<'a>(columns: &'a [Column], slug: &str) -> Option<&'a str> {
    columns
        .iter()
        .find(|c| c.slug == slug)
        .or_else(|| first_column(columns))
        .map(|c| c.slug.as_str())
}

pub fn sort_columns(columns: &mut [Column]) {
    columns.sort_by_key(|c| c.order);
}

/// Validates a column name and turns it into an insert payload appended
/// after the existing columns.
pub fn prepare_new_column(
    columns: &[Column],
    name: &str,
    color: Option<String>,
) -> Result<NewColumn> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("Column name cannot be empty".to_string()));
    }
    let slug = generate_slug(name);
    if slug.is_empty() {
        return Err(Error::Validation(format!(
            "Column name '{}' has no usable characters",
            name
        )));
    }
    if !is_slug_unique(columns, &slug, None) {
        return Err(Error::Validation(format!("Column '{}' already exists", slug)));
    }
    Ok(NewColumn {
        name: name.to_string(),
        slug,
        color,
        order: columns.len() as i32,
        is_done_column: false,
    })
}

/// Marks `id` as the done column and clears the flag everywhere else.
///
/// Returns the id of the column that lost the flag, if any.
pub fn set_done_column(columns: &mut [Column], id: &str) -> Result<Option<String>> {
    if !columns.iter().any(|c| c.id == id) {
        return Err(Error::NotFound(format!("column {}", id)));
    }
    let mut previous = None;
    for column in columns.iter_mut() {
        if column.id == id {
            column.is_done_column = true;
        } else if column.is_done_column {
            column.is_done_column = false;
            previous = Some(column.id.clone());
        }
    }
    Ok(previous)
}

/// Applies a new column order given as a full list of column ids.
pub fn reorder(columns: &[Column], ordered_ids: &[String]) -> Result<Vec<Column>> {
    if ordered_ids.len() != columns.len() {
        return Err(Error::Validation(format!(
            "expected {} column ids, got {}",
            columns.len(),
            ordered_ids.len()
        )));
    }
    ordered_ids
        .iter()
        .enumerate()
        .map(|(index, id)| {
            let column = columns
                .iter()
                .find(|c| &c.id == id)
                .ok_or_else(|| Error::NotFound(format!("column {}", id)))?;
            Ok(Column {
                order: index as i32,
                ..column.clone()
            })
        })
        .collect()
}

#[derive(Debug, PartialEq)]
pub struct ColumnDeletion {
    pub removed_slug: String,
    /// Column that receives the tasks of the removed one.
    pub fallback_slug: Option<String>,
    /// Remaining columns numbered 0..n in their previous relative order.
    pub remaining: Vec<Column>,
    /// `(id, new order)` for columns whose order actually changed.
    pub renumbered: Vec<(String, i32)>,
}

pub fn plan_deletion(
    columns: &[Column],
    id: &str,
    move_tasks_to: Option<&str>,
) -> Result<ColumnDeletion> {
    let removed = columns
        .iter()
        .find(|c| c.id == id)
        .ok_or_else(|| Error::NotFound(format!("column {}", id)))?;

    let mut remaining: Vec<Column> = columns.iter().filter(|c| c.id != id).cloned().collect();
    sort_columns(&mut remaining);

    let fallback_slug = match move_tasks_to {
        Some(target) => Some(
            remaining
                .iter()
                .find(|c| c.id == target)
                .ok_or_else(|| Error::NotFound(format!("column {}", target)))?
                .slug
                .clone(),
        ),
        None => remaining.first().map(|c| c.slug.clone()),
    };

    let mut renumbered = Vec::new();
    for (index, column) in remaining.iter_mut().enumerate() {
        let order = index as i32;
        if column.order != order {
            column.order = order;
            renumbered.push((column.id.clone(), order));
        }
    }

    Ok(ColumnDeletion {
        removed_slug: removed.slug.clone(),
        fallback_slug,
        remaining,
        renumbered,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    fn column(id: &str, slug: &str, order: i32, done: bool) -> Column {
        Column {
            id: id.to_string(),
            project_id: "p1".to_string(),
            name: slug.to_string(),
            slug: slug.to_string(),
            color: None,
            order,
            is_done_column: done,
        }
    }

    #[fixture]
    fn board() -> Vec<Column> {
        vec![
            column("c0", "todo", 0, false),
            column("c1", "doing", 1, false),
            column("c2", "review", 2, false),
            column("c3", "done", 3, true),
        ]
    }

    #[rstest]
    #[case("In Progress", "in-progress")]
    #[case("  Code Review!! ", "code-review")]
    #[case("QA / Testing", "qa-testing")]
    #[case("Stage 2", "stage-2")]
    #[case("???", "")]
    fn test_generate_slug(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(generate_slug(name), expected);
    }

    #[rstest]
    #[case("review", Some("review"))]
    #[case("done", Some("done"))]
    #[case("in-progress", Some("todo"))]
    fn test_landing_slug(
        board: Vec<Column>,
        #[case] slug: &str,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(landing_slug(&board, slug), expected);
    }

    #[test]
    fn test_landing_slug_on_empty_board() {
        assert_eq!(landing_slug(&[], "todo"), None);
    }

    #[test]
    fn test_landing_slug_prefers_lowest_order() {
        let shuffled = vec![
            column("c1", "doing", 1, false),
            column("c0", "backlog", 0, false),
        ];
        assert_eq!(landing_slug(&shuffled, "todo"), Some("backlog"));
    }

    #[rstest]
    fn test_slug_uniqueness_respects_exclusion(board: Vec<Column>) {
        assert!(!is_slug_unique(&board, "doing", None));
        assert!(is_slug_unique(&board, "doing", Some("c1")));
        assert!(is_slug_unique(&board, "blocked", None));
    }

    #[rstest]
    fn test_new_column_is_appended(board: Vec<Column>) {
        let new = prepare_new_column(&board, "Blocked", None).unwrap();
        assert_eq!(new.slug, "blocked");
        assert_eq!(new.order, 4);
        assert!(!new.is_done_column);
    }

    #[rstest]
    #[case("")]
    #[case("Doing")]
    #[case("--")]
    fn test_new_column_rejects_bad_names(board: Vec<Column>, #[case] name: &str) {
        assert!(matches!(
            prepare_new_column(&board, name, None),
            Err(Error::Validation(_))
        ));
    }

    #[rstest]
    fn test_done_flag_is_exclusive(mut board: Vec<Column>) {
        let previous = set_done_column(&mut board, "c2").unwrap();
        assert_eq!(previous.as_deref(), Some("c3"));
        let done: Vec<&str> = board
            .iter()
            .filter(|c| c.is_done_column)
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(done, vec!["c2"]);
    }

    #[rstest]
    fn test_reorder_assigns_indices(board: Vec<Column>) {
        let ids: Vec<String> = ["c3", "c0", "c2", "c1"].iter().map(|s| s.to_string()).collect();
        let reordered = reorder(&board, &ids).unwrap();
        let orders: Vec<(&str, i32)> = reordered.iter().map(|c| (c.id.as_str(), c.order)).collect();
        assert_eq!(orders, vec![("c3", 0), ("c0", 1), ("c2", 2), ("c1", 3)]);
    }

    #[rstest]
    fn test_reorder_rejects_unknown_ids(board: Vec<Column>) {
        let ids: Vec<String> = ["c3", "c0", "c2", "zz"].iter().map(|s| s.to_string()).collect();
        assert!(matches!(reorder(&board, &ids), Err(Error::NotFound(_))));
    }

    #[rstest]
    fn test_deletion_defaults_to_first_remaining(board: Vec<Column>) {
        let plan = plan_deletion(&board, "c1", None).unwrap();
        assert_eq!(plan.removed_slug, "doing");
        assert_eq!(plan.fallback_slug.as_deref(), Some("todo"));
        assert_eq!(
            plan.renumbered,
            vec![("c2".to_string(), 1), ("c3".to_string(), 2)]
        );
        assert_eq!(plan.remaining.len(), 3);
    }

    #[rstest]
    fn test_deletion_with_explicit_target(board: Vec<Column>) {
        let plan = plan_deletion(&board, "c0", Some("c2")).unwrap();
        assert_eq!(plan.fallback_slug.as_deref(), Some("review"));
        assert!(plan.remaining.iter().any(|c| c.slug == "doing" && c.order == 0));
    }

    #[rstest]
    fn test_deletion_target_cannot_be_removed_column(board: Vec<Column>) {
        assert!(plan_deletion(&board, "c1", Some("c1")).is_err());
    }

    #[test]
    fn test_default_columns_have_single_done() {
        let defaults = default_columns();
        assert_eq!(defaults.len(), 3);
        assert_eq!(defaults.iter().filter(|c| c.is_done_column).count(), 1);
        assert_eq!(defaults[0].order, 0);
    }
}
