/// Default board content, written once when the store is first seen empty.
///
/// Ids are fixed, so two sessions racing to seed the same empty store
/// overwrite each other's documents instead of duplicating them.
use crate::order::renormalize::DEFAULT_SPACING;
use crate::types::{Card, ColumnId};

pub const SEED_EDITOR: &str = "System";

const SEED_CARDS: &[(&str, ColumnId, &str)] = &[
    ("seed-backlog-1", ColumnId::Backlog, "Collect feature ideas"),
    ("seed-backlog-2", ColumnId::Backlog, "Sketch the calendar view"),
    ("seed-todo-1", ColumnId::Todo, "Tidy up the shared drive"),
    ("seed-todo-2", ColumnId::Todo, "Book the team retro"),
    ("seed-doing-1", ColumnId::Doing, "Draft the quarterly plan"),
    ("seed-doing-2", ColumnId::Doing, "Review open pull requests"),
    ("seed-done-1", ColumnId::Done, "Fix the login outage"),
    ("seed-done-2", ColumnId::Done, "Ship the release notes"),
];

/// The default card set, stamped with `now`.
pub fn default_cards(now: i64) -> Vec<Card> {
    let mut position_in_column = std::collections::HashMap::new();
    SEED_CARDS
        .iter()
        .map(|(id, column, title)| {
            let slot = position_in_column.entry(*column).or_insert(0u32);
            *slot += 1;
            Card {
                id: (*id).to_string(),
                title: (*title).to_string(),
                column: *column,
                order: f64::from(*slot) * DEFAULT_SPACING,
                completed: false,
                created_by: SEED_EDITOR.to_string(),
                created_at: now,
                last_edited_by: SEED_EDITOR.to_string(),
                last_edited_time: now,
                last_moved_time: now,
                is_archived: false,
            }
        })
        .collect()
}
