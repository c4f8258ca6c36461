/// Per-column ordered views over the full card set.
///
/// Views are pure: they hold no state and may be rebuilt on every render.
/// Sorting is stable, so cards with equal keys keep their input order and
/// the board does not jitter between renders.
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::types::{Card, ColumnId};

/// Non-archived cards of `column`, ascending by order.
pub fn view(cards: &[Card], column: ColumnId) -> Vec<&Card> {
    let mut out: Vec<&Card> = cards.iter().filter(|c| c.is_visible_in(column)).collect();
    out.sort_by(|a, b| compare_orders(a.order, b.order));
    out
}

/// Same as [`view`] but leaves out one card (the one being dragged).
pub fn view_excluding<'a>(cards: &'a [Card], column: ColumnId, excluded_id: &str) -> Vec<&'a Card> {
    let mut out = view(cards, column);
    out.retain(|c| c.id != excluded_id);
    out
}

/// Views for every column, keyed in board display order.
pub fn board_views(cards: &[Card]) -> BTreeMap<ColumnId, Vec<&Card>> {
    ColumnId::ALL
        .into_iter()
        .map(|col| (col, view(cards, col)))
        .collect()
}

/// Total order over keys. NaN sorts after every finite key so a corrupt
/// document cannot scramble the rest of the column.
pub fn compare_orders(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

/// Full collection with each column's cards grouped and sorted.
/// Archived cards are kept, after the visible ones of their column.
pub fn sorted_projection(cards: Vec<Card>) -> Vec<Card> {
    let mut cards = cards;
    cards.sort_by(|a, b| {
        a.column
            .cmp(&b.column)
            .then(a.is_archived.cmp(&b.is_archived))
            .then_with(|| compare_orders(a.order, b.order))
    });
    cards
}
