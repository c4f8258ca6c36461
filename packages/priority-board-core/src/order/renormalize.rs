/// Order-key renormalization.
///
/// A column is degraded when, in sorted order:
/// - the first key is <= 0
/// - any key is not finite
/// - an adjacent gap is <= 0 (collision) or below `min_gap`
/// - an adjacent gap exceeds `max_gap`
///
/// Repair reassigns every visible card of the column to `spacing * (i + 1)`,
/// keeping relative order. Old absolute values carry no meaning afterwards.
use serde::{Deserialize, Serialize};

use crate::order::column_index;
use crate::types::{Card, ColumnId};

pub const DEFAULT_SPACING: f64 = 10_000.0;
pub const DEFAULT_MAX_GAP: f64 = 100_000.0;
pub const DEFAULT_MIN_GAP: f64 = 1e-6;

/// Thresholds for the degradation test and the spacing used on repair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenormalizePolicy {
    pub spacing: f64,
    pub max_gap: f64,
    pub min_gap: f64,
}

impl Default for RenormalizePolicy {
    fn default() -> Self {
        Self {
            spacing: DEFAULT_SPACING,
            max_gap: DEFAULT_MAX_GAP,
            min_gap: DEFAULT_MIN_GAP,
        }
    }
}

impl RenormalizePolicy {
    /// Degradation test over a sorted column view.
    pub fn is_degraded(&self, view: &[&Card]) -> bool {
        let Some(first) = view.first() else {
            return false;
        };
        if !first.order.is_finite() || first.order <= 0.0 {
            return true;
        }
        view.windows(2).any(|pair| {
            let gap = pair[1].order - pair[0].order;
            !gap.is_finite() || gap <= 0.0 || gap < self.min_gap || gap > self.max_gap
        })
    }

    /// Evenly spaced keys for `count` cards.
    pub fn keys(&self, count: usize) -> Vec<f64> {
        (1..=count).map(|i| i as f64 * self.spacing).collect()
    }

    /// Renormalize `column` inside `cards` if it is degraded.
    /// Returns the number of cards whose key changed.
    pub fn renormalize_column(&self, cards: &mut [Card], column: ColumnId) -> usize {
        let ordered_ids: Vec<String> = {
            let view = column_index::view(cards, column);
            if !self.is_degraded(&view) {
                return 0;
            }
            view.iter().map(|c| c.id.clone()).collect()
        };

        let mut changed = 0;
        for (id, new_order) in ordered_ids.iter().zip(self.keys(ordered_ids.len())) {
            if let Some(card) = cards.iter_mut().find(|c| &c.id == id) {
                if card.order != new_order {
                    card.order = new_order;
                    changed += 1;
                }
            }
        }
        log::info!(
            "[board.order.renormalize] Column {} renormalized ({} of {} keys changed)",
            column,
            changed,
            ordered_ids.len()
        );
        changed
    }
}
