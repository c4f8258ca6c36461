/// Fractional order keys.
///
/// A card's position within its column is a real number. New keys are
/// computed from the two neighbors of the insertion point:
/// - both present: midpoint
/// - head (no lower bound): `after - 1`
/// - tail (no upper bound): `before + 1`
/// - empty column: 0
///
/// Repeated insertion at one boundary halves the gap each time, so keys
/// converge toward the neighbor. The renormalizer detects and repairs that.
use crate::types::Card;

/// Key used when a column has no cards at all.
pub const NEUTRAL_ORDER: f64 = 0.0;

/// Distance kept from the column edge on head/tail insertion.
pub const EDGE_STEP: f64 = 1.0;

/// Compute an order key strictly between `before` and `after`.
pub fn between(before: Option<&Card>, after: Option<&Card>) -> f64 {
    between_orders(before.map(|c| c.order), after.map(|c| c.order))
}

/// Same as [`between`], on raw key values.
pub fn between_orders(before: Option<f64>, after: Option<f64>) -> f64 {
    match (before, after) {
        (None, None) => NEUTRAL_ORDER,
        (None, Some(a)) => a - EDGE_STEP,
        (Some(b), None) => b + EDGE_STEP,
        (Some(b), Some(a)) => b + (a - b) / 2.0,
    }
}

/// True when `key` is a usable key for the slot between `before` and
/// `after`: finite and strictly inside the bounds that exist.
///
/// Fails for tied neighbors, and for head/tail steps on keys so large that
/// `+/- EDGE_STEP` rounds back to the neighbor.
pub fn fits_between(before: Option<f64>, after: Option<f64>, key: f64) -> bool {
    key.is_finite() && before.map_or(true, |b| key > b) && after.map_or(true, |a| key < a)
}
