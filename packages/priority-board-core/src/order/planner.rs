/// Drag-and-drop reorder planning.
///
/// Turns a resolved drop gesture `(card id, destination column, anchor)` into
/// a single card mutation: new column plus new order key. Pointer geometry
/// is resolved by the rendering layer; the planner only sees the anchor.
///
/// Anchor resolution runs against the destination column's view with the
/// moved card left out, so a card never becomes its own neighbor. An anchor
/// id that is not in that view (stale after a concurrent archive, or pointing
/// into another column) falls back to tail insertion: a drop always lands.
///
/// When the neighbors leave no room for a new key (tied keys, or keys so
/// large that a head/tail step rounds away), the destination column is
/// respaced first and the key is taken from the respaced neighbors. The
/// respaced keys travel with the plan so they are written in the same batch.
use crate::error::BoardError;
use crate::order::renormalize::RenormalizePolicy;
use crate::order::{column_index, key};
use crate::types::{Anchor, Card, ColumnId};

/// Key for a new position, plus any neighbor keys rewritten to make room.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub order: f64,
    /// `(card id, new order)` for destination cards that were respaced.
    pub respaced: Vec<(String, f64)>,
}

impl Placement {
    /// Write the respaced neighbor keys into `cards`.
    pub fn apply_respaced(&self, cards: &mut [Card]) {
        write_keys(cards, &self.respaced);
    }
}

fn write_keys(cards: &mut [Card], keys: &[(String, f64)]) {
    for (id, order) in keys {
        if let Some(card) = cards.iter_mut().find(|c| &c.id == id) {
            card.order = *order;
        }
    }
}

/// Computed mutation for one card.
#[derive(Debug, Clone, PartialEq)]
pub struct MovePlan {
    pub card_id: String,
    pub from_column: ColumnId,
    pub to_column: ColumnId,
    pub order: f64,
    pub moved_at: i64,
    /// Destination neighbors respaced to make room, if any.
    pub respaced: Vec<(String, f64)>,
}

impl MovePlan {
    /// Write the plan into `cards`. Returns false if the card is gone.
    pub fn apply(&self, cards: &mut [Card]) -> bool {
        write_keys(cards, &self.respaced);
        match cards.iter_mut().find(|c| c.id == self.card_id) {
            Some(card) => {
                card.column = self.to_column;
                card.order = self.order;
                card.last_moved_time = self.moved_at;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    Move(MovePlan),
    /// Drop onto the card itself, or onto the slot it already occupies.
    NoOp,
}

/// Plan moving `card_id` into `destination` at `anchor`, with the default
/// respacing policy.
pub fn plan_move(
    cards: &[Card],
    card_id: &str,
    destination: ColumnId,
    anchor: &Anchor,
    now: i64,
) -> Result<PlanOutcome, BoardError> {
    plan_move_with(cards, card_id, destination, anchor, now, &RenormalizePolicy::default())
}

/// Plan moving `card_id` into `destination` at `anchor`.
pub fn plan_move_with(
    cards: &[Card],
    card_id: &str,
    destination: ColumnId,
    anchor: &Anchor,
    now: i64,
    policy: &RenormalizePolicy,
) -> Result<PlanOutcome, BoardError> {
    let moved = cards
        .iter()
        .find(|c| c.id == card_id)
        .ok_or_else(|| BoardError::CardNotFound(card_id.to_string()))?;

    if matches!(anchor, Anchor::Before(id) if id == card_id) {
        return Ok(PlanOutcome::NoOp);
    }

    let others = column_index::view_excluding(cards, destination, card_id);
    let index = resolve_anchor(&others, anchor);

    if moved.is_visible_in(destination) {
        let current = column_index::view(cards, destination)
            .iter()
            .position(|c| c.id == card_id);
        if current == Some(index) {
            return Ok(PlanOutcome::NoOp);
        }
    }

    let placement = place_at(&others, index, policy);
    Ok(PlanOutcome::Move(MovePlan {
        card_id: card_id.to_string(),
        from_column: moved.column,
        to_column: destination,
        order: placement.order,
        moved_at: now,
        respaced: placement.respaced,
    }))
}

/// Placement for a card that is not on the board yet, at `anchor`.
pub fn plan_insertion(
    cards: &[Card],
    column: ColumnId,
    anchor: &Anchor,
    policy: &RenormalizePolicy,
) -> Placement {
    let view = column_index::view(cards, column);
    let index = resolve_anchor(&view, anchor);
    place_at(&view, index, policy)
}

/// Key for slot `index` of `view`. Respaces the view when the neighbors
/// leave no room.
fn place_at(view: &[&Card], index: usize, policy: &RenormalizePolicy) -> Placement {
    let before = index.checked_sub(1).and_then(|i| view.get(i)).map(|c| c.order);
    let after = view.get(index).map(|c| c.order);
    let order = key::between_orders(before, after);
    if key::fits_between(before, after, order) {
        return Placement {
            order,
            respaced: Vec::new(),
        };
    }

    let keys = policy.keys(view.len());
    let order = key::between_orders(
        index.checked_sub(1).and_then(|i| keys.get(i)).copied(),
        keys.get(index).copied(),
    );
    log::debug!(
        "[board.planner.respace] No room between {:?} and {:?}, respacing {} cards",
        before,
        after,
        view.len()
    );
    Placement {
        order,
        respaced: view
            .iter()
            .zip(keys)
            .map(|(c, k)| (c.id.clone(), k))
            .collect(),
    }
}

/// Insertion index of `anchor` within `view`.
fn resolve_anchor(view: &[&Card], anchor: &Anchor) -> usize {
    match anchor {
        Anchor::Head => 0,
        Anchor::Tail => view.len(),
        Anchor::Before(id) => view.iter().position(|c| &c.id == id).unwrap_or_else(|| {
            log::debug!(
                "[board.planner.anchor] Anchor {} not in destination column, inserting at tail",
                id
            );
            view.len()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::EditorIdentity;

    fn card(id: &str, column: ColumnId, order: f64) -> Card {
        let editor = EditorIdentity::new("t").unwrap();
        Card::new(id, id, column, order, &editor, 0)
    }

    fn todo_abc() -> Vec<Card> {
        vec![
            card("A", ColumnId::Todo, 0.0),
            card("B", ColumnId::Todo, 1.0),
            card("C", ColumnId::Todo, 2.0),
        ]
    }

    fn expect_move(outcome: PlanOutcome) -> MovePlan {
        match outcome {
            PlanOutcome::Move(plan) => plan,
            PlanOutcome::NoOp => panic!("expected a move"),
        }
    }

    #[test]
    fn test_move_to_head_uses_after_minus_one() {
        let cards = todo_abc();
        let plan = expect_move(
            plan_move(&cards, "C", ColumnId::Todo, &Anchor::Before("A".into()), 7).unwrap(),
        );
        assert_eq!(plan.order, -1.0);
        assert_eq!(plan.moved_at, 7);
        assert_eq!(plan.to_column, ColumnId::Todo);
    }

    #[test]
    fn test_move_between_uses_midpoint() {
        let cards = todo_abc();
        let plan = expect_move(
            plan_move(&cards, "A", ColumnId::Todo, &Anchor::Before("C".into()), 0).unwrap(),
        );
        assert_eq!(plan.order, 1.5);
    }

    #[test]
    fn test_drop_on_self_is_noop() {
        let cards = todo_abc();
        let outcome = plan_move(&cards, "B", ColumnId::Todo, &Anchor::Before("B".into()), 0);
        assert_eq!(outcome.unwrap(), PlanOutcome::NoOp);
    }

    #[test]
    fn test_drop_before_next_card_is_noop() {
        let cards = todo_abc();
        let outcome = plan_move(&cards, "A", ColumnId::Todo, &Anchor::Before("B".into()), 0);
        assert_eq!(outcome.unwrap(), PlanOutcome::NoOp);
    }

    #[test]
    fn test_tail_of_last_and_head_of_first_are_noops() {
        let cards = todo_abc();
        assert_eq!(
            plan_move(&cards, "C", ColumnId::Todo, &Anchor::Tail, 0).unwrap(),
            PlanOutcome::NoOp
        );
        assert_eq!(
            plan_move(&cards, "A", ColumnId::Todo, &Anchor::Head, 0).unwrap(),
            PlanOutcome::NoOp
        );
    }

    #[test]
    fn test_cross_column_move() {
        let mut cards = todo_abc();
        cards.push(card("D", ColumnId::Done, 10.0));
        let plan = expect_move(plan_move(&cards, "B", ColumnId::Done, &Anchor::Tail, 0).unwrap());
        assert_eq!(plan.from_column, ColumnId::Todo);
        assert_eq!(plan.to_column, ColumnId::Done);
        assert_eq!(plan.order, 11.0);
    }

    #[test]
    fn test_into_empty_column_is_neutral() {
        let cards = todo_abc();
        let plan = expect_move(plan_move(&cards, "A", ColumnId::Backlog, &Anchor::Head, 0).unwrap());
        assert_eq!(plan.order, 0.0);
    }

    #[test]
    fn test_stale_anchor_falls_back_to_tail() {
        let mut cards = todo_abc();
        cards[1].is_archived = true;
        let plan = expect_move(
            plan_move(&cards, "A", ColumnId::Todo, &Anchor::Before("B".into()), 0).unwrap(),
        );
        assert_eq!(plan.order, 3.0);

        let plan = expect_move(
            plan_move(&cards, "A", ColumnId::Todo, &Anchor::Before("missing".into()), 0).unwrap(),
        );
        assert_eq!(plan.order, 3.0);
    }

    #[test]
    fn test_unknown_card_errors() {
        let cards = todo_abc();
        let err = plan_move(&cards, "nope", ColumnId::Todo, &Anchor::Head, 0).unwrap_err();
        assert!(matches!(err, BoardError::CardNotFound(id) if id == "nope"));
    }

    #[test]
    fn test_apply_writes_card() {
        let mut cards = todo_abc();
        let plan = expect_move(
            plan_move(&cards, "C", ColumnId::Todo, &Anchor::Before("A".into()), 99).unwrap(),
        );
        assert!(plan.apply(&mut cards));
        let ids: Vec<_> = column_index::view(&cards, ColumnId::Todo)
            .iter()
            .map(|c| (c.id.clone(), c.order))
            .collect();
        assert_eq!(
            ids,
            vec![("C".into(), -1.0), ("A".into(), 0.0), ("B".into(), 1.0)]
        );
        assert_eq!(cards[2].last_moved_time, 99);
    }

    #[test]
    fn test_insertion_extremes() {
        let cards = todo_abc();
        let policy = RenormalizePolicy::default();
        assert_eq!(plan_insertion(&cards, ColumnId::Todo, &Anchor::Head, &policy).order, -1.0);
        assert_eq!(plan_insertion(&cards, ColumnId::Todo, &Anchor::Tail, &policy).order, 3.0);
        let empty = plan_insertion(&cards, ColumnId::Doing, &Anchor::Head, &policy);
        assert_eq!(empty.order, 0.0);
        assert!(empty.respaced.is_empty());
    }

    #[test]
    fn test_move_between_tied_neighbors_makes_room() {
        let mut cards = vec![
            card("X", ColumnId::Todo, 10_000.0),
            card("Y", ColumnId::Todo, 20_000.0),
            card("T1", ColumnId::Todo, 30_000.0),
            card("T2", ColumnId::Todo, 30_000.0),
        ];
        let plan = expect_move(
            plan_move(&cards, "X", ColumnId::Todo, &Anchor::Before("T2".into()), 0).unwrap(),
        );
        assert_eq!(plan.order, 25_000.0);
        assert_eq!(
            plan.respaced,
            vec![
                ("Y".to_string(), 10_000.0),
                ("T1".to_string(), 20_000.0),
                ("T2".to_string(), 30_000.0)
            ]
        );

        plan.apply(&mut cards);
        let ids: Vec<_> = column_index::view(&cards, ColumnId::Todo)
            .into_iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["Y", "T1", "X", "T2"]);
    }

    #[test]
    fn test_head_insert_on_huge_key_makes_room() {
        let mut cards = vec![card("A", ColumnId::Backlog, 1e17)];
        let placement =
            plan_insertion(&cards, ColumnId::Backlog, &Anchor::Head, &RenormalizePolicy::default());
        assert_eq!(placement.order, 9_999.0);
        assert_eq!(placement.respaced, vec![("A".to_string(), 10_000.0)]);

        placement.apply_respaced(&mut cards);
        cards.push(card("new", ColumnId::Backlog, placement.order));
        let ids: Vec<_> = column_index::view(&cards, ColumnId::Backlog)
            .into_iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["new", "A"]);
    }

    #[test]
    fn test_room_uses_policy_spacing() {
        let cards = vec![card("A", ColumnId::Todo, 5.0), card("B", ColumnId::Todo, 5.0)];
        let policy = RenormalizePolicy {
            spacing: 100.0,
            ..RenormalizePolicy::default()
        };
        let placement = plan_insertion(&cards, ColumnId::Todo, &Anchor::Before("B".into()), &policy);
        assert_eq!(placement.order, 150.0);
    }

    #[test]
    fn test_random_moves_keep_strict_order() {
        // Deterministic pseudo-random walk over anchors.
        let mut cards: Vec<Card> = (0..6)
            .map(|i| card(&format!("k{i}"), ColumnId::Todo, i as f64))
            .collect();
        let mut seed: u64 = 0x9e37_79b9;
        for step in 0..200 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let moved = format!("k{}", (seed >> 33) % 6);
            let target = (seed >> 17) % 8;
            let anchor = match target {
                6 => Anchor::Head,
                7 => Anchor::Tail,
                n => Anchor::Before(format!("k{n}")),
            };
            if let PlanOutcome::Move(plan) =
                plan_move(&cards, &moved, ColumnId::Todo, &anchor, step).unwrap()
            {
                plan.apply(&mut cards);
            }
            let view = column_index::view(&cards, ColumnId::Todo);
            assert!(view.windows(2).all(|w| w[0].order < w[1].order));
        }
    }
}
