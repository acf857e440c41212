//! The reorder / move rule for tasks within a column (and columns within a
//! board).
//!
//! A dropped item gets a fresh `order` strictly between its new neighbours:
//!
//! - empty destination: `0`
//! - dropped at the top: half the first order
//! - dropped at the bottom: last order plus one
//! - otherwise: the midpoint of the two neighbours
//!
//! Only the moved row is written. When the raw value cannot sit strictly
//! between its neighbours (an order of `0` or below at the top, exhausted
//! float precision, non-finite values) the destination is renumbered to
//! `1..=n` in visible order and the rule is applied again.

use std::cmp::Ordering;

use db::models::OrderEntry;

/// Where a dropped item should go.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// Write only the moved row with this order.
    Direct(f64),
    /// Rewrite the siblings to `orders` first, then write the moved row with
    /// `order`.
    Renumber { orders: Vec<OrderEntry>, order: f64 },
}

impl Placement {
    pub fn order(&self) -> f64 {
        match self {
            Placement::Direct(order) => *order,
            Placement::Renumber { order, .. } => *order,
        }
    }
}

/// The raw midpoint rule. `siblings` must be in visible order and must not
/// contain the moved item. Indices past the end mean "append".
pub fn order_for_index(siblings: &[OrderEntry], index: usize) -> f64 {
    let (Some(first), Some(last)) = (siblings.first(), siblings.last()) else {
        return 0.0;
    };
    if index == 0 {
        first.order / 2.0
    } else if index >= siblings.len() {
        last.order + 1.0
    } else {
        (siblings[index - 1].order + siblings[index].order) / 2.0
    }
}

/// Whether `order` lands strictly between the neighbours at `index`.
pub fn fits_between(siblings: &[OrderEntry], index: usize, order: f64) -> bool {
    if !order.is_finite() {
        return false;
    }
    let index = index.min(siblings.len());
    let below = index.checked_sub(1).map(|i| siblings[i].order);
    let above = siblings.get(index).map(|e| e.order);

    below.is_none_or(|b| order > b) && above.is_none_or(|a| order < a)
}

pub fn place(siblings: &[OrderEntry], index: usize) -> Placement {
    let order = order_for_index(siblings, index);
    if fits_between(siblings, index, order) {
        return Placement::Direct(order);
    }

    let orders: Vec<OrderEntry> = siblings
        .iter()
        .zip(renumbered(siblings.len()))
        .map(|(entry, order)| OrderEntry::new(entry.id, order))
        .collect();
    let order = order_for_index(&orders, index);
    Placement::Renumber { orders, order }
}

/// `1.0, 2.0, …, len`.
pub fn renumbered(len: usize) -> Vec<f64> {
    (1..=len).map(|n| n as f64).collect()
}

/// Visible order: ascending `order`, ties broken by ascending id.
pub fn compare_entries(a: &OrderEntry, b: &OrderEntry) -> Ordering {
    a.order.total_cmp(&b.order).then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn column(orders: &[f64]) -> Vec<OrderEntry> {
        let mut entries: Vec<OrderEntry> = orders
            .iter()
            .map(|&o| OrderEntry::new(Uuid::new_v4(), o))
            .collect();
        entries.sort_by(compare_entries);
        entries
    }

    #[test]
    fn empty_column_gets_zero() {
        assert_eq!(order_for_index(&[], 0), 0.0);
        assert_eq!(order_for_index(&[], 7), 0.0);
        assert_eq!(place(&[], 0), Placement::Direct(0.0));
    }

    #[test]
    fn top_insert_is_below_the_minimum() {
        let col = column(&[4.0, 6.0]);
        let order = order_for_index(&col, 0);
        assert_eq!(order, 2.0);
        assert!(order < 4.0);
        assert_eq!(place(&col, 0), Placement::Direct(2.0));
    }

    #[test]
    fn bottom_insert_is_above_the_maximum() {
        let col = column(&[0.0, 1.0, 2.0]);
        assert_eq!(order_for_index(&col, 3), 3.0);
        assert_eq!(order_for_index(&col, 99), 3.0);
    }

    #[test]
    fn middle_insert_is_strictly_between() {
        let col = column(&[0.0, 1.0, 2.0]);
        let order = order_for_index(&col, 1);
        assert_eq!(order, 0.5);
        assert!(fits_between(&col, 1, order));

        let mut after: Vec<f64> = col.iter().map(|e| e.order).collect();
        after.insert(1, order);
        assert_eq!(after, vec![0.0, 0.5, 1.0, 2.0]);
    }

    #[test]
    fn placement_never_rewrites_siblings_on_the_normal_path() {
        let col = column(&[1.0, 1.5, 8.0]);
        let before = col.clone();
        for index in 0..=col.len() {
            assert!(matches!(place(&col, index), Placement::Direct(_)));
        }
        assert_eq!(col, before);
    }

    #[test]
    fn second_top_insert_into_fresh_column_degenerates() {
        // First insert into an empty column yields 0.
        let first = order_for_index(&[], 0);
        assert_eq!(first, 0.0);

        // Inserting again at the top halves 0, which is 0 again.
        let col = column(&[first]);
        let raw = order_for_index(&col, 0);
        assert_eq!(raw, 0.0);
        assert!(!fits_between(&col, 0, raw));

        match place(&col, 0) {
            Placement::Renumber { orders, order } => {
                assert_eq!(orders.len(), 1);
                assert_eq!(orders[0].id, col[0].id);
                assert_eq!(orders[0].order, 1.0);
                assert_eq!(order, 0.5);
            }
            other => panic!("expected renumber, got {other:?}"),
        }
    }

    #[test]
    fn negative_minimum_renumbers_at_top() {
        let col = column(&[-2.0, 3.0]);
        assert!(!fits_between(&col, 0, order_for_index(&col, 0)));
        let placement = place(&col, 0);
        assert_eq!(placement.order(), 0.5);
    }

    #[test]
    fn exhausted_precision_renumbers() {
        let a = 1.0_f64;
        let b = f64::from_bits(a.to_bits() + 1);
        let col = column(&[a, b]);
        let raw = order_for_index(&col, 1);
        assert!(raw == a || raw == b);

        match place(&col, 1) {
            Placement::Renumber { orders, order } => {
                assert_eq!(
                    orders.iter().map(|e| e.order).collect::<Vec<_>>(),
                    vec![1.0, 2.0]
                );
                assert_eq!(order, 1.5);
            }
            other => panic!("expected renumber, got {other:?}"),
        }
    }

    #[test]
    fn renumber_keeps_visible_order() {
        let col = column(&[0.0, 0.0, 0.0]);
        if let Placement::Renumber { orders, .. } = place(&col, 0) {
            let ids: Vec<Uuid> = orders.iter().map(|e| e.id).collect();
            let expected: Vec<Uuid> = col.iter().map(|e| e.id).collect();
            assert_eq!(ids, expected);
        } else {
            panic!("expected renumber");
        }
    }

    #[test]
    fn equal_orders_tie_break_on_id() {
        let low = OrderEntry::new(Uuid::from_u128(1), 1.0);
        let high = OrderEntry::new(Uuid::from_u128(2), 1.0);
        assert_eq!(compare_entries(&low, &high), Ordering::Less);

        let mut entries = vec![high, low, OrderEntry::new(Uuid::from_u128(3), 0.5)];
        entries.sort_by(compare_entries);
        assert_eq!(
            entries.iter().map(|e| e.id.as_u128()).collect::<Vec<_>>(),
            vec![3, 1, 2]
        );
    }

    #[test]
    fn renumbered_is_one_based() {
        assert!(renumbered(0).is_empty());
        assert_eq!(renumbered(3), vec![1.0, 2.0, 3.0]);
    }
}
