//! Row arithmetic for windows stacked on a screen
//!
//! A screen's windows are a top-to-bottom list of [`Slot`]s. Every slot owns
//! its display rows plus one status row, and the list always accounts for
//! exactly the rows the screen gives windows (everything but the input row).
//! These functions only touch heights; the compositor maps slots back to
//! windows.

use crate::error::{CompositorError, Result};

/// Status rows under each window
pub const STATUS_ROWS: usize = 1;

/// Rows a screen keeps for the input line
pub const INPUT_ROWS: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub height: usize,
    pub fixed: bool,
}

impl Slot {
    pub fn new(height: usize) -> Self {
        Self {
            height,
            fixed: false,
        }
    }

    pub fn fixed(height: usize) -> Self {
        Self {
            height,
            fixed: true,
        }
    }
}

/// Rows the slots occupy, status rows included
pub fn rows_used(slots: &[Slot]) -> usize {
    slots.iter().map(|s| s.height + STATUS_ROWS).sum()
}

/// Rows available to windows on a screen of `rows` terminal rows
pub fn window_rows(rows: usize) -> usize {
    rows.saturating_sub(INPUT_ROWS)
}

/// Rows that cannot be given away: status rows, plus fixed heights while
/// any resizeable window exists
pub fn required_rows(slots: &[Slot]) -> usize {
    let any_flexible = slots.iter().any(|s| !s.fixed);
    slots
        .iter()
        .map(|s| STATUS_ROWS + if s.fixed && any_flexible { s.height } else { 0 })
        .sum()
}

/// Tallest slot, earliest first on ties
fn tallest(slots: &[Slot], skip_fixed: bool) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, slot) in slots.iter().enumerate() {
        if skip_fixed && slot.fixed {
            continue;
        }
        if best.map_or(true, |b| slot.height > slots[b].height) {
            best = Some(i);
        }
    }
    best
}

/// Pick the slot a new window splits.
///
/// The current slot wins when it has spare rows and `always_split_biggest`
/// is off; otherwise the tallest resizeable slot (any slot if all are fixed).
pub fn split_target(slots: &[Slot], current: Option<usize>, always_split_biggest: bool) -> Result<usize> {
    let biggest = tallest(slots, true)
        .or_else(|| tallest(slots, false))
        .ok_or(CompositorError::NoEligibleWindow)?;
    if slots[biggest].height < STATUS_ROWS {
        return Err(CompositorError::NoEligibleWindow);
    }
    if !always_split_biggest {
        if let Some(current) = current.filter(|&c| c < slots.len()) {
            if !slots[current].fixed && slots[current].height > STATUS_ROWS {
                return Ok(current);
            }
        }
    }
    Ok(biggest)
}

/// Split `target` and insert the new slot above it; returns the new index.
///
/// The new slot pays for its status row out of the target's height, and the
/// rest is shared with the odd row going to the new slot.
pub fn split(slots: &mut Vec<Slot>, target: usize) -> Result<usize> {
    let height = slots
        .get(target)
        .map(|s| s.height)
        .ok_or(CompositorError::NoEligibleWindow)?;
    let need = height
        .checked_sub(STATUS_ROWS)
        .ok_or(CompositorError::NoEligibleWindow)?;
    slots[target].height = need / 2;
    slots.insert(target, Slot::new(need - need / 2));
    Ok(target)
}

/// Move `delta` rows between `index` and the next resizeable slot able to
/// give them (wrapping). Returns the neighbor's index.
pub fn resize(slots: &mut [Slot], index: usize, delta: isize) -> Result<usize> {
    let count = slots.len();
    if index >= count {
        return Err(CompositorError::ResizeRefused(delta));
    }
    let mut other = index;
    loop {
        other = (other + 1) % count;
        if other == index {
            return Err(CompositorError::ResizeRefused(delta));
        }
        if slots[other].fixed {
            continue;
        }
        if slots[other].height as isize >= delta {
            break;
        }
    }

    let grown = slots[index].height as isize + delta;
    let shrunk = slots[other].height as isize - delta;
    if grown < 0 || shrunk < 0 {
        return Err(CompositorError::ResizeRefused(delta));
    }
    slots[index].height = grown as usize;
    slots[other].height = shrunk as usize;
    Ok(other)
}

/// Even out resizeable heights, remainder to the earliest slots.
/// Returns false when every slot is fixed.
pub fn rebalance(slots: &mut [Slot]) -> bool {
    let flexible: Vec<usize> = (0..slots.len()).filter(|&i| !slots[i].fixed).collect();
    if flexible.is_empty() {
        return false;
    }
    let total: usize = flexible.iter().map(|&i| slots[i].height).sum();
    let each = total / flexible.len();
    let mut extra = total % flexible.len();
    for &i in &flexible {
        slots[i].height = each;
        if extra > 0 {
            slots[i].height += 1;
            extra -= 1;
        }
    }
    true
}

/// Resize the slots so they fill exactly `available` rows.
///
/// Resizeable slots share the rows in proportion to their current heights
/// (largest remainder, earliest first on ties). Fixed slots only take part
/// when nothing else can. The caller must first make sure
/// `required_rows(slots) <= available`.
pub fn distribute(slots: &mut [Slot], available: usize) {
    if slots.is_empty() {
        return;
    }
    let mut flexible: Vec<usize> = (0..slots.len()).filter(|&i| !slots[i].fixed).collect();
    if flexible.is_empty() {
        flexible = (0..slots.len()).collect();
    }
    let pool = available.saturating_sub(required_rows(slots));

    let mut weights: Vec<usize> = flexible.iter().map(|&i| slots[i].height).collect();
    if weights.iter().all(|&w| w == 0) {
        weights.iter_mut().for_each(|w| *w = 1);
    }
    let total: usize = weights.iter().sum();

    let mut given = 0;
    let mut remainders = Vec::with_capacity(flexible.len());
    for (n, &i) in flexible.iter().enumerate() {
        let share = pool * weights[n];
        slots[i].height = share / total;
        given += share / total;
        remainders.push((share % total, n));
    }
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for &(_, n) in remainders.iter().take(pool - given) {
        slots[flexible[n]].height += 1;
    }
}

/// First row of each slot, in order
pub fn positions(slots: &[Slot]) -> Vec<usize> {
    let mut top = 0;
    slots
        .iter()
        .map(|s| {
            let at = top;
            top += s.height + STATUS_ROWS;
            at
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn heights(slots: &[Slot]) -> Vec<usize> {
        slots.iter().map(|s| s.height).collect()
    }

    #[test]
    fn test_split_current_window() {
        let mut slots = vec![Slot::new(22)];
        let target = split_target(&slots, Some(0), false).unwrap();
        let new = split(&mut slots, target).unwrap();
        assert_eq!(new, 0);
        assert_eq!(heights(&slots), vec![11, 10]);
        assert_eq!(rows_used(&slots), 23);
    }

    #[test]
    fn test_split_prefers_biggest_when_configured() {
        let slots = vec![Slot::new(3), Slot::new(10), Slot::new(6)];
        assert_eq!(split_target(&slots, Some(0), true).unwrap(), 1);
        assert_eq!(split_target(&slots, Some(0), false).unwrap(), 0);
    }

    #[test]
    fn test_split_skips_small_current_and_fixed() {
        let slots = vec![Slot::new(1), Slot::fixed(20), Slot::new(4)];
        assert_eq!(split_target(&slots, Some(0), false).unwrap(), 2);
    }

    #[test]
    fn test_split_fails_without_room() {
        let slots = vec![Slot::new(0), Slot::new(0)];
        assert!(matches!(
            split_target(&slots, Some(0), false),
            Err(CompositorError::NoEligibleWindow)
        ));
    }

    #[test]
    fn test_resize_moves_rows_to_neighbor() {
        // 24 rows: input row plus 10+1 and 11+1
        let mut slots = vec![Slot::new(10), Slot::new(11)];
        assert_eq!(resize(&mut slots, 0, 3).unwrap(), 1);
        assert_eq!(heights(&slots), vec![13, 8]);
        assert_eq!(rows_used(&slots), 23);
    }

    #[test]
    fn test_resize_wraps_and_skips_fixed() {
        let mut slots = vec![Slot::new(5), Slot::fixed(5), Slot::new(5)];
        assert_eq!(resize(&mut slots, 2, 2).unwrap(), 0);
        assert_eq!(heights(&slots), vec![3, 5, 7]);
    }

    #[test]
    fn test_resize_refused_leaves_heights() {
        let mut slots = vec![Slot::new(5), Slot::new(2)];
        assert!(resize(&mut slots, 0, 3).is_err());
        assert!(resize(&mut slots, 0, -6).is_err());
        assert_eq!(heights(&slots), vec![5, 2]);
    }

    #[test]
    fn test_rebalance_remainder_to_earliest() {
        let mut slots = vec![Slot::new(1), Slot::new(2), Slot::fixed(4), Slot::new(8)];
        assert!(rebalance(&mut slots));
        assert_eq!(heights(&slots), vec![4, 4, 4, 3]);

        let mut fixed = vec![Slot::fixed(3)];
        assert!(!rebalance(&mut fixed));
    }

    #[test]
    fn test_distribute_proportional() {
        let mut slots = vec![Slot::new(10), Slot::new(11)];
        distribute(&mut slots, 45);
        assert_eq!(heights(&slots), vec![20, 23]);
        assert_eq!(rows_used(&slots), 45);

        distribute(&mut slots, 11);
        assert_eq!(rows_used(&slots), 11);
    }

    #[test]
    fn test_distribute_keeps_fixed() {
        let mut slots = vec![Slot::fixed(3), Slot::new(5)];
        distribute(&mut slots, 20);
        assert_eq!(heights(&slots), vec![3, 15]);
    }

    #[test]
    fn test_distribute_fixed_fallback() {
        let mut slots = vec![Slot::fixed(3), Slot::fixed(3)];
        distribute(&mut slots, 12);
        assert_eq!(heights(&slots), vec![5, 5]);
    }

    #[test]
    fn test_positions() {
        let slots = vec![Slot::new(3), Slot::new(0), Slot::new(5)];
        assert_eq!(positions(&slots), vec![0, 4, 5]);
    }

    fn slot() -> impl Strategy<Value = Slot> {
        (0usize..30, prop::bool::weighted(0.2)).prop_map(|(height, fixed)| Slot { height, fixed })
    }

    proptest! {
        #[test]
        fn prop_distribute_fills_exactly(slots in prop::collection::vec(slot(), 1..8), rows in 2usize..120) {
            let mut slots = slots;
            let available = window_rows(rows);
            prop_assume!(required_rows(&slots) <= available);
            distribute(&mut slots, available);
            prop_assert_eq!(rows_used(&slots), available);
        }

        #[test]
        fn prop_resize_and_split_keep_sum(slots in prop::collection::vec(slot(), 1..6), ops in prop::collection::vec((0usize..6, -10isize..10, any::<bool>()), 1..30)) {
            let mut slots = slots;
            let total = rows_used(&slots);
            for (index, delta, do_split) in ops {
                let index = index % slots.len();
                if do_split {
                    if let Ok(target) = split_target(&slots, Some(index), false) {
                        split(&mut slots, target).unwrap();
                    }
                } else {
                    let _ = resize(&mut slots, index, delta);
                    rebalance(&mut slots);
                }
                prop_assert_eq!(rows_used(&slots), total);
            }
        }
    }
}
