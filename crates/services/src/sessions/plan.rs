use rand::seq::SliceRandom;
use rand::{Rng, rng};

use tbs_core::model::TaskItem;

/// Items drawn into a session when the caller does not choose a bound.
pub const DEFAULT_MAX_ITEMS: usize = 6;

/// Minutes budgeted for an item that carries no time estimate.
pub const DEFAULT_ITEM_MINUTES: u32 = 15;

/// Working set for one session: the chosen items and their time budget.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub items: Vec<TaskItem>,
    pub time_budget_seconds: u32,
}

impl Selection {
    /// Wrap an already-chosen list of items and compute its time budget.
    #[must_use]
    pub fn from_items(items: Vec<TaskItem>) -> Self {
        let time_budget_seconds = time_budget_seconds(&items);
        Self {
            items,
            time_budget_seconds,
        }
    }

    /// Total number of items in this selection.
    #[must_use]
    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Returns true when nothing was available to select.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Sum of item time estimates in seconds, defaulting missing estimates.
#[must_use]
pub fn time_budget_seconds(items: &[TaskItem]) -> u32 {
    items
        .iter()
        .map(|item| item.time_estimate_minutes().unwrap_or(DEFAULT_ITEM_MINUTES))
        .fold(0_u32, u32::saturating_add)
        .saturating_mul(60)
}

/// Picks a bounded random subset of a subject area's task items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selector {
    max_count: usize,
}

impl Default for Selector {
    fn default() -> Self {
        Self {
            max_count: DEFAULT_MAX_ITEMS,
        }
    }
}

impl Selector {
    #[must_use]
    pub fn new(max_count: usize) -> Self {
        Self { max_count }
    }

    #[must_use]
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Shuffle the pool and keep at most `max_count` items.
    ///
    /// An empty pool produces an empty selection.
    pub fn select(&self, pool: impl IntoIterator<Item = TaskItem>) -> Selection {
        self.select_with_rng(pool, &mut rng())
    }

    /// Same as [`Selector::select`] with a caller-provided random source.
    pub fn select_with_rng<R: Rng + ?Sized>(
        &self,
        pool: impl IntoIterator<Item = TaskItem>,
        rng: &mut R,
    ) -> Selection {
        let mut items: Vec<TaskItem> = pool.into_iter().collect();
        items.as_mut_slice().shuffle(rng);
        items.truncate(self.max_count);
        Selection::from_items(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;
    use tbs_core::model::{Requirement, RequirementSpec, TaskItemDraft, TaskItemId};

    fn build_item(id: u32, minutes: Option<u32>) -> TaskItem {
        TaskItemDraft {
            id: TaskItemId::new(format!("item-{id}")),
            title: format!("Item {id}"),
            scenario: String::new(),
            time_estimate_minutes: minutes,
            requirements: vec![Requirement::new(
                "r1",
                "Explain",
                RequirementSpec::WrittenResponse {
                    rubric: Vec::new(),
                    sample_response: None,
                },
            )],
            hints: Vec::new(),
            references: Vec::new(),
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn selects_at_most_max_count_distinct_items() {
        let pool: Vec<TaskItem> = (0..10).map(|i| build_item(i, Some(10))).collect();
        let mut rng = StdRng::seed_from_u64(7);

        let selection = Selector::default().select_with_rng(pool, &mut rng);

        assert_eq!(selection.total(), DEFAULT_MAX_ITEMS);
        let ids: HashSet<_> = selection.items.iter().map(|i| i.id().clone()).collect();
        assert_eq!(ids.len(), DEFAULT_MAX_ITEMS);
        assert_eq!(selection.time_budget_seconds, 6 * 10 * 60);
    }

    #[test]
    fn small_pool_is_taken_whole() {
        let pool = vec![build_item(1, Some(20)), build_item(2, None)];
        let selection = Selector::new(6).select(pool);

        assert_eq!(selection.total(), 2);
        assert_eq!(
            selection.time_budget_seconds,
            (20 + DEFAULT_ITEM_MINUTES) * 60
        );
    }

    #[test]
    fn empty_pool_yields_empty_selection() {
        let selection = Selector::default().select(Vec::new());
        assert!(selection.is_empty());
        assert_eq!(selection.time_budget_seconds, 0);
    }

    #[test]
    fn shuffle_is_deterministic_for_a_seed() {
        let pool: Vec<TaskItem> = (0..8).map(|i| build_item(i, None)).collect();
        let a = Selector::new(4).select_with_rng(pool.clone(), &mut StdRng::seed_from_u64(42));
        let b = Selector::new(4).select_with_rng(pool, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn every_item_can_be_selected() {
        let pool: Vec<TaskItem> = (0..5).map(|i| build_item(i, None)).collect();
        let mut seen = HashSet::new();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let selection = Selector::new(1).select_with_rng(pool.clone(), &mut rng);
            seen.insert(selection.items[0].id().clone());
        }
        assert_eq!(seen.len(), 5);
    }
}
