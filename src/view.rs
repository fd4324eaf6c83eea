// Results page state: committed entities, active filters and sort key
use std::sync::Arc;

use crate::filter::{FilterSet, MemoizedFilter};
use crate::listing::{Entity, ListingAttributes};
use crate::sort::{sorted, SortKey};

/// Filter state lives as long as the results page; `reset` puts it back to
/// the permissive default the page was opened with.
pub struct ResultsView<A, F> {
    entities: Arc<[Entity<A>]>,
    defaults: F,
    filters: F,
    sort: SortKey,
    memo: MemoizedFilter<A, F>,
}

impl<A: ListingAttributes, F: FilterSet<A>> ResultsView<A, F> {
    pub fn new(defaults: F) -> Self {
        Self {
            entities: Arc::from(Vec::new()),
            filters: defaults.clone(),
            defaults,
            sort: SortKey::default(),
            memo: MemoizedFilter::default(),
        }
    }

    // Replace the listings with a fresh search result
    pub fn set_results(&mut self, entities: Vec<Entity<A>>) {
        self.entities = entities.into();
    }

    pub fn filters(&self) -> &F {
        &self.filters
    }

    pub fn update_filters(&mut self, update: impl FnOnce(&mut F)) {
        update(&mut self.filters);
    }

    pub fn reset_filters(&mut self) {
        self.filters = self.defaults.clone();
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
    }

    pub fn total(&self) -> usize {
        self.entities.len()
    }

    /// Filters first, then sorts the filtered set.
    pub fn visible(&mut self) -> Vec<Entity<A>> {
        let filtered = self.memo.apply(&self.entities, &self.filters);
        sorted(filtered.to_vec(), self.sort)
    }

    pub fn filter_evaluations(&self) -> usize {
        self.memo.evaluations()
    }
}
