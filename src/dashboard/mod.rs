use crate::actions::{self, ActionError};
use crate::command::QueryStatus;
use crate::context::RepositoryContext;
use crate::store::ReviewStore;
use crate::Review;

/// Selection state over the fetched reviews — owns the store but not the
/// repository context.
pub struct Dashboard {
    pub store: ReviewStore,
    pub selected: usize,
    pub status: QueryStatus,
}

impl Dashboard {
    /// Fetch the project's reviews and start with the first one selected.
    pub fn load(ctx: &RepositoryContext, status: QueryStatus) -> Result<Self, ActionError> {
        let mut store = ReviewStore::new();
        actions::refresh_store(ctx, &mut store, status)?;
        Ok(Dashboard {
            store,
            selected: 0,
            status,
        })
    }

    /// Move selection down (clamp to end).
    pub fn select_next(&mut self) {
        if !self.store.is_empty() && self.selected < self.store.len() - 1 {
            self.selected += 1;
        }
    }

    /// Move selection up (clamp to start).
    pub fn select_prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    /// The review under the cursor.
    pub fn selected_review(&self) -> Option<&Review> {
        self.store.all().get(self.selected)
    }

    /// Re-query and swap in the fresh result, keeping the selection on the
    /// same review identity where it still exists (position is meaningless
    /// across a replace).
    pub fn refresh(&mut self, ctx: &RepositoryContext) -> Result<(), ActionError> {
        let keep = self.selected_review().map(|r| r.number);

        actions::refresh_store(ctx, &mut self.store, self.status)?;

        self.selected = keep
            .and_then(|number| self.store.all().iter().position(|r| r.number == number))
            .unwrap_or(0);
        if !self.store.is_empty() && self.selected >= self.store.len() {
            self.selected = self.store.len() - 1;
        }
        Ok(())
    }
}
