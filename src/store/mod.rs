use crate::Review;

/// Ticket identifying one in-flight refresh.
///
/// Tickets are handed out in issue order; only the newest one may apply its
/// result. Requests that pile up while a refresh is outstanding coalesce:
/// results are idempotent reads, so only the latest matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket(u64);

/// In-memory cache of the most recently fetched reviews for one repository
/// context.
///
/// Each refresh atomically replaces the held set. Stale selections are
/// invalid after a replace and must be re-resolved by identity (`find`),
/// never by position.
#[derive(Debug, Default)]
pub struct ReviewStore {
    reviews: Vec<Review>,
    issued: u64,
    applied: u64,
}

impl ReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a refresh; the returned ticket gates `complete_refresh`.
    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.issued += 1;
        RefreshTicket(self.issued)
    }

    /// Apply a refresh result. Returns false (discarding the result) when a
    /// newer refresh began after this ticket was issued, so a slow query
    /// landing late can never clobber fresher data.
    pub fn complete_refresh(&mut self, ticket: RefreshTicket, reviews: Vec<Review>) -> bool {
        if ticket.0 < self.issued || ticket.0 <= self.applied {
            return false;
        }
        self.applied = ticket.0;
        self.reviews = reviews;
        true
    }

    /// Swap the held set directly (no in-flight refresh bookkeeping).
    pub fn replace(&mut self, reviews: Vec<Review>) {
        self.issued += 1;
        self.applied = self.issued;
        self.reviews = reviews;
    }

    /// All reviews in the order Gerrit returned them; display order reflects
    /// Gerrit's own relevance ordering and is never re-sorted.
    pub fn all(&self) -> &[Review] {
        &self.reviews
    }

    pub fn len(&self) -> usize {
        self.reviews.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty()
    }

    /// Look up a review by change id or by its number rendered as text.
    pub fn find(&self, key: &str) -> Option<&Review> {
        self.reviews
            .iter()
            .find(|r| r.id == key || r.number.to_string() == key)
    }

    pub fn find_by_number(&self, number: u64) -> Option<&Review> {
        self.reviews.iter().find(|r| r.number == number)
    }

    /// The review whose current patchset is the given commit, for resolving
    /// "the review under the cursor" from a selected commit id.
    pub fn find_by_revision(&self, revision: &str) -> Option<&Review> {
        self.reviews.iter().find(|r| {
            r.current_patch_set
                .as_ref()
                .is_some_and(|ps| ps.revision == revision)
        })
    }
}
