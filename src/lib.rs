pub mod actions;
pub mod cli;
pub mod command;
pub mod context;
pub mod dashboard;
pub mod git;
pub mod query;
pub mod remote;
pub mod store;
pub mod transport;
pub mod tui;

/// Category of a scored verdict on a patchset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalCategory {
    CodeReview,
    Verified,
    Other(String),
}

impl ApprovalCategory {
    /// Map a wire label to a category. Gerrit emits both the long form
    /// ("Code-Review") and the legacy short form ("CRVW").
    pub fn from_label(label: &str) -> Self {
        match label {
            "Code-Review" | "CRVW" => ApprovalCategory::CodeReview,
            "Verified" | "VRIF" => ApprovalCategory::Verified,
            other => ApprovalCategory::Other(other.to_string()),
        }
    }
}

/// A reviewer or owner identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub name: String,
    pub email: Option<String>,
    pub username: Option<String>,
}

/// A scored verdict left by a reviewer on a patchset.
///
/// `value` is `None` when no parseable score was present; that is distinct
/// from `Some(0)`, which is a real (neutral) vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approval {
    pub category: ApprovalCategory,
    pub value: Option<i32>,
    pub by: Person,
}

/// A specific uploaded revision of a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSet {
    /// Git commit hash of this patchset.
    pub revision: String,
    /// Fetchable ref name (e.g. "refs/changes/34/1234/2").
    pub ref_name: String,
    /// Approvals in the order Gerrit returned them.
    pub approvals: Vec<Approval>,
}

/// A change fetched from Gerrit's query interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub id: String,
    pub number: u64,
    pub subject: String,
    pub owner: Person,
    pub is_draft: bool,
    pub current_patch_set: Option<PatchSet>,
    pub url: String,
    pub commit_message: String,
    pub topic: Option<String>,
}

impl Review {
    /// The worst-dominates score for a category on the current patchset.
    ///
    /// A negative vote outweighs any positive one (a -2 blocks regardless of
    /// +2s present); otherwise the highest vote wins. `None` means nobody has
    /// voted in this category yet.
    pub fn score_for(&self, category: &ApprovalCategory) -> Option<i32> {
        let values: Vec<i32> = self
            .current_patch_set
            .as_ref()?
            .approvals
            .iter()
            .filter(|a| &a.category == category)
            .filter_map(|a| a.value)
            .collect();
        match values.iter().copied().min() {
            Some(min) if min < 0 => Some(min),
            _ => values.iter().copied().max(),
        }
    }
}

/// Render a score the way Gerrit prints it: "+2", "-1", " 0".
///
/// An absent score renders as blank, never as zero.
pub fn format_score(score: Option<i32>) -> String {
    match score {
        None => String::new(),
        Some(v) if v > 0 => format!("+{v}"),
        Some(v) if v < 0 => format!("{v}"),
        Some(_) => " 0".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(name: &str) -> Person {
        Person {
            name: name.to_string(),
            email: None,
            username: None,
        }
    }

    fn review_with_approvals(approvals: Vec<Approval>) -> Review {
        Review {
            id: "I1234".to_string(),
            number: 42,
            subject: "subject".to_string(),
            owner: person("alice"),
            is_draft: false,
            current_patch_set: Some(PatchSet {
                revision: "deadbeef".to_string(),
                ref_name: "refs/changes/42/42/1".to_string(),
                approvals,
            }),
            url: String::new(),
            commit_message: String::new(),
            topic: None,
        }
    }

    #[test]
    fn category_from_label_handles_both_wire_forms() {
        assert_eq!(
            ApprovalCategory::from_label("Code-Review"),
            ApprovalCategory::CodeReview
        );
        assert_eq!(
            ApprovalCategory::from_label("CRVW"),
            ApprovalCategory::CodeReview
        );
        assert_eq!(
            ApprovalCategory::from_label("VRIF"),
            ApprovalCategory::Verified
        );
        assert_eq!(
            ApprovalCategory::from_label("SUBM"),
            ApprovalCategory::Other("SUBM".to_string())
        );
    }

    #[test]
    fn negative_vote_dominates() {
        let review = review_with_approvals(vec![
            Approval {
                category: ApprovalCategory::CodeReview,
                value: Some(2),
                by: person("bob"),
            },
            Approval {
                category: ApprovalCategory::CodeReview,
                value: Some(-2),
                by: person("carol"),
            },
        ]);
        assert_eq!(review.score_for(&ApprovalCategory::CodeReview), Some(-2));
    }

    #[test]
    fn zero_vote_distinct_from_no_vote() {
        let voted = review_with_approvals(vec![Approval {
            category: ApprovalCategory::CodeReview,
            value: Some(0),
            by: person("bob"),
        }]);
        let unvoted = review_with_approvals(vec![]);

        assert_eq!(voted.score_for(&ApprovalCategory::CodeReview), Some(0));
        assert_eq!(unvoted.score_for(&ApprovalCategory::CodeReview), None);
        assert_eq!(format_score(Some(0)), " 0");
        assert_eq!(format_score(None), "");
    }

    #[test]
    fn format_score_signs() {
        assert_eq!(format_score(Some(2)), "+2");
        assert_eq!(format_score(Some(-1)), "-1");
    }
}
