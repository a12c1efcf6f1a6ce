use crate::{Approval, ApprovalCategory, PatchSet, Person, Review};
use serde::Deserialize;
use tracing::warn;

/// The summary object terminating a query response.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueryStats {
    #[serde(default)]
    pub row_count: u32,
    #[serde(default)]
    pub more_changes: bool,
}

/// What one line of query output turned out to be.
#[derive(Debug)]
pub enum ParsedLine {
    Review(Box<Review>),
    Stats(QueryStats),
    /// A `{"type":"error",...}` row from Gerrit.
    Error(String),
    /// Blank, malformed, or missing required fields; dropped, not fatal.
    Skipped,
}

/// Everything a full query response decodes to.
#[derive(Debug, Default)]
pub struct QueryOutcome {
    pub reviews: Vec<Review>,
    pub stats: Option<QueryStats>,
}

// ---------------------------------------------------------------------------
// Wire shapes. Every field is optional at this layer; requiredness is decided
// once, when a change is promoted to a Review.
// ---------------------------------------------------------------------------

/// A number Gerrit may emit as either a JSON integer or a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireNumber {
    Int(u64),
    Str(String),
}

impl WireNumber {
    fn as_u64(&self) -> Option<u64> {
        match self {
            WireNumber::Int(n) => Some(*n),
            WireNumber::Str(s) => s.parse().ok(),
        }
    }
}

/// A score arrives as a string ("2", "+1", "-2"); a non-parseable value is
/// treated as absent, never as zero.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireScore {
    Int(i64),
    Str(String),
}

impl WireScore {
    fn as_i32(&self) -> Option<i32> {
        match self {
            WireScore::Int(n) => i32::try_from(*n).ok(),
            WireScore::Str(s) => s.trim_start_matches('+').parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireAccount {
    name: Option<String>,
    email: Option<String>,
    username: Option<String>,
}

impl WireAccount {
    fn into_person(self) -> Option<Person> {
        Some(Person {
            name: self.name?,
            email: self.email,
            username: self.username,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireApproval {
    #[serde(rename = "type")]
    category: Option<String>,
    value: Option<WireScore>,
    by: Option<WireAccount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePatchSet {
    revision: Option<String>,
    #[serde(rename = "ref")]
    ref_name: Option<String>,
    #[serde(default)]
    approvals: Vec<WireApproval>,
}

/// `currentPatchSet` is a single object in plain query mode but a
/// one-element sequence in comments-as-threads mode; both normalize to one
/// patchset.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WirePatchSets {
    One(WirePatchSet),
    Many(Vec<WirePatchSet>),
}

impl WirePatchSets {
    fn into_single(self) -> Option<WirePatchSet> {
        match self {
            WirePatchSets::One(ps) => Some(ps),
            WirePatchSets::Many(seq) => seq.into_iter().next(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireChange {
    id: Option<String>,
    number: Option<WireNumber>,
    subject: Option<String>,
    owner: Option<WireAccount>,
    /// Tri-state on the wire: true, false, or absent (absent = not a draft).
    is_draft: Option<bool>,
    current_patch_set: Option<WirePatchSets>,
    url: Option<String>,
    commit_message: Option<String>,
    topic: Option<String>,
}

impl WireChange {
    /// Promote to a Review. `number`, `subject`, and `owner.name` must all be
    /// present for the record to be renderable and actionable; otherwise the
    /// whole record is dropped.
    fn into_review(self) -> Option<Review> {
        let number = self.number.as_ref().and_then(WireNumber::as_u64)?;
        let subject = self.subject?;
        let owner = self.owner.and_then(WireAccount::into_person)?;

        let current_patch_set = self
            .current_patch_set
            .and_then(WirePatchSets::into_single)
            .and_then(convert_patch_set);

        Some(Review {
            id: self.id.unwrap_or_default(),
            number,
            subject,
            owner,
            is_draft: self.is_draft.unwrap_or(false),
            current_patch_set,
            url: self.url.unwrap_or_default(),
            commit_message: self.commit_message.unwrap_or_default(),
            topic: self.topic.filter(|t| !t.is_empty()),
        })
    }
}

fn convert_patch_set(wire: WirePatchSet) -> Option<PatchSet> {
    let revision = wire.revision?;
    let ref_name = wire.ref_name?;
    // Wire order is Gerrit's order; keep it.
    let approvals = wire
        .approvals
        .into_iter()
        .filter_map(|a| {
            let by = a.by.and_then(WireAccount::into_person)?;
            Some(Approval {
                category: ApprovalCategory::from_label(a.category.as_deref()?),
                value: a.value.as_ref().and_then(WireScore::as_i32),
                by,
            })
        })
        .collect();
    Some(PatchSet {
        revision,
        ref_name,
        approvals,
    })
}

/// Rows carrying an explicit `type` tag: the stats terminator and errors.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTagged {
    #[serde(rename = "type")]
    kind: String,
    message: Option<String>,
    #[serde(default)]
    row_count: u32,
    #[serde(default)]
    more_changes: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireLine {
    // Tried first: a change object has no "type" field, so anything tagged
    // lands here instead of matching the all-optional change shape.
    Tagged(WireTagged),
    Change(Box<WireChange>),
}

/// Decode one line of query output.
pub fn parse_line(line: &str) -> ParsedLine {
    let line = line.trim();
    if line.is_empty() {
        return ParsedLine::Skipped;
    }

    let wire: WireLine = match serde_json::from_str(line) {
        Ok(wire) => wire,
        Err(err) => {
            warn!(%err, "dropping malformed query line");
            return ParsedLine::Skipped;
        }
    };

    match wire {
        WireLine::Tagged(tagged) if tagged.kind == "stats" => ParsedLine::Stats(QueryStats {
            row_count: tagged.row_count,
            more_changes: tagged.more_changes,
        }),
        WireLine::Tagged(tagged) if tagged.kind == "error" => {
            ParsedLine::Error(tagged.message.unwrap_or_else(|| "unknown error".to_string()))
        }
        WireLine::Tagged(tagged) => {
            warn!(kind = %tagged.kind, "dropping unrecognized tagged query row");
            ParsedLine::Skipped
        }
        WireLine::Change(change) => match change.into_review() {
            Some(review) => ParsedLine::Review(Box::new(review)),
            None => {
                warn!("dropping change record missing number, subject, or owner name");
                ParsedLine::Skipped
            }
        },
    }
}

/// Decode a whole response. Per-line failures drop that record only; the
/// stats terminator is captured separately, never as a review.
pub fn parse_lines<'a, I>(lines: I) -> QueryOutcome
where
    I: IntoIterator<Item = &'a str>,
{
    let mut outcome = QueryOutcome::default();
    for line in lines {
        match parse_line(line) {
            ParsedLine::Review(review) => outcome.reviews.push(*review),
            ParsedLine::Stats(stats) => outcome.stats = Some(stats),
            ParsedLine::Error(message) => {
                warn!(%message, "gerrit reported a query error");
            }
            ParsedLine::Skipped => {}
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANGE: &str = r#"{"project":"top/sub","branch":"main","id":"I7f9a","number":"4021","subject":"Fix retry loop","owner":{"name":"Alice","email":"alice@example.com","username":"alice"},"url":"https://gerrit.example.com/4021","commitMessage":"Fix retry loop\n\nChange-Id: I7f9a","currentPatchSet":{"number":"2","revision":"8c5b1e","ref":"refs/changes/21/4021/2","approvals":[{"type":"Code-Review","value":"+2","by":{"name":"Bob"}},{"type":"Verified","value":"1","by":{"name":"CI"}}]}}"#;

    const STATS: &str = r#"{"type":"stats","rowCount":1,"runTimeMilliseconds":12}"#;

    #[test]
    fn change_line_parses_to_review() {
        let ParsedLine::Review(review) = parse_line(CHANGE) else {
            panic!("expected a review");
        };
        assert_eq!(review.number, 4021);
        assert_eq!(review.subject, "Fix retry loop");
        assert_eq!(review.owner.name, "Alice");
        assert!(!review.is_draft);

        let ps = review.current_patch_set.as_ref().unwrap();
        assert_eq!(ps.revision, "8c5b1e");
        assert_eq!(ps.ref_name, "refs/changes/21/4021/2");
        assert_eq!(ps.approvals.len(), 2);
        assert_eq!(ps.approvals[0].category, ApprovalCategory::CodeReview);
        assert_eq!(ps.approvals[0].value, Some(2));
        assert_eq!(ps.approvals[1].category, ApprovalCategory::Verified);
        assert_eq!(ps.approvals[1].value, Some(1));
    }

    #[test]
    fn stats_line_is_never_a_review() {
        assert!(matches!(parse_line(STATS), ParsedLine::Stats(_)));

        let outcome = parse_lines([CHANGE, STATS]);
        assert_eq!(outcome.reviews.len(), 1);
        assert_eq!(
            outcome.stats,
            Some(QueryStats {
                row_count: 1,
                more_changes: false
            })
        );
    }

    #[test]
    fn error_line_is_surfaced() {
        let line = r#"{"type":"error","message":"not signed in"}"#;
        match parse_line(line) {
            ParsedLine::Error(msg) => assert_eq!(msg, "not signed in"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn malformed_line_is_skipped_not_fatal() {
        let outcome = parse_lines(["{not json", CHANGE]);
        assert_eq!(outcome.reviews.len(), 1);
    }

    #[test]
    fn record_without_owner_name_is_dropped() {
        let line = r#"{"number":"7","subject":"s","owner":{"email":"x@y"}}"#;
        assert!(matches!(parse_line(line), ParsedLine::Skipped));
    }

    #[test]
    fn record_without_subject_is_dropped() {
        let line = r#"{"number":"7","owner":{"name":"A"}}"#;
        assert!(matches!(parse_line(line), ParsedLine::Skipped));
    }

    #[test]
    fn number_accepts_int_and_string() {
        let as_str = r#"{"number":"7","subject":"s","owner":{"name":"A"}}"#;
        let as_int = r#"{"number":7,"subject":"s","owner":{"name":"A"}}"#;
        for line in [as_str, as_int] {
            let ParsedLine::Review(review) = parse_line(line) else {
                panic!("expected review for {line}");
            };
            assert_eq!(review.number, 7);
        }
    }

    #[test]
    fn draft_absent_means_not_draft() {
        let absent = r#"{"number":1,"subject":"s","owner":{"name":"A"}}"#;
        let explicit = r#"{"number":1,"subject":"s","owner":{"name":"A"},"isDraft":true}"#;

        let ParsedLine::Review(review) = parse_line(absent) else {
            panic!()
        };
        assert!(!review.is_draft);

        let ParsedLine::Review(review) = parse_line(explicit) else {
            panic!()
        };
        assert!(review.is_draft);
    }

    #[test]
    fn current_patch_set_accepts_one_element_sequence() {
        let line = r#"{"number":1,"subject":"s","owner":{"name":"A"},"currentPatchSet":[{"revision":"abc","ref":"refs/changes/1/1/1"}]}"#;
        let ParsedLine::Review(review) = parse_line(line) else {
            panic!()
        };
        assert_eq!(review.current_patch_set.unwrap().revision, "abc");
    }

    #[test]
    fn zero_score_is_not_absent() {
        let line = r#"{"number":1,"subject":"s","owner":{"name":"A"},"currentPatchSet":{"revision":"abc","ref":"r","approvals":[{"type":"Code-Review","value":"0","by":{"name":"B"}}]}}"#;
        let ParsedLine::Review(review) = parse_line(line) else {
            panic!()
        };
        let ps = review.current_patch_set.unwrap();
        assert_eq!(ps.approvals[0].value, Some(0));
    }

    #[test]
    fn unparseable_score_is_absent() {
        let line = r#"{"number":1,"subject":"s","owner":{"name":"A"},"currentPatchSet":{"revision":"abc","ref":"r","approvals":[{"type":"Code-Review","value":"??","by":{"name":"B"}}]}}"#;
        let ParsedLine::Review(review) = parse_line(line) else {
            panic!()
        };
        let ps = review.current_patch_set.unwrap();
        assert_eq!(ps.approvals[0].value, None);
    }

    #[test]
    fn approval_order_is_preserved() {
        let line = r#"{"number":1,"subject":"s","owner":{"name":"A"},"currentPatchSet":{"revision":"abc","ref":"r","approvals":[{"type":"Verified","value":"1","by":{"name":"CI"}},{"type":"Code-Review","value":"-1","by":{"name":"B"}}]}}"#;
        let ParsedLine::Review(review) = parse_line(line) else {
            panic!()
        };
        let ps = review.current_patch_set.unwrap();
        assert_eq!(ps.approvals[0].category, ApprovalCategory::Verified);
        assert_eq!(ps.approvals[1].category, ApprovalCategory::CodeReview);
    }

    #[test]
    fn empty_topic_normalizes_to_none() {
        let line = r#"{"number":1,"subject":"s","owner":{"name":"A"},"topic":""}"#;
        let ParsedLine::Review(review) = parse_line(line) else {
            panic!()
        };
        assert_eq!(review.topic, None);
    }
}
