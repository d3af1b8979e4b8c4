//! Chapter and outcome records.

use plotline_types::{ChapterId, OutcomeId, Timestamp, TokenMap};
use serde::{Deserialize, Serialize};

/// A chapter as seen by the settlement engine.
///
/// The narrative subsystem owns the chapter itself; the engine keeps only
/// the id, the betting deadline and its own settlement bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub id: ChapterId,
    /// Betting closes once wall-clock time passes this instant.
    pub deadline: Timestamp,
    /// Candidate outcomes, in the order they were opened.
    pub outcomes: Vec<OutcomeId>,
    pub opened_at: Timestamp,
    pub closed_at: Option<Timestamp>,
    pub resolved_at: Option<Timestamp>,
    /// The outcome that resolution was applied with.
    pub winning_outcome: Option<OutcomeId>,
    /// Value left for the next cycle: the whole pot when nobody backed the
    /// winner, or any token the winning pool held no stake in.
    pub rollover: TokenMap,
    /// Chapter whose rollover seeded this chapter's pools.
    pub carried_from: Option<ChapterId>,
    /// Chapter that consumed this chapter's rollover.
    pub carried_into: Option<ChapterId>,
}

impl ChapterRecord {
    /// Rollover that has not yet been used to seed another chapter.
    pub fn pending_rollover(&self) -> Option<&TokenMap> {
        if self.carried_into.is_none() && !self.rollover.is_empty() {
            Some(&self.rollover)
        } else {
            None
        }
    }
}

/// One candidate outcome of a chapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub id: OutcomeId,
    pub chapter_id: ChapterId,
    pub label: String,
    /// Set once, for the winning outcome, when the chapter resolves.
    pub selected: bool,
}
