//! Suggestion ranking: top-N mapping candidates per signal role.
//!
//! The ranker scores every entity in a snapshot against a role's rule and
//! keeps the positive scorers, sorted descending. Ties fall back to snapshot
//! iteration order, which is a stable total order (lexicographic by id);
//! callers must not rely on tie order beyond that.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::signal::{score, SignalRole, SignalRule};
use crate::snapshot::EntitySnapshot;

/// Default number of candidates returned per role.
pub const DEFAULT_SUGGESTION_LIMIT: usize = 3;

/// A ranked mapping candidate for one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Candidate entity id.
    pub entity_id: String,
    /// Heuristic score (always positive; non-candidates are dropped).
    pub score: i32,
    /// Entity state at snapshot time, for display.
    pub state: String,
    /// Declared unit of measurement, empty when absent.
    pub unit: String,
}

/// Ranks snapshot entities against a rule, best first.
///
/// Entities scoring zero or below are excluded entirely; an empty result
/// means "no candidates", not a placeholder.
#[must_use]
pub fn rank(snapshot: &EntitySnapshot, rule: &SignalRule, limit: usize) -> Vec<Suggestion> {
    let mut ranked: Vec<Suggestion> = Vec::new();
    for (entity_id, entity) in snapshot.iter() {
        let s = score(entity_id, entity, rule);
        if s > 0 {
            ranked.push(Suggestion {
                entity_id: entity_id.to_string(),
                score: s,
                state: entity.state.clone(),
                unit: entity.unit_of_measurement().to_string(),
            });
        }
    }
    // Stable sort keeps snapshot order within equal scores.
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked.truncate(limit);
    ranked
}

/// Ranks candidates for every role with the default limit.
#[must_use]
pub fn suggest_all(snapshot: &EntitySnapshot) -> BTreeMap<SignalRole, Vec<Suggestion>> {
    SignalRole::ALL
        .into_iter()
        .map(|role| (role, rank(snapshot, role.rule(), DEFAULT_SUGGESTION_LIMIT)))
        .collect()
}

/// Number of top-ranked candidates per role, as shown by the panel self-test.
#[must_use]
pub fn suggestion_counts(snapshot: &EntitySnapshot) -> BTreeMap<SignalRole, usize> {
    suggest_all(snapshot)
        .into_iter()
        .map(|(role, candidates)| (role, candidates.len()))
        .collect()
}
