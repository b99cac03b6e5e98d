//! House-memory inference: presence summaries for coarse energy subsystems.
//!
//! Derives, per subsystem (solar, battery, grid, generator), whether the
//! house appears to have it, a confidence in `[0, 1]`, and the entity ids
//! that count as evidence. Evidence comes from keyword scans over entity ids
//! and names, with the user-confirmed mapping injected as strong evidence.
//! This is a best-effort heuristic: false positives and negatives are
//! expected and acceptable. The contract is determinism and confidence that
//! grows monotonically with evidence, not ground truth.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::mapping::SignalMapping;
use crate::signal::SignalRole;
use crate::snapshot::{keyword_haystack, EntitySnapshot};

/// Evidence entries reported per subsystem are capped at this many ids.
pub const MAX_EVIDENCE: usize = 10;

/// Confidence baseline when any evidence at all is present.
const CONFIDENCE_BASE: f64 = 0.25;
/// Confidence added per evidence entity.
const CONFIDENCE_PER_HIT: f64 = 0.12;

/// A coarse home-energy subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    /// Photovoltaic input.
    Solar,
    /// House battery bank.
    Battery,
    /// Utility / shore connection.
    Grid,
    /// Backup generator.
    Generator,
}

impl Subsystem {
    /// All subsystems, in canonical order.
    pub const ALL: [Self; 4] = [Self::Solar, Self::Battery, Self::Grid, Self::Generator];

    /// Canonical snake_case name, matching the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Solar => "solar",
            Self::Battery => "battery",
            Self::Grid => "grid",
            Self::Generator => "generator",
        }
    }

    /// Keywords whose presence in an entity's id or name counts as evidence.
    ///
    /// The battery list deliberately overlaps with voltage/current terms;
    /// grid and generator share vocabulary with other domains, which is why
    /// they carry a higher hit threshold.
    #[must_use]
    pub const fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Solar => &[
                "solar",
                "pv",
                "photovoltaic",
                "panel",
                "mppt",
                "victron",
                "cerbo",
                "smartsolar",
                "renogy",
                "charge_controller",
            ],
            Self::Battery => &[
                "battery",
                "batt",
                "soc",
                "state_of_charge",
                "shunt",
                "bms",
                "lifepo",
                "voltage",
                "current",
                "amp",
            ],
            Self::Grid => &[
                "grid", "mains", "utility", "import", "export", "shore", "ac_in", "ac input",
                "ac_input",
            ],
            Self::Generator => &["generator", "gen", "genset", "start", "run", "running"],
        }
    }

    /// Signal roles whose mapped entity counts as a direct override.
    #[must_use]
    pub const fn mapped_roles(self) -> &'static [SignalRole] {
        match self {
            Self::Solar => &[SignalRole::Solar],
            Self::Battery => &[SignalRole::Soc, SignalRole::Voltage],
            Self::Grid => &[],
            Self::Generator => &[],
        }
    }

    /// Minimum raw keyword hits required when no mapping override exists.
    ///
    /// Suppresses single weak-keyword false positives for grid/generator.
    #[must_use]
    pub const fn require_hits(self) -> usize {
        match self {
            Self::Solar | Self::Battery => 1,
            Self::Grid | Self::Generator => 2,
        }
    }

    /// Confidence floor applied when a direct mapping override exists.
    #[must_use]
    pub const fn base_if_mapped(self) -> f64 {
        match self {
            Self::Solar => 0.8,
            Self::Battery => 0.85,
            Self::Grid | Self::Generator => 0.75,
        }
    }
}

/// Presence summary for one subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseMemoryEntry {
    /// Whether the subsystem appears to exist in this house.
    pub present: bool,
    /// Confidence in `[0, 1]`, rounded to two decimals.
    pub confidence: f64,
    /// Supporting entity ids, first-seen order, at most [`MAX_EVIDENCE`].
    pub evidence: Vec<String>,
}

impl HouseMemoryEntry {
    fn absent() -> Self {
        Self {
            present: false,
            confidence: 0.0,
            evidence: Vec::new(),
        }
    }
}

/// The derived summary across all subsystems.
///
/// Recomputed wholesale on every refresh, never incrementally mutated;
/// persisted only as a cache of the last computation.
pub type HouseMemory = BTreeMap<Subsystem, HouseMemoryEntry>;

/// Infers house memory from a snapshot and the confirmed mapping.
///
/// Deterministic and infallible: absence of evidence degrades to
/// `present=false`, never an error.
#[must_use]
pub fn infer(snapshot: &EntitySnapshot, mapping: &SignalMapping) -> HouseMemory {
    Subsystem::ALL
        .into_iter()
        .map(|subsystem| (subsystem, infer_subsystem(subsystem, snapshot, mapping)))
        .collect()
}

fn infer_subsystem(
    subsystem: Subsystem,
    snapshot: &EntitySnapshot,
    mapping: &SignalMapping,
) -> HouseMemoryEntry {
    let keywords = subsystem.keywords();
    let mut keyword_hits: Vec<&str> = Vec::new();
    for (entity_id, entity) in snapshot.iter() {
        let hay = keyword_haystack(entity_id, entity.friendly_name());
        if keywords.iter().any(|kw| hay.contains(kw)) {
            keyword_hits.push(entity_id);
        }
    }

    let mapped_ids: Vec<&str> = subsystem
        .mapped_roles()
        .iter()
        .filter_map(|role| mapping.get(*role))
        .collect();

    // Mapped ids lead, then keyword hits; dedup preserving first-seen order.
    let mut seen: HashSet<&str> = HashSet::new();
    let mut combined: Vec<String> = Vec::new();
    for entity_id in mapped_ids.iter().copied().chain(keyword_hits.iter().copied()) {
        if seen.insert(entity_id) {
            combined.push(entity_id.to_string());
        }
    }

    let hits = combined.len();
    if hits == 0 {
        return HouseMemoryEntry::absent();
    }

    combined.truncate(MAX_EVIDENCE);

    if mapped_ids.is_empty() && hits < subsystem.require_hits() {
        return HouseMemoryEntry {
            present: false,
            confidence: 0.0,
            evidence: combined,
        };
    }

    #[allow(clippy::cast_precision_loss)]
    let mut confidence = (CONFIDENCE_BASE + CONFIDENCE_PER_HIT * hits as f64).min(1.0);
    if !mapped_ids.is_empty() {
        confidence = confidence.max(subsystem.base_if_mapped());
    }
    confidence = (confidence * 100.0).round() / 100.0;

    HouseMemoryEntry {
        present: true,
        confidence,
        evidence: combined,
    }
}
