//! Signal roles and the keyword/unit entity scorer.
//!
//! A signal role is one of the four canonical home-energy measurements the
//! panel auto-maps to entities. Each role carries a static scoring rule:
//! strong keywords worth 3 points, weak keywords worth 1, and an accepted
//! unit set worth 2. Scoring is a pure function over the snapshot entry;
//! it never errors and never touches I/O.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::snapshot::{keyword_haystack, EntityState};

/// Domain prefixes that are penalized as mapping candidates.
///
/// Automations and updater entities routinely embed words like "solar" or
/// "battery" in their ids without measuring anything.
pub const EXCLUDED_DOMAIN_PREFIXES: [&str; 2] = ["automation.", "update."];

/// Score contribution of a strong keyword match.
const STRONG_KEYWORD_POINTS: i32 = 3;
/// Score contribution of a weak keyword match.
const WEAK_KEYWORD_POINTS: i32 = 1;
/// Score contribution of a unit-of-measurement match.
const UNIT_POINTS: i32 = 2;
/// Penalty applied to excluded domains.
const EXCLUDED_DOMAIN_PENALTY: i32 = 2;

/// One of the four canonical measurement categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalRole {
    /// Battery state of charge (%).
    Soc,
    /// Battery voltage (V).
    Voltage,
    /// Solar input power (W).
    Solar,
    /// Total consumption / load power (W).
    Load,
}

impl SignalRole {
    /// All roles, in canonical order.
    pub const ALL: [Self; 4] = [Self::Soc, Self::Voltage, Self::Solar, Self::Load];

    /// Canonical snake_case name, matching the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Soc => "soc",
            Self::Voltage => "voltage",
            Self::Solar => "solar",
            Self::Load => "load",
        }
    }

    /// Parses a canonical role name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "soc" => Some(Self::Soc),
            "voltage" => Some(Self::Voltage),
            "solar" => Some(Self::Solar),
            "load" => Some(Self::Load),
            _ => None,
        }
    }

    /// The static scoring rule for this role.
    #[must_use]
    pub const fn rule(self) -> &'static SignalRule {
        match self {
            Self::Soc => &SOC_RULE,
            Self::Voltage => &VOLTAGE_RULE,
            Self::Solar => &SOLAR_RULE,
            Self::Load => &LOAD_RULE,
        }
    }
}

impl fmt::Display for SignalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static scoring rule for a signal role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRule {
    /// Keywords worth 3 points each on substring match.
    pub strong: &'static [&'static str],
    /// Keywords worth 1 point each on substring match.
    pub weak: &'static [&'static str],
    /// Accepted units of measurement, lowercased; exact match is worth 2.
    pub units: &'static [&'static str],
}

static SOC_RULE: SignalRule = SignalRule {
    strong: &["soc", "state_of_charge", "battery_soc"],
    weak: &["battery"],
    units: &["%"],
};

static VOLTAGE_RULE: SignalRule = SignalRule {
    strong: &["voltage", "battery_voltage", "batt_v"],
    weak: &["battery"],
    units: &["v"],
};

static SOLAR_RULE: SignalRule = SignalRule {
    strong: &["solar", "pv", "photovoltaic", "panel"],
    weak: &["input", "power"],
    units: &["w"],
};

static LOAD_RULE: SignalRule = SignalRule {
    strong: &["load", "consumption", "house_power", "ac_load", "power"],
    weak: &["total", "sum"],
    units: &["w"],
};

/// Scores a candidate entity against a signal rule.
///
/// Keywords match case-insensitively as substrings of
/// `entity_id + " " + display_name`; the unit matches exactly,
/// case-insensitively, against the declared unit of measurement. Absent
/// names or units are treated as empty strings. Entities in excluded
/// domains are penalized by 2 points.
#[must_use]
pub fn score(entity_id: &str, entity: &EntityState, rule: &SignalRule) -> i32 {
    let hay = keyword_haystack(entity_id, entity.display_name());
    let unit = entity.unit_of_measurement().to_lowercase();

    let mut total = 0;
    for kw in rule.strong {
        if hay.contains(kw) {
            total += STRONG_KEYWORD_POINTS;
        }
    }
    for kw in rule.weak {
        if hay.contains(kw) {
            total += WEAK_KEYWORD_POINTS;
        }
    }
    if !unit.is_empty() && rule.units.contains(&unit.as_str()) {
        total += UNIT_POINTS;
    }
    if EXCLUDED_DOMAIN_PREFIXES
        .iter()
        .any(|prefix| entity_id.starts_with(prefix))
    {
        total -= EXCLUDED_DOMAIN_PENALTY;
    }
    total
}
