//! Point-in-time entity snapshot types.
//!
//! A snapshot is the host state registry flattened into a plain map: entity
//! id to current state plus attributes. Snapshots are read-only and supplied
//! fresh on every inference pass; nothing in this crate caches one or tracks
//! its staleness. Iteration order is lexicographic by entity id, which gives
//! the ranker and the inferencer a stable total order without further
//! bookkeeping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The current state of a single entity at snapshot time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// Raw state value as reported by the host (always stringly-typed).
    #[serde(default)]
    pub state: String,

    /// Host-provided attributes (friendly_name, unit_of_measurement, ...).
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl EntityState {
    /// Creates a state with no attributes.
    #[must_use]
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            attributes: Map::new(),
        }
    }

    /// Sets an attribute, consuming and returning self for chaining.
    #[must_use]
    pub fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    fn attr_str(&self, key: &str) -> &str {
        self.attributes.get(key).and_then(Value::as_str).unwrap_or("")
    }

    /// Display name: `friendly_name`, falling back to `device_class`, then empty.
    #[must_use]
    pub fn display_name(&self) -> &str {
        let name = self.attr_str("friendly_name");
        if name.is_empty() {
            self.attr_str("device_class")
        } else {
            name
        }
    }

    /// Friendly name only (no device-class fallback), empty when absent.
    #[must_use]
    pub fn friendly_name(&self) -> &str {
        self.attr_str("friendly_name")
    }

    /// Declared unit of measurement, empty when absent.
    #[must_use]
    pub fn unit_of_measurement(&self) -> &str {
        self.attr_str("unit_of_measurement")
    }

    /// State parsed as a float, `None` when non-numeric.
    #[must_use]
    pub fn numeric_state(&self) -> Option<f64> {
        self.state.trim().parse::<f64>().ok()
    }
}

/// A point-in-time mapping from entity id to entity state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntitySnapshot(BTreeMap<String, EntityState>);

impl EntitySnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts an entity, replacing any previous state under the same id.
    pub fn insert(&mut self, entity_id: impl Into<String>, state: EntityState) {
        self.0.insert(entity_id.into(), state);
    }

    /// Looks up an entity by id.
    #[must_use]
    pub fn get(&self, entity_id: &str) -> Option<&EntityState> {
        self.0.get(entity_id)
    }

    /// Iterates entities in lexicographic id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntityState)> {
        self.0.iter().map(|(id, st)| (id.as_str(), st))
    }

    /// Number of entities in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when the snapshot holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, EntityState)> for EntitySnapshot {
    fn from_iter<I: IntoIterator<Item = (String, EntityState)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Lowercased `entity_id + " " + name` haystack used by every keyword match.
#[must_use]
pub fn keyword_haystack(entity_id: &str, name: &str) -> String {
    let mut hay = String::with_capacity(entity_id.len() + name.len() + 1);
    hay.push_str(entity_id);
    hay.push(' ');
    hay.push_str(name);
    hay.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_device_class() {
        let st = EntityState::new("12.8").with_attribute("device_class", "voltage");
        assert_eq!(st.display_name(), "voltage");

        let st = st.with_attribute("friendly_name", "House Battery");
        assert_eq!(st.display_name(), "House Battery");
    }

    #[test]
    fn test_missing_attributes_are_empty_strings() {
        let st = EntityState::new("on");
        assert_eq!(st.friendly_name(), "");
        assert_eq!(st.unit_of_measurement(), "");
        assert_eq!(st.display_name(), "");
    }

    #[test]
    fn test_non_string_attribute_treated_as_absent() {
        let st = EntityState::new("55").with_attribute("friendly_name", 7);
        assert_eq!(st.friendly_name(), "");
    }

    #[test]
    fn test_numeric_state() {
        assert_eq!(EntityState::new(" 42.5 ").numeric_state(), Some(42.5));
        assert_eq!(EntityState::new("unavailable").numeric_state(), None);
    }

    #[test]
    fn test_iteration_is_sorted_by_id() {
        let mut snap = EntitySnapshot::new();
        snap.insert("sensor.zeta", EntityState::new("1"));
        snap.insert("sensor.alpha", EntityState::new("2"));
        let ids: Vec<&str> = snap.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["sensor.alpha", "sensor.zeta"]);
    }

    #[test]
    fn test_keyword_haystack_lowercases() {
        let hay = keyword_haystack("sensor.PV_Power", "Solar Input");
        assert_eq!(hay, "sensor.pv_power solar input");
    }
}
