//! User-confirmed signal mapping and its persisted store.
//!
//! The mapping is the single source of truth for role→entity assignments:
//! the inferencer re-consumes it as strong evidence and the panel renders
//! from it. Updates always replace the persisted document wholesale; there
//! is no partial merge. Two cleaning paths exist on purpose: the API path
//! cleans and returns only the keys the caller supplied, while the service
//! path normalizes to an explicit value for all four roles.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HouseResult, PreconditionError, ValidationError};
use crate::signal::SignalRole;
use crate::storage::{KvStore, StorageError, MAPPING_STORE_KEY};

/// Role→entity assignments confirmed by the user.
///
/// Values are `None` (explicitly unmapped) or a non-empty entity id. A key
/// may be absent entirely when the persisted document predates it or when an
/// API caller supplied a subset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalMapping(BTreeMap<SignalRole, Option<String>>);

impl SignalMapping {
    /// Creates an empty mapping (no keys at all).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cleans an API-supplied candidate, keeping only the keys it carries.
    ///
    /// Unknown keys are silently dropped. `null` and the empty string
    /// normalize to `None`; any other non-string value is a validation
    /// error. Rejects candidates that are not JSON objects.
    pub fn clean_partial(candidate: &Value) -> Result<Self, ValidationError> {
        let object = candidate
            .as_object()
            .ok_or(ValidationError::MappingNotAnObject)?;

        let mut cleaned = BTreeMap::new();
        for (key, value) in object {
            let Some(role) = SignalRole::parse(key) else {
                continue;
            };
            cleaned.insert(role, Self::clean_value(role, value)?);
        }
        Ok(Self(cleaned))
    }

    /// Cleans a service-supplied candidate, normalizing all four roles.
    ///
    /// Roles the candidate omits become `None` explicitly. Validation rules
    /// match [`Self::clean_partial`].
    pub fn clean_normalized(candidate: &Value) -> Result<Self, ValidationError> {
        let object = candidate
            .as_object()
            .ok_or(ValidationError::MappingNotAnObject)?;

        let mut cleaned = BTreeMap::new();
        for role in SignalRole::ALL {
            let value = object.get(role.as_str()).unwrap_or(&Value::Null);
            cleaned.insert(role, Self::clean_value(role, value)?);
        }
        Ok(Self(cleaned))
    }

    fn clean_value(role: SignalRole, value: &Value) -> Result<Option<String>, ValidationError> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) if s.is_empty() => Ok(None),
            Value::String(s) => Ok(Some(s.clone())),
            _ => Err(ValidationError::InvalidMappingValue { role }),
        }
    }

    /// The entity mapped to `role`, if any.
    #[must_use]
    pub fn get(&self, role: SignalRole) -> Option<&str> {
        self.0.get(&role).and_then(|v| v.as_deref())
    }

    /// Assigns `role` directly (test and service convenience).
    pub fn set(&mut self, role: SignalRole, entity_id: Option<String>) {
        self.0.insert(role, entity_id);
    }

    /// Returns a copy with all four roles explicitly present.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut full = BTreeMap::new();
        for role in SignalRole::ALL {
            full.insert(role, self.get(role).map(str::to_string));
        }
        Self(full)
    }

    /// True when every role has a confirmed entity.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        SignalRole::ALL.iter().all(|role| self.get(*role).is_some())
    }

    /// True when the mapping carries no keys at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Persisted store for the signal mapping, with an in-memory read cache.
///
/// Single writer by construction; the cache is refreshed on load and
/// replaced wholesale on set.
pub struct MappingStore {
    store: Arc<dyn KvStore>,
    cached: RwLock<Option<SignalMapping>>,
}

impl MappingStore {
    /// Creates a mapping store over the given backend.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            cached: RwLock::new(None),
        }
    }

    fn lock_err() -> PreconditionError {
        PreconditionError::Storage {
            message: "poisoned mapping cache lock".to_string(),
        }
    }

    /// Returns the persisted mapping, or an empty mapping if never set.
    pub fn get(&self) -> HouseResult<SignalMapping> {
        {
            let guard = self.cached.read().map_err(|_| Self::lock_err())?;
            if let Some(mapping) = guard.as_ref() {
                return Ok(mapping.clone());
            }
        }

        let loaded = self
            .store
            .load(MAPPING_STORE_KEY)
            .map_err(PreconditionError::from)?;
        let mapping = match loaded {
            Some(doc) => {
                // Persisted by this crate, so a parse failure means the
                // document was corrupted out-of-band.
                serde_json::from_value(doc)
                    .map_err(|e| PreconditionError::from(StorageError::Serialization(e)))?
            }
            None => SignalMapping::new(),
        };

        let mut guard = self.cached.write().map_err(|_| Self::lock_err())?;
        *guard = Some(mapping.clone());
        Ok(mapping)
    }

    /// Persists `mapping` atomically and replaces the cache wholesale.
    pub fn set(&self, mapping: SignalMapping) -> HouseResult<SignalMapping> {
        let doc = serde_json::to_value(&mapping)
            .map_err(|e| PreconditionError::from(StorageError::Serialization(e)))?;
        self.store
            .save(MAPPING_STORE_KEY, &doc)
            .map_err(PreconditionError::from)?;

        let mut guard = self.cached.write().map_err(|_| Self::lock_err())?;
        *guard = Some(mapping.clone());
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;
    use serde_json::json;

    #[test]
    fn test_clean_partial_keeps_supplied_keys_only() {
        let cleaned =
            SignalMapping::clean_partial(&json!({"solar": "sensor.pv_power"})).unwrap();
        assert_eq!(cleaned.get(SignalRole::Solar), Some("sensor.pv_power"));
        // Unsupplied keys stay absent, not null.
        assert_ne!(cleaned, cleaned.normalized());
    }

    #[test]
    fn test_clean_partial_drops_unknown_keys() {
        let cleaned = SignalMapping::clean_partial(&json!({
            "solar": "sensor.pv",
            "wind": "sensor.turbine"
        }))
        .unwrap();
        assert_eq!(
            serde_json::to_value(&cleaned).unwrap(),
            json!({"solar": "sensor.pv"})
        );
    }

    #[test]
    fn test_empty_string_and_null_normalize_to_null() {
        let cleaned = SignalMapping::clean_partial(&json!({"soc": "", "load": null})).unwrap();
        assert_eq!(cleaned.get(SignalRole::Soc), None);
        assert_eq!(
            serde_json::to_value(&cleaned).unwrap(),
            json!({"soc": null, "load": null})
        );
    }

    #[test]
    fn test_non_string_value_is_rejected() {
        let err = SignalMapping::clean_partial(&json!({"voltage": 12.8})).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidMappingValue {
                role: SignalRole::Voltage
            }
        ));
    }

    #[test]
    fn test_non_object_is_rejected() {
        let err = SignalMapping::clean_partial(&json!(["soc"])).unwrap_err();
        assert!(matches!(err, ValidationError::MappingNotAnObject));
    }

    #[test]
    fn test_clean_normalized_always_has_four_keys() {
        let cleaned =
            SignalMapping::clean_normalized(&json!({"soc": "sensor.battery_soc"})).unwrap();
        assert_eq!(
            serde_json::to_value(&cleaned).unwrap(),
            json!({
                "soc": "sensor.battery_soc",
                "voltage": null,
                "solar": null,
                "load": null
            })
        );
    }

    #[test]
    fn test_store_get_before_set_is_empty() {
        let store = MappingStore::new(Arc::new(MemoryKvStore::new()));
        assert!(store.get().unwrap().is_empty());
    }

    #[test]
    fn test_store_set_then_get_is_idempotent() {
        let store = MappingStore::new(Arc::new(MemoryKvStore::new()));
        let cleaned =
            SignalMapping::clean_partial(&json!({"solar": "sensor.pv_power"})).unwrap();

        let first = store.set(cleaned.clone()).unwrap();
        let second = store.set(cleaned.clone()).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.get().unwrap(), cleaned);
    }

    #[test]
    fn test_store_set_replaces_wholesale() {
        let backend = Arc::new(MemoryKvStore::new());
        let store = MappingStore::new(backend);
        store
            .set(SignalMapping::clean_partial(&json!({"soc": "sensor.a"})).unwrap())
            .unwrap();
        store
            .set(SignalMapping::clean_partial(&json!({"load": "sensor.b"})).unwrap())
            .unwrap();

        let current = store.get().unwrap();
        assert_eq!(current.get(SignalRole::Soc), None);
        assert_eq!(current.get(SignalRole::Load), Some("sensor.b"));
    }

    #[test]
    fn test_cache_survives_backend_reads() {
        let backend = Arc::new(MemoryKvStore::new());
        backend
            .save(MAPPING_STORE_KEY, &json!({"solar": "sensor.pv"}))
            .unwrap();
        let store = MappingStore::new(backend);
        assert_eq!(store.get().unwrap().get(SignalRole::Solar), Some("sensor.pv"));
    }
}
