//! Persistence for the three independent records: reference catalog,
//! correction settings and enabled-pack selection.
//!
//! Loading never fails. A missing record yields the built-in default; an
//! unreadable or corrupt one yields the default and logs a warning. Saving
//! reports errors, but callers treat writes as fire-and-forget: a failed
//! write never rolls back in-memory state.

pub mod memory;
pub mod schema;
pub mod sqlite;

use std::collections::BTreeSet;

use crate::catalog;
use crate::domain::{CorrectionSettings, ReferencePack};
use crate::error::Result;
use crate::settings;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub const CATALOG_KEY: &str = "catalog.v1";
pub const SETTINGS_KEY: &str = "settings.v1";
pub const SELECTION_KEY: &str = "enabled_packs.v1";

pub trait CatalogStore {
    fn load_catalog(&self) -> Vec<ReferencePack>;
    fn save_catalog(&self, packs: &[ReferencePack]) -> Result<()>;
}

pub trait SettingsStore {
    fn load_settings(&self) -> CorrectionSettings;
    fn save_settings(&self, settings: &CorrectionSettings) -> Result<()>;
}

pub trait SelectionStore {
    /// `None` means no selection was ever saved: every pack is enabled.
    fn load_selection(&self) -> Option<BTreeSet<String>>;
    fn save_selection(&self, enabled: &BTreeSet<String>) -> Result<()>;
}

/// Everything the studio persists.
pub trait StudioStore: CatalogStore + SettingsStore + SelectionStore {}

impl<T: CatalogStore + SettingsStore + SelectionStore> StudioStore for T {}

/// Raw key-value access to versioned JSON records.
pub trait RecordStore {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
}

/// Read a record, folding read errors into "absent" with a warning.
fn read_or_warn<S: RecordStore + ?Sized>(store: &S, key: &str) -> Option<String> {
    match store.read(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to read stored record, using defaults");
            None
        }
    }
}

impl<S: RecordStore> CatalogStore for S {
    fn load_catalog(&self) -> Vec<ReferencePack> {
        let Some(raw) = read_or_warn(self, CATALOG_KEY) else {
            return catalog::seed_packs();
        };
        match serde_json::from_str(&raw) {
            Ok(packs) => packs,
            Err(e) => {
                tracing::warn!(key = CATALOG_KEY, error = %e, "corrupt catalog record, using seed packs");
                catalog::seed_packs()
            }
        }
    }

    fn save_catalog(&self, packs: &[ReferencePack]) -> Result<()> {
        self.write(CATALOG_KEY, &serde_json::to_string(packs)?)
    }
}

impl<S: RecordStore> SettingsStore for S {
    fn load_settings(&self) -> CorrectionSettings {
        let Some(raw) = read_or_warn(self, SETTINGS_KEY) else {
            return CorrectionSettings::default();
        };
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => settings::recover(&value),
            Err(e) => {
                tracing::warn!(key = SETTINGS_KEY, error = %e, "corrupt settings record, using defaults");
                CorrectionSettings::default()
            }
        }
    }

    fn save_settings(&self, settings: &CorrectionSettings) -> Result<()> {
        self.write(SETTINGS_KEY, &serde_json::to_string(settings)?)
    }
}

impl<S: RecordStore> SelectionStore for S {
    fn load_selection(&self) -> Option<BTreeSet<String>> {
        let raw = read_or_warn(self, SELECTION_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(ids) => Some(ids),
            Err(e) => {
                tracing::warn!(key = SELECTION_KEY, error = %e, "corrupt pack selection, enabling all packs");
                None
            }
        }
    }

    fn save_selection(&self, enabled: &BTreeSet<String>) -> Result<()> {
        self.write(SELECTION_KEY, &serde_json::to_string(enabled)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{SEED_DETAILS_ID, SEED_TURNAROUNDS_ID};
    use crate::domain::{AngleTag, CorrectionMode};

    #[test]
    fn test_missing_records_yield_defaults() {
        let store = MemoryStore::new();
        let packs = store.load_catalog();
        let ids: Vec<&str> = packs.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![SEED_TURNAROUNDS_ID, SEED_DETAILS_ID]);
        assert_eq!(store.load_settings(), CorrectionSettings::default());
        assert_eq!(store.load_selection(), None);
    }

    #[test]
    fn test_corrupt_records_yield_defaults() {
        let store = MemoryStore::new();
        store.insert_raw(CATALOG_KEY, "{not json");
        store.insert_raw(SETTINGS_KEY, "[[[");
        store.insert_raw(SELECTION_KEY, "42");
        assert_eq!(store.load_catalog().len(), 2);
        assert_eq!(store.load_settings(), CorrectionSettings::default());
        assert_eq!(store.load_selection(), None);
    }

    #[test]
    fn test_roundtrip_through_records() {
        let store = MemoryStore::new();
        let settings = CorrectionSettings {
            mode: CorrectionMode::Conditioned,
            angle_tag: AngleTag::Upshot,
            strength: 90,
            ..CorrectionSettings::default()
        };
        store.save_settings(&settings).unwrap();
        assert_eq!(store.load_settings(), settings);

        let selection: BTreeSet<String> = [SEED_DETAILS_ID.to_string()].into();
        store.save_selection(&selection).unwrap();
        assert_eq!(store.load_selection(), Some(selection));

        let mut packs = catalog::seed_packs();
        packs.truncate(1);
        store.save_catalog(&packs).unwrap();
        assert_eq!(store.load_catalog(), packs);
    }

    #[test]
    fn test_empty_catalog_is_not_replaced_by_seeds() {
        let store = MemoryStore::new();
        store.save_catalog(&[]).unwrap();
        assert!(store.load_catalog().is_empty());
    }

    #[test]
    fn test_settings_record_missing_fields_recovered() {
        let store = MemoryStore::new();
        store.insert_raw(SETTINGS_KEY, r#"{"angleTag": "Front", "strength": 12}"#);
        let settings = store.load_settings();
        assert_eq!(settings.angle_tag, AngleTag::Front);
        assert_eq!(settings.strength, 12);
        assert_eq!(settings.line_preservation, 85);
    }
}
