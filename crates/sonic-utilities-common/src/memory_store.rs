//! In-process [`TableStore`] used by unit tests and offline tooling.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::db::{glob_to_regex, table_key, FieldValues, TableStore};
use crate::error::UtilResult;

/// A [`TableStore`] holding records in memory, keyed by raw key.
///
/// Every mutation is appended to a write log so tests can assert that an
/// operation performed no writes at all.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, FieldValues>>,
    writes: Mutex<Vec<String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record without logging a write.
    pub fn insert(&self, table: &str, key: &str, fvs: FieldValues) {
        self.records.lock().insert(table_key(table, key), fvs);
    }

    /// Returns a copy of the record at `(table, key)`.
    pub fn record(&self, table: &str, key: &str) -> Option<FieldValues> {
        self.records.lock().get(&table_key(table, key)).cloned()
    }

    /// Returns the raw keys written or deleted so far, in order.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().clone()
    }

    /// Returns the number of mutations performed so far.
    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    fn log_write(&self, raw_key: &str) {
        self.writes.lock().push(raw_key.to_string());
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn get_entry(&self, table: &str, key: &str) -> UtilResult<Option<FieldValues>> {
        Ok(self
            .records
            .lock()
            .get(&table_key(table, key))
            .filter(|fvs| !fvs.is_empty())
            .cloned())
    }

    async fn set_entry(&self, table: &str, key: &str, fvs: Option<FieldValues>) -> UtilResult<()> {
        let raw_key = table_key(table, key);
        self.log_write(&raw_key);

        let mut records = self.records.lock();
        match fvs {
            Some(fvs) if !fvs.is_empty() => {
                records.insert(raw_key, fvs);
            }
            _ => {
                records.remove(&raw_key);
            }
        }
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> UtilResult<Vec<String>> {
        let re = glob_to_regex(pattern)?;
        Ok(self
            .records
            .lock()
            .keys()
            .filter(|k| re.is_match(k))
            .cloned()
            .collect())
    }

    async fn hget(&self, raw_key: &str, field: &str) -> UtilResult<Option<String>> {
        Ok(self.records.lock().get(raw_key).and_then(|fvs| {
            fvs.iter()
                .find(|(f, _)| f == field)
                .map(|(_, v)| v.clone())
        }))
    }

    async fn delete(&self, raw_key: &str) -> UtilResult<()> {
        self.log_write(raw_key);
        self.records.lock().remove(raw_key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_values;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_set_and_get_entry() {
        let store = MemoryStore::new();
        store
            .set_entry("CHASSIS_MODULE", "DPU0", Some(field_values! {"admin_status" => "down"}))
            .await
            .unwrap();

        let fvs = store.get_entry("CHASSIS_MODULE", "DPU0").await.unwrap();
        assert_eq!(fvs, Some(field_values! {"admin_status" => "down"}));
        assert_eq!(store.writes(), vec!["CHASSIS_MODULE|DPU0".to_string()]);
    }

    #[tokio::test]
    async fn test_set_entry_replaces_whole_record() {
        let store = MemoryStore::new();
        store.insert(
            "CHASSIS_MODULE",
            "DPU0",
            field_values! {"admin_status" => "down", "state_transition_in_progress" => "True"},
        );

        store
            .set_entry("CHASSIS_MODULE", "DPU0", Some(field_values! {"admin_status" => "up"}))
            .await
            .unwrap();

        assert_eq!(
            store.record("CHASSIS_MODULE", "DPU0"),
            Some(field_values! {"admin_status" => "up"})
        );
    }

    #[tokio::test]
    async fn test_null_set_deletes() {
        let store = MemoryStore::new();
        store.insert("CHASSIS_MODULE", "LINE-CARD0", field_values! {"admin_status" => "down"});

        store.set_entry("CHASSIS_MODULE", "LINE-CARD0", None).await.unwrap();
        assert_eq!(store.record("CHASSIS_MODULE", "LINE-CARD0"), None);

        store.insert("CHASSIS_MODULE", "LINE-CARD1", field_values! {"admin_status" => "down"});
        store
            .set_entry("CHASSIS_MODULE", "LINE-CARD1", Some(Vec::new()))
            .await
            .unwrap();
        assert_eq!(store.record("CHASSIS_MODULE", "LINE-CARD1"), None);
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_keys_and_hget() {
        let store = MemoryStore::new();
        store.insert("CHASSIS_FABRIC_ASIC_TABLE", "asic3", field_values! {"name" => "FABRIC-CARD2"});
        store.insert("CHASSIS_FABRIC_ASIC_TABLE", "asic4", field_values! {"name" => "FABRIC-CARD2"});
        store.insert("CHASSIS_MODULE_TABLE", "FABRIC-CARD2", field_values! {"oper_status" => "Online"});

        let keys = store.keys("CHASSIS_FABRIC_ASIC_TABLE*").await.unwrap();
        assert_eq!(
            keys,
            vec![
                "CHASSIS_FABRIC_ASIC_TABLE|asic3".to_string(),
                "CHASSIS_FABRIC_ASIC_TABLE|asic4".to_string(),
            ]
        );

        let name = store.hget("CHASSIS_FABRIC_ASIC_TABLE|asic3", "name").await.unwrap();
        assert_eq!(name.as_deref(), Some("FABRIC-CARD2"));
        assert_eq!(store.hget("CHASSIS_FABRIC_ASIC_TABLE|asic9", "name").await.unwrap(), None);

        store.delete("CHASSIS_FABRIC_ASIC_TABLE|asic3").await.unwrap();
        assert_eq!(store.keys("CHASSIS_FABRIC_ASIC_TABLE*").await.unwrap().len(), 1);
    }
}
