use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;

use crate::compactor;
use crate::engine::Engine;
use crate::limits::*;
use crate::store::MemoryStore;

/// A loaded school: its store and the engine booking against it.
#[derive(Clone)]
pub struct School {
    pub store: Arc<MemoryStore>,
    pub engine: Arc<Engine>,
}

/// Manages per-school engines. Each school gets its own store, WAL file and compactor.
pub struct TenantManager {
    schools: DashMap<String, School>,
    data_dir: PathBuf,
    compact_threshold: u64,
    compact_interval: Duration,
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64, compact_interval: Duration) -> Self {
        Self {
            schools: DashMap::new(),
            data_dir,
            compact_threshold,
            compact_interval,
        }
    }

    /// Get or lazily open the school with the given name.
    pub fn get_or_create(&self, name: &str) -> std::io::Result<School> {
        if let Some(school) = self.schools.get(name) {
            return Ok(school.value().clone());
        }
        if name.len() > MAX_TENANT_NAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "school name too long",
            ));
        }
        if self.schools.len() >= MAX_TENANTS {
            return Err(std::io::Error::other("too many schools"));
        }

        // Keep the WAL inside data_dir whatever the name says.
        let safe_name: String = name
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if safe_name.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty school name",
            ));
        }

        let school = match self.schools.entry(name.to_string()) {
            Entry::Occupied(e) => return Ok(e.get().clone()),
            Entry::Vacant(slot) => {
                let wal_path = self.data_dir.join(format!("{safe_name}.wal"));
                let store = Arc::new(MemoryStore::open(&wal_path)?);
                let engine = Arc::new(Engine::new(store.clone()));

                tokio::spawn(compactor::run_compactor(
                    store.clone(),
                    self.compact_threshold,
                    self.compact_interval,
                ));
                info!("opened school {name} at {}", wal_path.display());
                slot.insert(School { store, engine }).clone()
            }
        };
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.schools.len() as f64);
        Ok(school)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schools.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use ulid::Ulid;

    use crate::model::*;
    use crate::store::EntityStore;

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("slotgrid_test_tenant").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn manager(dir: PathBuf) -> TenantManager {
        TenantManager::new(dir, 1000, Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn schools_are_isolated() {
        let tm = manager(test_data_dir("isolation"));
        let a = tm.get_or_create("school_a").unwrap();
        let b = tm.get_or_create("school_b").unwrap();

        a.store
            .save_grade(Grade { id: Ulid::new(), name: "Grade 1".into(), order: 1 })
            .await
            .unwrap();

        assert_eq!(a.store.snapshot().await.unwrap().grades.len(), 1);
        assert!(b.store.snapshot().await.unwrap().grades.is_empty());
        assert_eq!(tm.names(), vec!["school_a".to_string(), "school_b".to_string()]);
    }

    #[tokio::test]
    async fn lazy_creation_writes_wal_file() {
        let dir = test_data_dir("lazy");
        let tm = manager(dir.clone());
        assert!(fs::read_dir(&dir).unwrap().next().is_none());
        let _school = tm.get_or_create("central").unwrap();
        assert!(dir.join("central.wal").exists());
    }

    #[tokio::test]
    async fn same_engine_returned() {
        let tm = manager(test_data_dir("same_engine"));
        let first = tm.get_or_create("foo").unwrap();
        let second = tm.get_or_create("foo").unwrap();
        assert!(Arc::ptr_eq(&first.engine, &second.engine));
        assert!(Arc::ptr_eq(&first.store, &second.store));
    }

    #[tokio::test]
    async fn name_sanitized() {
        let dir = test_data_dir("sanitize");
        let tm = manager(dir.clone());
        let _school = tm.get_or_create("../evil").unwrap();
        assert!(dir.join("evil.wal").exists());
        assert!(tm.get_or_create("../..").is_err());
    }

    #[tokio::test]
    async fn name_too_long() {
        let tm = manager(test_data_dir("too_long"));
        let err = tm
            .get_or_create(&"x".repeat(MAX_TENANT_NAME_LEN + 1))
            .err()
            .unwrap();
        assert!(err.to_string().contains("school name too long"));
    }
}
