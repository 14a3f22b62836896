//! Shared doubles for controller tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use stash_core::*;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// One call made against a collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Pack(Vec<String>),
    Unpack,
    Put { object: String, storage_class: String },
    Get(String),
    Exists(String),
    Delete(String),
    SetTag { object: String, value: String },
    GetTag(String),
}

impl Call {
    pub fn is_tag_write(&self) -> bool {
        matches!(self, Call::SetTag { .. })
    }

    pub fn is_tag(&self) -> bool {
        matches!(self, Call::SetTag { .. } | Call::GetTag(_))
    }
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

/// Failure switches for the doubles.
#[derive(Debug, Default, Clone)]
pub struct Faults {
    pub pack: bool,
    pub unpack: bool,
    pub put: bool,
    pub get_tag: bool,
    pub set_tag: bool,
}

/// In-memory object store that records every call.
pub struct RecordingStore {
    log: CallLog,
    faults: Mutex<Faults>,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    tags: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl RecordingStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            faults: Mutex::new(Faults::default()),
            objects: Mutex::new(HashMap::new()),
            tags: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_faults(&self, faults: Faults) {
        *self.faults.lock().unwrap() = faults;
    }

    /// Seed an object directly, bypassing the call log.
    pub fn seed(&self, bucket: &str, name: &StorageObjectName, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{bucket}/{name}"), bytes.to_vec());
    }

    /// Seed a tag directly, bypassing the call log.
    pub fn seed_tag(&self, bucket: &str, name: &StorageObjectName, key: &str, value: &str) {
        self.tags
            .lock()
            .unwrap()
            .entry(format!("{bucket}/{name}"))
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    pub fn tag(&self, bucket: &str, name: &StorageObjectName) -> Option<String> {
        self.tags
            .lock()
            .unwrap()
            .get(&format!("{bucket}/{name}"))
            .and_then(|t| t.get(LAST_USED_TAG).cloned())
    }

    pub fn contains(&self, bucket: &str, name: &StorageObjectName) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&format!("{bucket}/{name}"))
    }

    fn record(&self, call: Call) {
        self.log.lock().unwrap().push(call);
    }

    fn faults(&self) -> Faults {
        self.faults.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn put(
        &self,
        bucket: &str,
        name: &StorageObjectName,
        source: &Path,
        storage_class: &StorageClass,
    ) -> Result<()> {
        self.record(Call::Put {
            object: name.to_string(),
            storage_class: storage_class.to_string(),
        });
        if self.faults().put {
            return Err(Error::StoreFailure("upload refused".into()));
        }
        let bytes = std::fs::read(source)?;
        self.seed(bucket, name, &bytes);
        Ok(())
    }

    async fn get(&self, bucket: &str, name: &StorageObjectName, dest: &Path) -> Result<u64> {
        self.record(Call::Get(name.to_string()));
        let bytes = self
            .objects
            .lock()
            .unwrap()
            .get(&format!("{bucket}/{name}"))
            .cloned()
            .ok_or_else(|| Error::StoreFailure(format!("{name} not found")))?;
        std::fs::write(dest, &bytes)?;
        Ok(bytes.len() as u64)
    }

    async fn exists(&self, bucket: &str, name: &StorageObjectName) -> Result<bool> {
        self.record(Call::Exists(name.to_string()));
        Ok(self.contains(bucket, name))
    }

    async fn delete(&self, bucket: &str, name: &StorageObjectName) -> Result<()> {
        self.record(Call::Delete(name.to_string()));
        let key = format!("{bucket}/{name}");
        self.objects.lock().unwrap().remove(&key);
        self.tags.lock().unwrap().remove(&key);
        Ok(())
    }

    async fn set_tag(
        &self,
        bucket: &str,
        name: &StorageObjectName,
        tag: &RecencyTag,
    ) -> Result<()> {
        self.record(Call::SetTag {
            object: name.to_string(),
            value: tag.value.clone(),
        });
        if self.faults().set_tag {
            return Err(Error::StoreFailure("tagging refused".into()));
        }
        self.seed_tag(bucket, name, &tag.key, &tag.value);
        Ok(())
    }

    async fn get_tag(
        &self,
        bucket: &str,
        name: &StorageObjectName,
        tag_key: &str,
    ) -> Result<String> {
        self.record(Call::GetTag(name.to_string()));
        if self.faults().get_tag {
            return Err(Error::StoreFailure("access denied".into()));
        }
        self.tags
            .lock()
            .unwrap()
            .get(&format!("{bucket}/{name}"))
            .and_then(|t| t.get(tag_key).cloned())
            .ok_or_else(|| Error::TagNotFound {
                object: name.to_string(),
                tag: tag_key.to_string(),
            })
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Archiver that writes a marker file instead of a real archive.
pub struct StubArchiver {
    log: CallLog,
    faults: Mutex<Faults>,
}

impl StubArchiver {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            faults: Mutex::new(Faults::default()),
        }
    }

    pub fn set_faults(&self, faults: Faults) {
        *self.faults.lock().unwrap() = faults;
    }
}

impl Archiver for StubArchiver {
    fn pack(&self, artifacts: &ArtifactSet, dest: &Path) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(Call::Pack(artifacts.iter().map(str::to_string).collect()));
        if self.faults.lock().unwrap().pack {
            return Err(Error::ArchiveFailure("tar exited with status 2".into()));
        }
        std::fs::write(dest, artifacts.iter().collect::<Vec<_>>().join("\n"))?;
        Ok(())
    }

    fn unpack(&self, _archive: &Path) -> Result<()> {
        self.log.lock().unwrap().push(Call::Unpack);
        if self.faults.lock().unwrap().unpack {
            return Err(Error::ArchiveFailure("corrupt archive".into()));
        }
        Ok(())
    }
}

/// Clock pinned to a settable day.
pub struct TestClock(Mutex<NaiveDate>);

impl TestClock {
    pub fn new(date: NaiveDate) -> Self {
        Self(Mutex::new(date))
    }

    pub fn set(&self, date: NaiveDate) {
        *self.0.lock().unwrap() = date;
    }
}

impl Clock for TestClock {
    fn today(&self) -> NaiveDate {
        *self.0.lock().unwrap()
    }
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
