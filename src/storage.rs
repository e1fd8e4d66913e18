//! Persistence collaborator for booking records.

use crate::data::{BookingRecord, CourseId, StudentId};
use crate::error::StorageError;
use async_trait::async_trait;
use itertools::Itertools;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

/// Durable system of record for bookings.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn contains(&self, record: &BookingRecord) -> Result<bool, StorageError>;

    async fn insert(&self, record: &BookingRecord) -> Result<(), StorageError>;

    /// Returns `false` when no such record existed.
    async fn remove(&self, record: &BookingRecord) -> Result<bool, StorageError>;

    /// Number of records per course, used to rebuild the ledger.
    async fn count_by_course(&self) -> Result<HashMap<CourseId, u32>, StorageError>;

    async fn courses_of(&self, student: &StudentId) -> Result<Vec<CourseId>, StorageError>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeSet<BookingRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = BookingRecord>) -> Self {
        Self {
            records: Mutex::new(records.into_iter().collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeSet<BookingRecord>>, StorageError> {
        self.records
            .lock()
            .map_err(|e| StorageError::Backend(format!("record set poisoned: {e}")))
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn contains(&self, record: &BookingRecord) -> Result<bool, StorageError> {
        Ok(self.lock()?.contains(record))
    }

    async fn insert(&self, record: &BookingRecord) -> Result<(), StorageError> {
        self.lock()?.insert(record.clone());
        Ok(())
    }

    async fn remove(&self, record: &BookingRecord) -> Result<bool, StorageError> {
        Ok(self.lock()?.remove(record))
    }

    async fn count_by_course(&self) -> Result<HashMap<CourseId, u32>, StorageError> {
        Ok(self
            .lock()?
            .iter()
            .map(|r| r.course.clone())
            .counts()
            .into_iter()
            .map(|(course, n)| (course, n as u32))
            .collect())
    }

    async fn courses_of(&self, student: &StudentId) -> Result<Vec<CourseId>, StorageError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|r| &r.student == student)
            .map(|r| r.course.clone())
            .sorted()
            .collect())
    }
}
