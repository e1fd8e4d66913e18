//! Student booking against the capacity ledger and the record store.
//!
//! Every book/unbook on a course runs inside that course's critical
//! section: look up the record, move the seat counter, write the record.
//! Callers may give up while waiting for the section; once it is entered
//! the work runs on its own task and completes even if the caller is gone.

use crate::data::{BookingRecord, Course, CourseId, StudentId};
use crate::error::{BookingError, LedgerError, StorageError};
use crate::ledger::CapacityLedger;
use crate::storage::BookingStore;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;

pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct BookingEngine {
    inner: Arc<Inner>,
}

struct Inner {
    ledger: Arc<CapacityLedger>,
    store: Arc<dyn BookingStore>,
    sections: RwLock<HashMap<CourseId, Arc<Mutex<()>>>>,
    storage_timeout: Duration,
}

impl BookingEngine {
    pub fn new(
        ledger: Arc<CapacityLedger>,
        store: Arc<dyn BookingStore>,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                ledger,
                store,
                sections: RwLock::new(HashMap::new()),
                storage_timeout,
            }),
        }
    }

    /// Rebuilds the ledger from the durable booking records of `store`.
    pub async fn recover(
        courses: &[Course],
        store: Arc<dyn BookingStore>,
        storage_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let counts = tokio::time::timeout(storage_timeout, store.count_by_course())
            .await
            .map_err(|_| StorageError::Timeout(storage_timeout))??;
        info!(
            "Recovered {} booking records over {} courses",
            counts.values().sum::<u32>(),
            counts.len()
        );
        let ledger = Arc::new(CapacityLedger::rebuild(courses, &counts));
        Ok(Self::new(ledger, store, storage_timeout))
    }

    pub fn ledger(&self) -> &Arc<CapacityLedger> {
        &self.inner.ledger
    }

    /// Books a seat in `course` for `student`.
    pub async fn book(&self, student: StudentId, course: CourseId) -> Result<(), BookingError> {
        if !self.inner.ledger.contains(&course) {
            return Err(BookingError::CourseNotExisted(course));
        }
        let record = BookingRecord::new(student, course);
        self.run_in_section(record, |inner, record| async move {
            inner.book_locked(&record).await
        })
        .await
    }

    /// Gives back the seat `student` holds in `course`.
    pub async fn unbook(&self, student: StudentId, course: CourseId) -> Result<(), BookingError> {
        if !self.inner.ledger.contains(&course) {
            return Err(BookingError::StudentHasNoCourse { student, course });
        }
        let record = BookingRecord::new(student, course);
        self.run_in_section(record, |inner, record| async move {
            inner.unbook_locked(&record).await
        })
        .await
    }

    /// Courses currently booked by `student`, ascending.
    pub async fn student_courses(&self, student: &StudentId) -> Result<Vec<CourseId>, BookingError> {
        Ok(self.inner.bounded(self.inner.store.courses_of(student)).await?)
    }

    pub fn enrolled(&self, course: &CourseId) -> Result<u32, BookingError> {
        self.inner
            .ledger
            .enrolled(course)
            .map_err(|_| BookingError::CourseNotExisted(course.clone()))
    }

    async fn run_in_section<F, Fut>(&self, record: BookingRecord, op: F) -> Result<(), BookingError>
    where
        F: FnOnce(Arc<Inner>, BookingRecord) -> Fut,
        Fut: Future<Output = Result<(), BookingError>> + Send + 'static,
    {
        let section = self.inner.section(&record.course);
        let guard = section.lock_owned().await;
        let work = op(Arc::clone(&self.inner), record);
        tokio::spawn(async move {
            let _guard = guard;
            work.await
        })
        .await
        .map_err(|e| BookingError::Interrupted(e.to_string()))?
    }
}

impl Inner {
    fn section(&self, course: &CourseId) -> Arc<Mutex<()>> {
        {
            let sections = match self.sections.read() {
                Ok(s) => s,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(section) = sections.get(course) {
                return Arc::clone(section);
            }
        }
        let mut sections = match self.sections.write() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(sections.entry(course.clone()).or_default())
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        tokio::time::timeout(self.storage_timeout, fut)
            .await
            .map_err(|_| StorageError::Timeout(self.storage_timeout))?
    }

    async fn book_locked(&self, record: &BookingRecord) -> Result<(), BookingError> {
        if self.bounded(self.store.contains(record)).await? {
            return Err(BookingError::StudentHasCourse {
                student: record.student.clone(),
                course: record.course.clone(),
            });
        }

        let left = self.ledger.reserve(&record.course).map_err(|e| match e {
            LedgerError::CourseFull(c) => BookingError::CourseNotAvailable(c),
            LedgerError::UnknownCourse(c) => BookingError::CourseNotExisted(c),
        })?;

        if let Err(e) = self.bounded(self.store.insert(record)).await {
            warn!("Writing booking {record} failed ({e}), releasing the seat");
            if let Err(release) = self.ledger.release(&record.course) {
                warn!("Rollback for {record} failed: {release}");
            }
            return Err(e.into());
        }

        info!("Booked {record}, {left} seats left");
        Ok(())
    }

    async fn unbook_locked(&self, record: &BookingRecord) -> Result<(), BookingError> {
        let removed = match self.bounded(self.store.remove(record)).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Removing booking {record} failed ({e}), its seat stays taken until the ledger is rebuilt");
                return Err(e.into());
            }
        };
        if !removed {
            return Err(BookingError::StudentHasNoCourse {
                student: record.student.clone(),
                course: record.course.clone(),
            });
        }
        let left = self.ledger.release(&record.course).map_err(|e| match e {
            LedgerError::CourseFull(c) | LedgerError::UnknownCourse(c) => {
                BookingError::CourseNotExisted(c)
            }
        })?;
        debug!("Unbooked {record}, {left} seats left");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;

    /// Store whose writes fail or stall.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        insert_delay: Option<Duration>,
        remove_delay: Option<Duration>,
        fail_inserts: bool,
        fail_removes: bool,
    }

    #[async_trait]
    impl BookingStore for FlakyStore {
        async fn contains(&self, record: &BookingRecord) -> Result<bool, StorageError> {
            self.inner.contains(record).await
        }

        async fn insert(&self, record: &BookingRecord) -> Result<(), StorageError> {
            if let Some(delay) = self.insert_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_inserts {
                return Err(StorageError::Backend("disk on fire".into()));
            }
            self.inner.insert(record).await
        }

        async fn remove(&self, record: &BookingRecord) -> Result<bool, StorageError> {
            if let Some(delay) = self.remove_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_removes {
                return Err(StorageError::Backend("disk on fire".into()));
            }
            self.inner.remove(record).await
        }

        async fn count_by_course(&self) -> Result<HashMap<CourseId, u32>, StorageError> {
            self.inner.count_by_course().await
        }

        async fn courses_of(&self, student: &StudentId) -> Result<Vec<CourseId>, StorageError> {
            self.inner.courses_of(student).await
        }
    }

    fn engine_with(store: Arc<dyn BookingStore>, capacity: u32) -> BookingEngine {
        let ledger = Arc::new(CapacityLedger::new());
        ledger.register("1".into(), capacity, 0);
        BookingEngine::new(ledger, store, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn book_then_unbook_restores_state() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(store.clone(), 2);

        engine.book("s1".into(), "1".into()).await.unwrap();
        assert_eq!(engine.enrolled(&"1".into()), Ok(1));
        assert_eq!(store.len(), 1);

        engine.unbook("s1".into(), "1".into()).await.unwrap();
        assert_eq!(engine.enrolled(&"1".into()), Ok(0));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn second_booking_is_rejected() {
        let engine = engine_with(Arc::new(MemoryStore::new()), 5);
        engine.book("s1".into(), "1".into()).await.unwrap();

        let err = engine.book("s1".into(), "1".into()).await.unwrap_err();
        assert!(matches!(err, BookingError::StudentHasCourse { .. }));
        assert_eq!(engine.enrolled(&"1".into()), Ok(1));
    }

    #[tokio::test]
    async fn unknown_course() {
        let engine = engine_with(Arc::new(MemoryStore::new()), 1);
        let err = engine.book("s1".into(), "2".into()).await.unwrap_err();
        assert_eq!(err, BookingError::CourseNotExisted("2".into()));
    }

    #[tokio::test]
    async fn unbook_without_booking() {
        let engine = engine_with(Arc::new(MemoryStore::new()), 1);
        let err = engine.unbook("s1".into(), "1".into()).await.unwrap_err();
        assert!(matches!(err, BookingError::StudentHasNoCourse { .. }));
        assert_eq!(engine.enrolled(&"1".into()), Ok(0));
    }

    #[tokio::test]
    async fn failed_write_releases_the_seat() {
        let store = Arc::new(FlakyStore {
            fail_inserts: true,
            ..FlakyStore::default()
        });
        let engine = engine_with(store, 1);

        let err = engine.book("s1".into(), "1".into()).await.unwrap_err();
        assert!(matches!(err, BookingError::Storage(StorageError::Backend(_))));
        assert_eq!(engine.ledger().remaining(&"1".into()), Ok(1));
    }

    #[tokio::test]
    async fn stalled_write_times_out_and_rolls_back() {
        let store = Arc::new(FlakyStore {
            insert_delay: Some(Duration::from_secs(5)),
            ..FlakyStore::default()
        });
        let engine = engine_with(store.clone(), 1);

        let err = engine.book("s1".into(), "1".into()).await.unwrap_err();
        assert!(matches!(err, BookingError::Storage(StorageError::Timeout(_))));
        assert_eq!(engine.ledger().remaining(&"1".into()), Ok(1));
        assert!(store.inner.is_empty());
    }

    #[tokio::test]
    async fn stalled_removal_keeps_the_seat_taken() {
        let store = Arc::new(FlakyStore {
            remove_delay: Some(Duration::from_secs(5)),
            ..FlakyStore::default()
        });
        let engine = engine_with(store.clone(), 1);
        engine.book("s1".into(), "1".into()).await.unwrap();

        let err = engine.unbook("s1".into(), "1".into()).await.unwrap_err();
        assert!(matches!(err, BookingError::Storage(StorageError::Timeout(_))));
        assert_eq!(engine.enrolled(&"1".into()), Ok(1));
        assert_eq!(store.inner.len(), 1);
    }

    #[tokio::test]
    async fn failed_removal_keeps_the_seat_taken() {
        let store = Arc::new(FlakyStore {
            fail_removes: true,
            ..FlakyStore::default()
        });
        let engine = engine_with(store.clone(), 1);
        engine.book("s1".into(), "1".into()).await.unwrap();

        let err = engine.unbook("s1".into(), "1".into()).await.unwrap_err();
        assert!(matches!(err, BookingError::Storage(StorageError::Backend(_))));
        assert_eq!(engine.ledger().remaining(&"1".into()), Ok(0));
        assert!(store.inner.contains(&BookingRecord::new("s1".into(), "1".into())).await.unwrap());
    }

    #[tokio::test]
    async fn rebooking_after_unbooking_is_allowed() {
        let engine = engine_with(Arc::new(MemoryStore::new()), 1);
        engine.book("s1".into(), "1".into()).await.unwrap();
        engine.unbook("s1".into(), "1".into()).await.unwrap();
        engine.book("s1".into(), "1".into()).await.unwrap();
        assert_eq!(engine.enrolled(&"1".into()), Ok(1));
    }
}
