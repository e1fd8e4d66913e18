//! Remaining-seat counters per course.
//!
//! Each course owns an atomic counter mutated with compare-and-swap loops,
//! so reservations on one course never wait on another. The course table
//! is only write-locked while a course is registered.

use crate::data::{Course, CourseId};
use crate::error::LedgerError;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug)]
struct Seats {
    capacity: u32,
    remaining: AtomicU32,
}

impl Seats {
    fn new(capacity: u32, enrolled: u32) -> Self {
        Self {
            capacity,
            remaining: AtomicU32::new(capacity.saturating_sub(enrolled)),
        }
    }
}

/// Authoritative in-process record of remaining capacity per course.
#[derive(Debug, Default)]
pub struct CapacityLedger {
    seats: RwLock<HashMap<CourseId, Arc<Seats>>>,
}

impl CapacityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the ledger from the catalog and the number of durable
    /// booking records per course.
    pub fn rebuild(courses: &[Course], counts: &HashMap<CourseId, u32>) -> Self {
        let ledger = Self::new();
        for course in courses {
            let enrolled = counts.get(&course.id).copied().unwrap_or(0);
            ledger.register(course.id.clone(), course.capacity, enrolled);
        }
        debug!("Capacity ledger rebuilt for {} courses", courses.len());
        ledger
    }

    /// Starts tracking `course`. Re-registering replaces the counter.
    pub fn register(&self, course: CourseId, capacity: u32, enrolled: u32) {
        if enrolled > capacity {
            warn!("course {course} has {enrolled} bookings for {capacity} seats, clamping to full");
        }
        let seats = Arc::new(Seats::new(capacity, enrolled));
        let mut table = match self.seats.write() {
            Ok(table) => table,
            Err(poisoned) => poisoned.into_inner(),
        };
        table.insert(course, seats);
    }

    fn seats(&self, course: &CourseId) -> Result<Arc<Seats>, LedgerError> {
        let table = match self.seats.read() {
            Ok(table) => table,
            Err(poisoned) => poisoned.into_inner(),
        };
        table
            .get(course)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownCourse(course.clone()))
    }

    pub fn contains(&self, course: &CourseId) -> bool {
        self.seats(course).is_ok()
    }

    /// Takes one seat, failing with `CourseFull` when none is left.
    pub fn reserve(&self, course: &CourseId) -> Result<u32, LedgerError> {
        let seats = self.seats(course)?;
        seats
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
            .map(|before| before - 1)
            .map_err(|_| LedgerError::CourseFull(course.clone()))
    }

    /// Gives one seat back, never exceeding the configured capacity.
    pub fn release(&self, course: &CourseId) -> Result<u32, LedgerError> {
        let seats = self.seats(course)?;
        let capacity = seats.capacity;
        match seats
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| {
                (left < capacity).then_some(left + 1)
            }) {
            Ok(before) => Ok(before + 1),
            Err(left) => {
                warn!("release on course {course} with all {capacity} seats free");
                Ok(left)
            }
        }
    }

    pub fn remaining(&self, course: &CourseId) -> Result<u32, LedgerError> {
        Ok(self.seats(course)?.remaining.load(Ordering::Acquire))
    }

    pub fn capacity(&self, course: &CourseId) -> Result<u32, LedgerError> {
        Ok(self.seats(course)?.capacity)
    }

    pub fn enrolled(&self, course: &CourseId) -> Result<u32, LedgerError> {
        let seats = self.seats(course)?;
        Ok(seats.capacity - seats.remaining.load(Ordering::Acquire))
    }
}
