//! In-memory course catalog.
//!
//! Courses get auto-incremented numeric identities and are registered with
//! the capacity ledger on creation, so they become bookable immediately.
//! Bookings recovered from durable storage count against the seats of the
//! course that takes their identity.

use crate::data::{Course, CourseId, TeacherId};
use crate::error::CatalogError;
use crate::ledger::CapacityLedger;
use log::info;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    capacity: u32,
    teacher: Option<TeacherId>,
}

#[derive(Debug, Default)]
struct Table {
    next_id: u64,
    courses: BTreeMap<CourseId, Entry>,
}

pub struct CourseCatalog {
    table: RwLock<Table>,
    ledger: Arc<CapacityLedger>,
    /// Durable booking counts per course identity, read at startup.
    recovered: HashMap<CourseId, u32>,
}

impl CourseCatalog {
    pub fn new(ledger: Arc<CapacityLedger>) -> Self {
        Self::with_recovered(ledger, HashMap::new())
    }

    pub fn with_recovered(ledger: Arc<CapacityLedger>, recovered: HashMap<CourseId, u32>) -> Self {
        Self {
            table: RwLock::new(Table {
                next_id: 1,
                courses: BTreeMap::new(),
            }),
            ledger,
            recovered,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Table> {
        match self.table.read() {
            Ok(t) => t,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Table> {
        match self.table.write() {
            Ok(t) => t,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn create_course(&self, name: &str, capacity: u32) -> Result<CourseId, CatalogError> {
        if name.trim().is_empty() {
            return Err(CatalogError::EmptyName);
        }
        let mut table = self.write();
        let id = CourseId::new(table.next_id.to_string());
        table.next_id += 1;
        table.courses.insert(
            id.clone(),
            Entry {
                name: name.to_string(),
                capacity,
                teacher: None,
            },
        );
        let enrolled = self.recovered.get(&id).copied().unwrap_or(0);
        self.ledger.register(id.clone(), capacity, enrolled);
        info!("Created course {id} '{name}' with {capacity} seats, {enrolled} already booked");
        Ok(id)
    }

    pub fn get_course(&self, id: &CourseId) -> Result<Course, CatalogError> {
        let table = self.read();
        let entry = table
            .courses
            .get(id)
            .ok_or_else(|| CatalogError::CourseNotExisted(id.clone()))?;
        Ok(self.view(id, entry))
    }

    /// A course is bound to at most one teacher; a teacher may hold many.
    pub fn bind_course(&self, id: &CourseId, teacher: &TeacherId) -> Result<(), CatalogError> {
        let mut table = self.write();
        let entry = table
            .courses
            .get_mut(id)
            .ok_or_else(|| CatalogError::CourseNotExisted(id.clone()))?;
        if let Some(bound) = &entry.teacher {
            return Err(CatalogError::CourseHasBound {
                course: id.clone(),
                teacher: bound.clone(),
            });
        }
        entry.teacher = Some(teacher.clone());
        info!("Bound course {id} to teacher {teacher}");
        Ok(())
    }

    pub fn unbind_course(&self, id: &CourseId, teacher: &TeacherId) -> Result<(), CatalogError> {
        let mut table = self.write();
        let entry = table
            .courses
            .get_mut(id)
            .ok_or_else(|| CatalogError::CourseNotExisted(id.clone()))?;
        if entry.teacher.as_ref() != Some(teacher) {
            return Err(CatalogError::CourseNotBind {
                course: id.clone(),
                teacher: teacher.clone(),
            });
        }
        entry.teacher = None;
        info!("Unbound course {id} from teacher {teacher}");
        Ok(())
    }

    pub fn teacher_courses(&self, teacher: &TeacherId) -> Vec<Course> {
        let table = self.read();
        table
            .courses
            .iter()
            .filter(|(_, e)| e.teacher.as_ref() == Some(teacher))
            .map(|(id, e)| self.view(id, e))
            .collect()
    }

    /// Current view of every course, ascending by identity.
    pub fn snapshot(&self) -> Vec<Course> {
        let table = self.read();
        table
            .courses
            .iter()
            .map(|(id, e)| self.view(id, e))
            .collect()
    }

    fn view(&self, id: &CourseId, entry: &Entry) -> Course {
        Course {
            id: id.clone(),
            name: entry.name.clone(),
            capacity: entry.capacity,
            teacher: entry.teacher.clone(),
            enrolled: self.ledger.enrolled(id).unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> CourseCatalog {
        CourseCatalog::new(Arc::new(CapacityLedger::new()))
    }

    #[test]
    fn created_courses_are_bookable() {
        let catalog = catalog();
        let id = catalog.create_course("Compilers", 3).unwrap();

        assert_eq!(id, CourseId::from("1"));
        assert_eq!(catalog.ledger.remaining(&id), Ok(3));
        let course = catalog.get_course(&id).unwrap();
        assert_eq!(course.name, "Compilers");
        assert_eq!(course.enrolled, 0);
    }

    #[test]
    fn recovered_bookings_take_seats() {
        let ledger = Arc::new(CapacityLedger::new());
        let catalog = CourseCatalog::with_recovered(
            Arc::clone(&ledger),
            HashMap::from([(CourseId::from("1"), 2)]),
        );

        let first = catalog.create_course("Logic", 3).unwrap();
        let second = catalog.create_course("Graphics", 3).unwrap();
        assert_eq!(ledger.remaining(&first), Ok(1));
        assert_eq!(ledger.remaining(&second), Ok(3));
        assert_eq!(catalog.get_course(&first).unwrap().enrolled, 2);
    }

    #[test]
    fn empty_name_is_rejected() {
        assert_eq!(catalog().create_course("  ", 1), Err(CatalogError::EmptyName));
    }

    #[test]
    fn bind_and_unbind() {
        let catalog = catalog();
        let id = catalog.create_course("Networks", 10).unwrap();
        let t1 = TeacherId::from("t1");
        let t2 = TeacherId::from("t2");

        catalog.bind_course(&id, &t1).unwrap();
        assert!(matches!(
            catalog.bind_course(&id, &t2),
            Err(CatalogError::CourseHasBound { .. })
        ));
        assert!(matches!(
            catalog.unbind_course(&id, &t2),
            Err(CatalogError::CourseNotBind { .. })
        ));
        assert_eq!(catalog.teacher_courses(&t1).len(), 1);

        catalog.unbind_course(&id, &t1).unwrap();
        assert!(catalog.teacher_courses(&t1).is_empty());
    }

    #[test]
    fn snapshot_is_ordered_numerically() {
        let catalog = catalog();
        for i in 0..12 {
            catalog.create_course(&format!("c{i}"), 1).unwrap();
        }
        let ids: Vec<String> = catalog.snapshot().into_iter().map(|c| c.id.0).collect();
        assert_eq!(ids.first().map(String::as_str), Some("1"));
        assert_eq!(ids.last().map(String::as_str), Some("12"));
    }
}
