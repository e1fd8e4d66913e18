//! Course registration core: teacher/course assignment and seat booking.

pub mod booking;
pub mod catalog;
pub mod config;
pub mod data;
pub mod error;
pub mod ledger;
pub mod preference;
pub mod reporter;
pub mod server;
pub mod solver;
pub mod storage;

pub use booking::BookingEngine;
pub use catalog::CourseCatalog;
pub use config::ServiceConfig;
pub use ledger::CapacityLedger;
pub use solver::{solve, AssignmentResult};
pub use storage::{BookingStore, MemoryStore};
