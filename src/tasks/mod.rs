//! Owner-scoped task tracking.
//!
//! Every operation is keyed by the authenticated principal's id. A task that
//! belongs to someone else is indistinguishable from one that does not exist.

pub mod handlers;
pub mod repository;

pub use repository::{NewTask, Priority, Task, TaskRepository, UpdateTask};
