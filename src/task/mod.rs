//! Task data model and the result store.

pub mod store;
pub mod types;

pub use store::ResultStore;
pub use types::{Task, TaskResult, TaskStatus};
