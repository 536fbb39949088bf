//! Generation tasks and their persistence.

mod repository;
mod types;

pub use repository::TaskRepository;
pub use types::*;
