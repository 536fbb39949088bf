//! Public display rotation of finished tasks.

mod cursor;
mod queue;
mod types;

pub use cursor::{plan_screen, ScreenCursors};
pub use queue::{CastingQueue, MAX_PAGE_SIZE};
pub use types::*;
