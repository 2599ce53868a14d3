pub mod cursor;
pub mod task;
pub mod user;

pub use cursor::RoutineKind;
pub use task::{MAX_CONTENT_LENGTH, Task, TaskStatus};
pub use user::{DEFAULT_EVENING, DEFAULT_MORNING, DEFAULT_TIMEZONE, User};
