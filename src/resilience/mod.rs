pub mod outcome;
pub mod retry;

pub use outcome::{CallOutcome, FailureReason};
pub use retry::ResilientCaller;
