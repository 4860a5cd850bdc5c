pub mod dispatcher;

pub use dispatcher::{DispatchError, SlotResult, StationCommandDispatcher, FIRST_SLOT, LAST_SLOT};
