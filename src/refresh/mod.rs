pub mod single_flight;

pub use single_flight::{RefreshError, RefreshResult, SingleFlightRefresher};
