//! Testing utilities for the sharedptr crate

#![warn(missing_docs)]

mod drop_counter;
mod logging;
mod storage;

pub use drop_counter::{DropCounter, Tracked};
pub use logging::init_logging;
pub use storage::{CountingStorage, FailingStorage};
