//! Table stores the sink commits resolved changes to.

mod base;
pub mod memory;

pub use base::{TableState, TableStore};
