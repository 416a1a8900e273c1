//! Compute module - Machine execution, fitness evaluation and search.

mod driver;
pub mod evolution;
mod machine;

pub use driver::*;
pub use machine::*;
