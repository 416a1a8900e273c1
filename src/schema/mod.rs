//! Schema module - Configuration, transition table and tape types.

mod config;
mod machine;
mod tape;

pub use config::*;
pub use machine::*;
pub use tape::*;
