pub mod graph;
pub mod types;

pub use graph::*;
pub use types::*;
