pub mod action;
pub mod base;
pub mod delete;
pub mod execute;
pub mod resolve;
pub mod results;
pub mod solver;
pub mod types;

#[cfg(test)]
mod tests;

pub use action::*;
pub use base::*;
pub use delete::*;
pub use execute::*;
pub use resolve::*;
pub use results::*;
pub use solver::*;
pub use types::*;
