mod grid;
mod queries;
mod types;

pub use grid::*;
pub use queries::*;
pub use types::*;
