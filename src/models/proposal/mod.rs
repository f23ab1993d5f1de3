mod queries;
mod state;
mod types;
pub mod validation;

pub use queries::*;
pub use state::*;
pub use types::*;
