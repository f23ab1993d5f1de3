//! Background work: PDF generation, proposal copying, and the periodic
//! attachment processor. Job progress is tracked in memory by `JobsState`.

pub mod copy;
pub mod pdf;
pub mod processor;
pub mod state;

pub use state::{JobKind, JobRecord, JobStatus, JobsState, start_job_updater};
