pub mod account_handlers;
pub mod admin_handlers;
pub mod auth_handlers;
pub mod dashboard;
pub mod form;
pub mod job_handlers;
pub mod lookup_handlers;
pub mod proposal_handlers;
pub mod review_handlers;
pub mod upload;
