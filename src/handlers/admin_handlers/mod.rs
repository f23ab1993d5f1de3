pub mod calls;
pub mod clash;
pub mod decisions;
pub mod messages;
pub mod reviewers;
pub mod setup;
pub mod tabulation;
