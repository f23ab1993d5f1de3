pub mod affiliation;
pub mod attachment;
pub mod calculation;
pub mod call;
pub mod decision;
pub mod member;
pub mod message;
pub mod moc;
pub mod permission;
pub mod person;
pub mod prev_proposal;
pub mod proposal;
pub mod queue;
pub mod review;
pub mod semester;
pub mod target;
pub mod text;
