pub mod access;
pub mod attachments;
pub mod crud;
pub mod extras;
pub mod members;
pub mod targets;
pub mod text;
pub mod workflow;
