pub mod astro;
pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod jobs;
pub mod models;
pub mod notify;
pub mod routes;
pub mod tabulation;
pub mod templates_structs;
