pub mod config;
pub mod dashboard;
pub mod engine;
