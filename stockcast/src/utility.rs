pub mod apis;
pub mod config;
pub mod errors;
pub mod policy;
pub mod types;
