pub mod api;
pub mod config;
pub mod core;
pub mod import;
pub mod store;
