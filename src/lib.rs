pub mod config;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod models;
pub mod search;
