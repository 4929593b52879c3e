pub mod analysis;
pub mod catalog;
pub mod config;
pub mod inspector;
pub mod models;
pub mod reporter;
