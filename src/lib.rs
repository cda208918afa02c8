pub mod apps;
pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod exit;
pub mod logging;
pub mod platform;
pub mod rules;
pub mod scan;
pub mod store;
pub mod tree;
pub mod ui;
