pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod languages;
pub mod runner;
pub mod server;
