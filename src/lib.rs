pub mod config;
pub mod database;
pub mod engine;
pub mod history;
pub mod llm;
pub mod models;
pub mod redaction;
pub mod usage;
