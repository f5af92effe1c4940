pub mod client;
pub mod commands;
pub mod config;
pub mod data;
pub mod error;
pub mod history;
pub mod models;
pub mod openai;
pub mod relay;
pub mod response;
pub mod server;
