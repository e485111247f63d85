pub mod assistant;
pub mod cache;
pub mod config;
pub mod error;
pub mod market;
pub mod models;
pub mod parsing;
pub mod services;
pub mod solana;
pub mod utils;

pub use assistant::{Assistant, AssistantResponse};
