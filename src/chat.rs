pub mod client;
pub mod context;
pub mod engine;
pub mod prompt;
