pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod tools;
pub mod transcript;
pub mod weather;
