//! Application layer - Use cases and business logic
//! 
//! This layer contains:
//! - Services: Listeners that implement the bot's behavior
//! - Errors: Domain-specific errors
//! - Messaging: Event dispatching and per-key serialization
//! - Format: Log-friendly descriptions of chat objects

pub mod errors;
pub mod format;
pub mod messaging;
pub mod services;
