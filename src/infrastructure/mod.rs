//! Infrastructure layer - External concerns
//! 
//! This layer contains:
//! - Config: Configuration loading and token lookup
//! - Logging: Log line format and filtering
//! - Adapters: Platform integrations (Discord, in-memory)

pub mod adapters;
pub mod config;
pub mod logging;
