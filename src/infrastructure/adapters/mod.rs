//! Platform adapters - `ChatPlatform` implementations

pub mod discord;
pub mod memory;

pub use discord::DiscordPlatform;
pub use memory::MemoryPlatform;
