//! Application services - Listeners that implement the bot's behavior

pub mod event_logger;
pub mod thread_channel;
pub mod thread_manager;

pub use event_logger::EventLogger;
pub use thread_channel::ThreadChannel;
pub use thread_manager::ThreadManager;
