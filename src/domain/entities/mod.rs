//! Domain entities - Platform-neutral snapshots of chat objects

pub mod guild;
pub mod message;
pub mod user;

pub use guild::{Channel, ChannelKind, Guild, NewChannel};
pub use message::{Attachment, Embed, Message, Reaction, ReactionEvent};
pub use user::User;

/// Discord-style 64-bit ID ("snowflake")
pub type Snowflake = u64;
