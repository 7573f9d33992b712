//! Gateway events, as delivered to listeners

use std::fmt;

use crate::domain::entities::{Channel, Guild, Message, ReactionEvent, Snowflake};

/// Event kind, used to subscribe listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Disconnect,
    Resumed,
    Ready,
    GuildJoin,
    GuildAvailable,
    GuildRemove,
    GuildUnavailable,
    Message,
    MessageDelete,
    BulkMessageDelete,
    MessageEdit,
    ReactionAdd,
    ReactionRemove,
    ReactionClear,
    ReactionClearEmoji,
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Connect => "connect",
            EventKind::Disconnect => "disconnect",
            EventKind::Resumed => "resumed",
            EventKind::Ready => "ready",
            EventKind::GuildJoin => "guild_join",
            EventKind::GuildAvailable => "guild_available",
            EventKind::GuildRemove => "guild_remove",
            EventKind::GuildUnavailable => "guild_unavailable",
            EventKind::Message => "message",
            EventKind::MessageDelete => "message_delete",
            EventKind::BulkMessageDelete => "bulk_message_delete",
            EventKind::MessageEdit => "message_edit",
            EventKind::ReactionAdd => "reaction_add",
            EventKind::ReactionRemove => "reaction_remove",
            EventKind::ReactionClear => "reaction_clear",
            EventKind::ReactionClearEmoji => "reaction_clear_emoji",
            EventKind::ChannelCreate => "channel_create",
            EventKind::ChannelUpdate => "channel_update",
            EventKind::ChannelDelete => "channel_delete",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway event
#[derive(Debug, Clone)]
pub enum Event {
    Connect {
        gateway: String,
    },
    Disconnect,
    Resumed,
    /// All guilds are loaded into the cache
    Ready,
    GuildJoin(Guild),
    GuildAvailable(Guild),
    GuildRemove(Guild),
    GuildUnavailable(Snowflake),
    Message(Message),
    MessageDelete {
        guild_id: Option<Snowflake>,
        channel_id: Snowflake,
        message_id: Snowflake,
    },
    BulkMessageDelete {
        guild_id: Option<Snowflake>,
        channel_id: Snowflake,
        message_ids: Vec<Snowflake>,
    },
    MessageEdit {
        guild_id: Option<Snowflake>,
        channel_id: Snowflake,
        message_id: Snowflake,
        before: Option<Message>,
        after: Option<Message>,
    },
    ReactionAdd(ReactionEvent),
    ReactionRemove(ReactionEvent),
    ReactionClear {
        guild_id: Option<Snowflake>,
        channel_id: Snowflake,
        message_id: Snowflake,
    },
    ReactionClearEmoji(ReactionEvent),
    ChannelCreate(Channel),
    ChannelUpdate {
        before: Option<Channel>,
        after: Channel,
    },
    ChannelDelete(Channel),
    /// A listener failed while handling `source`
    Error {
        source: EventKind,
        error: String,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Connect { .. } => EventKind::Connect,
            Event::Disconnect => EventKind::Disconnect,
            Event::Resumed => EventKind::Resumed,
            Event::Ready => EventKind::Ready,
            Event::GuildJoin(_) => EventKind::GuildJoin,
            Event::GuildAvailable(_) => EventKind::GuildAvailable,
            Event::GuildRemove(_) => EventKind::GuildRemove,
            Event::GuildUnavailable(_) => EventKind::GuildUnavailable,
            Event::Message(_) => EventKind::Message,
            Event::MessageDelete { .. } => EventKind::MessageDelete,
            Event::BulkMessageDelete { .. } => EventKind::BulkMessageDelete,
            Event::MessageEdit { .. } => EventKind::MessageEdit,
            Event::ReactionAdd(_) => EventKind::ReactionAdd,
            Event::ReactionRemove(_) => EventKind::ReactionRemove,
            Event::ReactionClear { .. } => EventKind::ReactionClear,
            Event::ReactionClearEmoji(_) => EventKind::ReactionClearEmoji,
            Event::ChannelCreate(_) => EventKind::ChannelCreate,
            Event::ChannelUpdate { .. } => EventKind::ChannelUpdate,
            Event::ChannelDelete(_) => EventKind::ChannelDelete,
            Event::Error { .. } => EventKind::Error,
        }
    }
}
