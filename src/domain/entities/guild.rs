use super::Snowflake;

/// A guild (server) the bot has joined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
}

impl Guild {
    pub fn new(id: Snowflake, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

/// Kind of channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
    Private,
    Other,
}

/// A guild channel or a private (DM) channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub name: String,
    pub kind: ChannelKind,
    pub topic: Option<String>,
    pub parent_id: Option<Snowflake>,
    pub position: u16,
    /// Other party of a private channel
    pub recipient: Option<String>,
}

impl Channel {
    pub fn text(id: Snowflake, guild_id: Snowflake, name: impl Into<String>) -> Self {
        Self {
            id,
            guild_id: Some(guild_id),
            name: name.into(),
            kind: ChannelKind::Text,
            topic: None,
            parent_id: None,
            position: 0,
            recipient: None,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_parent(mut self, parent_id: Snowflake) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_position(mut self, position: u16) -> Self {
        self.position = position;
        self
    }

    pub fn is_text(&self) -> bool {
        self.kind == ChannelKind::Text
    }

    /// `<#id>` mention markup
    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }
}

/// Parameters for creating a text channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChannel {
    pub name: String,
    pub topic: String,
    pub parent_id: Option<Snowflake>,
    pub position: u16,
    pub reason: String,
}
