use super::{Snowflake, User};

/// Emoji reaction summary on a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub emoji: String,
    pub count: u64,
    /// Whether the bot itself is one of the reacting users
    pub me: bool,
}

impl Reaction {
    /// Reactions from users other than the bot
    pub fn others(&self) -> u64 {
        self.count.saturating_sub(u64::from(self.me))
    }
}

/// File attached to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
    pub proxy_url: Option<String>,
}

impl Attachment {
    pub fn is_spoiler(&self) -> bool {
        self.filename.starts_with("SPOILER_")
    }

    /// Link to use when referencing the attachment
    pub fn link(&self) -> &str {
        self.proxy_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.url)
    }
}

/// Rich embed content, either received or to be sent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embed {
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub author_name: Option<String>,
    pub author_icon_url: Option<String>,
}

/// A message snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub author: User,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub embeds: Vec<Embed>,
    pub reactions: Vec<Reaction>,
}

impl Message {
    pub fn new(
        id: Snowflake,
        channel_id: Snowflake,
        author: User,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            channel_id,
            guild_id: None,
            author,
            content: content.into(),
            attachments: Vec::new(),
            embeds: Vec::new(),
            reactions: Vec::new(),
        }
    }

    pub fn in_guild(mut self, guild_id: Snowflake) -> Self {
        self.guild_id = Some(guild_id);
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn reaction(&self, emoji: &str) -> Option<&Reaction> {
        self.reactions.iter().find(|r| r.emoji == emoji)
    }
}

/// Reaction change notification, as delivered by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub guild_id: Option<Snowflake>,
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    pub user_id: Option<Snowflake>,
    pub emoji: String,
}
