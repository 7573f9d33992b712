//! Formatting of chat objects for log output

use std::fmt;

use chrono::DateTime;

use crate::domain::entities::{Channel, ChannelKind, Guild, Message, Snowflake, User};
use crate::domain::traits::ChatPlatform;

/// Discord epoch (2015-01-01T00:00:00Z) in Unix milliseconds
const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

/// Longest message excerpt shown by `fobj`
const EXCERPT_CHARS: usize = 20;

/// Pretty-formats a snowflake ID as `<date/time.ms/worker/process/increment>`.
///
/// See https://discord.com/developers/docs/reference#snowflakes; zero
/// worker/process/increment fields are left empty.
pub fn fid(id: Snowflake) -> String {
    let millis = DISCORD_EPOCH_MS + (id >> 22) as i64;
    let Some(dt) = DateTime::from_timestamp_millis(millis) else {
        return format!("?{}?", id);
    };

    let part = |v: u64| if v == 0 { String::new() } else { v.to_string() };
    format!(
        "<{}/{}/{}/{}>",
        dt.format("%Y-%m-%d/%H:%M:%S%.3f"),
        part((id & 0x3E0000) >> 17),
        part((id & 0x1F000) >> 12),
        part(id & 0xFFF),
    )
}

/// Starts describing the objects involved in some action.
///
/// IDs given to the builder are resolved through `platform` when possible.
/// The result implements `Display`, e.g.
/// `"guild" #channel (user#1234): "message text"`.
pub fn fobj(platform: Option<&dyn ChatPlatform>) -> Describe<'_> {
    Describe {
        platform,
        guild: Slot::Empty,
        channel: Slot::Empty,
        user: Slot::Empty,
        message: Slot::Empty,
    }
}

#[derive(Clone)]
enum Slot<T> {
    Empty,
    Id(Snowflake),
    Known(T),
}

impl<T> Slot<T> {
    fn is_known(&self) -> bool {
        matches!(self, Slot::Known(_))
    }
}

/// Builder returned by `fobj`
#[derive(Clone)]
pub struct Describe<'a> {
    platform: Option<&'a dyn ChatPlatform>,
    guild: Slot<Guild>,
    channel: Slot<Channel>,
    user: Slot<User>,
    message: Slot<Message>,
}

impl<'a> Describe<'a> {
    pub fn guild(mut self, guild: &Guild) -> Self {
        self.guild = Slot::Known(guild.clone());
        self
    }

    pub fn guild_id(mut self, id: Snowflake) -> Self {
        self.guild = Slot::Id(id);
        self
    }

    pub fn channel(mut self, channel: &Channel) -> Self {
        self.channel = Slot::Known(channel.clone());
        self
    }

    pub fn channel_id(mut self, id: Snowflake) -> Self {
        self.channel = Slot::Id(id);
        self
    }

    pub fn user(mut self, user: &User) -> Self {
        self.user = Slot::Known(user.clone());
        self
    }

    pub fn user_id(mut self, id: Snowflake) -> Self {
        self.user = Slot::Id(id);
        self
    }

    pub fn message(mut self, message: &Message) -> Self {
        self.message = Slot::Known(message.clone());
        self
    }

    pub fn message_id(mut self, id: Snowflake) -> Self {
        self.message = Slot::Id(id);
        self
    }

    fn lookup_guild(&self, slot: Slot<Guild>) -> Slot<Guild> {
        match (slot, self.platform) {
            (Slot::Id(id), Some(p)) => p.guild(id).map_or(Slot::Id(id), Slot::Known),
            (slot, _) => slot,
        }
    }

    fn lookup_channel(&self, slot: Slot<Channel>) -> Slot<Channel> {
        match (slot, self.platform) {
            (Slot::Id(id), Some(p)) => p.channel(id).map_or(Slot::Id(id), Slot::Known),
            (slot, _) => slot,
        }
    }

    fn lookup_user(&self, slot: Slot<User>) -> Slot<User> {
        match (slot, self.platform) {
            (Slot::Id(id), Some(p)) => p.user(id).map_or(Slot::Id(id), Slot::Known),
            (slot, _) => slot,
        }
    }

    fn parts(&self) -> Vec<String> {
        let mut guild = self.lookup_guild(self.guild.clone());
        let mut channel = self.lookup_channel(self.channel.clone());
        let mut user = self.lookup_user(self.user.clone());

        // Objects carry their own context, which takes precedence.
        if let Slot::Known(m) = &self.message {
            if let Some(gid) = m.guild_id {
                guild = prefer(guild, self.lookup_guild(Slot::Id(gid)));
            }
            channel = prefer(channel, self.lookup_channel(Slot::Id(m.channel_id)));
            user = Slot::Known(m.author.clone());
        }
        if let Slot::Known(c) = &channel {
            if let Some(gid) = c.guild_id {
                guild = prefer(guild, self.lookup_guild(Slot::Id(gid)));
            }
        }

        let mut out = Vec::new();
        match guild {
            Slot::Known(g) => out.push(format!("\"{}\"", g.name)),
            Slot::Id(id) => out.push(format!("g={}", fid(id))),
            Slot::Empty => {}
        }

        match channel {
            Slot::Known(c) if c.kind == ChannelKind::Private => {
                let me = self
                    .platform
                    .map_or_else(|| "?".to_string(), |p| p.current_user().to_string());
                let recipient = c.recipient.as_deref().unwrap_or("?");
                out.push(format!("[{} => {}]", me, recipient));
            }
            Slot::Known(c) => out.push(format!("#{}", c.name)),
            Slot::Id(id) => out.push(format!("c={}", fid(id))),
            Slot::Empty => {}
        }

        match user {
            Slot::Known(u) => out.push(format!("({})", u)),
            Slot::Id(id) => out.push(format!("u={}", fid(id))),
            Slot::Empty => {}
        }

        match &self.message {
            Slot::Known(m) => {
                if let Some(last) = out.last_mut() {
                    last.push(':');
                }
                out.push(format!("\"{}\"", excerpt(&m.content)));
            }
            Slot::Id(id) => out.push(format!("m={}", fid(*id))),
            Slot::Empty => {}
        }

        out
    }
}

impl fmt::Display for Describe<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self.parts();
        if parts.is_empty() {
            f.write_str("(None)")
        } else {
            f.write_str(&parts.join(" "))
        }
    }
}

fn prefer<T>(current: Slot<T>, embedded: Slot<T>) -> Slot<T> {
    if embedded.is_known() || matches!(current, Slot::Empty) {
        embedded
    } else {
        current
    }
}

/// Whitespace-normalized, truncated message text
fn excerpt(content: &str) -> String {
    let text = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.chars().count() <= EXCERPT_CHARS {
        return text;
    }
    let cut: String = text.chars().take(EXCERPT_CHARS).collect();
    format!("{} ...", cut.trim_end())
}
