//! Thread channels - Side channels spun off a message by a 🧵 reaction
//!
//! A thread channel is an ordinary text channel whose name starts with 🧵 and
//! whose topic points back at the origin message. Its first post (the
//! "intro") mirrors the origin message and links back to it.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::application::errors::BotError;
use crate::application::format::fobj;
use crate::domain::entities::{Channel, Embed, Message, NewChannel, Snowflake};
use crate::domain::traits::ChatPlatform;

/// Reaction that requests a thread; also the thread channel name prefix
pub const THREAD_EMOJI: &str = "🧵";

/// Longest generated channel name (not counting prefix and ellipsis)
pub const MAX_CHANNEL_NAME_LENGTH: usize = 20;

/// Number of leading thread messages tracked as the intro
pub const CACHE_INTRO_MESSAGES: usize = 2;

const TARGET: &str = "bot.thread";

/// Extracts origin channel/message IDs from a thread channel topic
static TOPIC_PARSE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^.*\[(?:id=)?(<#[0-9]+>|[0-9a-f]+)/([0-9a-f]+)\]").expect("valid topic regex")
});

/// Runs of characters not allowed in generated channel names
static CHANNEL_CLEANUP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([^\p{L}\p{M}\p{N}\p{Sk}\p{So}\p{Cf}]|https?://(www\.?))+")
        .expect("valid cleanup regex")
});

/// Topic recorded on a new thread channel
pub fn thread_topic(starter_id: Snowflake, channel_id: Snowflake, message_id: Snowflake) -> String {
    format!(
        "Thread started by <@{}> for [<#{}>/{:x}].",
        starter_id, channel_id, message_id
    )
}

/// Parses `(origin channel, origin message)` out of a thread channel topic
pub fn parse_topic(topic: &str) -> Option<(Snowflake, Snowflake)> {
    let caps = TOPIC_PARSE_REGEX.captures(topic)?;
    let cref = caps.get(1)?.as_str();
    let channel_id = match cref.strip_prefix("<#").and_then(|r| r.strip_suffix('>')) {
        Some(decimal) => decimal.parse().ok()?,
        None => u64::from_str_radix(cref, 16).ok()?,
    };
    let message_id = u64::from_str_radix(caps.get(2)?.as_str(), 16).ok()?;
    Some((channel_id, message_id))
}

/// Squashes message text into a short dash-separated channel name.
///
/// Words are added while they fit; a word that does not fit is chopped only
/// when the name would otherwise be very short. `…` marks truncation.
pub fn channel_name_mash(text: &str) -> String {
    let cleaned = CHANNEL_CLEANUP_REGEX.replace_all(text, " ");
    let mut mash = String::new();
    let mut mash_len = 0;

    for word in cleaned.split_whitespace() {
        let to_add = if mash.is_empty() { word.to_string() } else { format!("-{}", word) };
        let add_len = to_add.chars().count();
        if mash_len + add_len <= MAX_CHANNEL_NAME_LENGTH {
            mash.push_str(&to_add);
            mash_len += add_len;
            continue;
        }
        if mash_len < MAX_CHANNEL_NAME_LENGTH / 2 {
            mash.extend(to_add.chars().take(MAX_CHANNEL_NAME_LENGTH - mash_len));
        }
        mash.push('…');
        break;
    }

    mash
}

/// 🧵-prefixed channel name, with a `-N` suffix if needed to be unique
pub fn unique_channel_name(mash: &str, existing: &HashSet<String>) -> String {
    let basic = format!("{}{}", THREAD_EMOJI, if mash.is_empty() { "thread" } else { mash });
    let mut name = basic.clone();
    let mut number = 1;
    while existing.contains(&name) {
        number += 1;
        name = format!("{}-{}", basic, number);
    }
    name
}

/// Backslash-escapes Discord markdown control characters
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '~' | '`' | '|' | '>' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Intro embed mirroring the origin message
pub fn intro_embed(message: &Message, guild_id: Option<Snowflake>) -> Embed {
    let (gi, ci, mi) = (
        guild_id.map_or_else(|| "@me".to_string(), |g| g.to_string()),
        message.channel_id,
        message.id,
    );
    let mut description = format!(
        "{}\n\u{a0}\n{} [original message](https://discordapp.com/channels/{}/{}/{}) in <#{}> by <@{}>",
        message.content, THREAD_EMOJI, gi, ci, mi, ci, message.author.id
    )
    .trim()
    .to_string();

    for a in &message.attachments {
        description.push_str(&format!("\n📎 [{}]({})", escape_markdown(&a.filename), a.link()));
        if a.is_spoiler() {
            description.push_str(" (spoiler!)");
        }
    }

    for e in &message.embeds {
        if let (Some(title), Some(url)) = (&e.title, &e.url) {
            description.push_str(&format!("\n🔗 [{}]({})", escape_markdown(title), url));
        }
    }

    Embed {
        description: Some(description),
        author_name: Some(message.author.display_name().to_string()),
        author_icon_url: message.author.avatar_url.clone(),
        ..Embed::default()
    }
}

/// Tracks one thread channel: creates, updates and deletes it and its intro.
///
/// Callers must serialize calls on each instance.
#[derive(Debug, Clone)]
pub struct ThreadChannel {
    pub thread_channel: Channel,
    /// Set once the channel has been deleted by this bot
    pub thread_deleted: bool,
    pub origin_channel_id: Snowflake,
    pub origin_message_id: Snowflake,
    /// First few messages (None = not loaded yet)
    cached_intro: Option<Vec<Message>>,
}

impl ThreadChannel {
    pub fn new(channel: Channel, origin_channel_id: Snowflake, origin_message_id: Snowflake) -> Self {
        Self {
            thread_channel: channel,
            thread_deleted: false,
            origin_channel_id,
            origin_message_id,
            cached_intro: None,
        }
    }

    pub fn channel_id(&self) -> Snowflake {
        self.thread_channel.id
    }

    pub fn guild_id(&self) -> Option<Snowflake> {
        self.thread_channel.guild_id
    }

    pub fn origin_key(&self) -> (Snowflake, Snowflake) {
        (self.origin_channel_id, self.origin_message_id)
    }

    pub fn intro(&self) -> Option<&[Message]> {
        self.cached_intro.as_deref()
    }

    /// Quick check: might this message or emoji be a thread creation request?
    pub fn relevant_origin_update(message: Option<&Message>, emoji: Option<&str>) -> bool {
        emoji == Some(THREAD_EMOJI)
            || message.is_some_and(|m| {
                m.reactions.iter().any(|r| !r.me && r.emoji == THREAD_EMOJI)
            })
    }

    /// Quick check: could this message ID be part of the thread's intro?
    pub fn relevant_intro_update(&self, message_id: Snowflake) -> bool {
        match &self.cached_intro {
            None => true,
            Some(intro) => {
                intro.len() < CACHE_INTRO_MESSAGES || intro.iter().any(|m| m.id == message_id)
            }
        }
    }

    /// Recognizes a previously created thread channel.
    ///
    /// The caller should then `refresh_intro` and `refresh_origin`.
    pub fn maybe_attach(channel: &Channel) -> Option<Self> {
        if !channel.is_text() || !channel.name.starts_with(THREAD_EMOJI) {
            tracing::debug!(target: TARGET, "Nonthread: {}", fobj(None).channel(channel));
            return None;
        }

        let topic = channel.topic.as_deref().unwrap_or("");
        let Some((ci, mi)) = parse_topic(topic) else {
            tracing::debug!(
                target: TARGET,
                "Bad topic: {}\n    \"{}\"",
                fobj(None).channel(channel),
                topic
            );
            return None;
        };

        tracing::debug!(
            target: TARGET,
            "Thread: {}\n    \"{}\"\n    origin: {}",
            fobj(None).channel(channel),
            topic,
            fobj(None).channel_id(ci).message_id(mi)
        );
        Some(Self::new(channel.clone(), ci, mi))
    }

    /// Creates a thread channel if the message has an unhandled 🧵 reaction
    pub async fn maybe_create_from_origin(
        platform: &dyn ChatPlatform,
        channel_id: Snowflake,
        message_id: Snowflake,
    ) -> Result<Option<Self>, BotError> {
        let p = Some(platform);
        let Some(channel) = platform.channel(channel_id) else {
            tracing::debug!(
                target: TARGET,
                "No channel for candidate:\n    {}",
                fobj(p).channel_id(channel_id).message_id(message_id)
            );
            return Ok(None);
        };
        let Some(guild_id) = channel.guild_id else {
            tracing::debug!(target: TARGET, "Skipping private candidate:\n    {}", fobj(p).channel(&channel));
            return Ok(None);
        };

        let message = match platform.fetch_message(channel_id, message_id).await {
            Ok(message) => message,
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    target: TARGET,
                    "Fetch failed for candidate (NotFound):\n    {}",
                    fobj(p).channel(&channel).message_id(message_id)
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if message.author.id == platform.current_user().id {
            tracing::debug!(
                target: TARGET,
                "Skipping candidate authored by this bot:\n    {}",
                fobj(p).message(&message)
            );
            return Ok(None);
        }

        // Creation needs a 🧵 from someone, without pile-on from this bot.
        let users = match message.reaction(THREAD_EMOJI) {
            Some(rx) if !rx.me => {
                platform.reaction_users(channel_id, message_id, THREAD_EMOJI, 1).await?
            }
            _ => Vec::new(),
        };
        let Some(starter) = users.into_iter().next() else {
            tracing::debug!(
                target: TARGET,
                "No unhandled {} for candidate:\n    {}",
                THREAD_EMOJI,
                fobj(p).message(&message)
            );
            return Ok(None);
        };

        let existing: HashSet<String> = platform
            .guild_channels(guild_id)
            .into_iter()
            .map(|c| c.name)
            .collect();
        let name = unique_channel_name(&channel_name_mash(&message.content), &existing);
        let topic = thread_topic(starter.id, channel_id, message_id);
        tracing::info!(
            target: TARGET,
            "Creating channel:\n    {} #{}\n    topic \"{}\"\n    origin {}",
            fobj(p).guild_id(guild_id),
            name,
            topic,
            fobj(p).message(&message)
        );

        let new_channel = NewChannel {
            name,
            topic,
            parent_id: channel.parent_id,
            position: u16::try_from(existing.len()).unwrap_or(u16::MAX),
            reason: "Thread creation".to_string(),
        };
        let thread_channel = platform.create_text_channel(guild_id, new_channel).await?;

        // Pile on to the 🧵 so the thread is not created again.
        platform.add_reaction(channel_id, message_id, THREAD_EMOJI).await?;

        let mut thread = Self::new(thread_channel, channel_id, message_id);
        thread.cached_intro = Some(Vec::new());
        thread.origin_updated(platform, Some(message)).await?;
        Ok(Some(thread))
    }

    /// Re-fetches the first few thread messages
    pub async fn refresh_intro(&mut self, platform: &dyn ChatPlatform) -> Result<(), BotError> {
        let old_len = self.cached_intro.as_ref().map_or(0, Vec::len);
        let intro = platform
            .channel_history(self.thread_channel.id, CACHE_INTRO_MESSAGES as u8, true)
            .await?;

        if tracing::enabled!(target: TARGET, tracing::Level::DEBUG) {
            let lines: String = intro
                .iter()
                .map(|m| format!("\n    {}", fobj(Some(platform)).message(m)))
                .collect();
            tracing::debug!(
                target: TARGET,
                "Fetched #{} intro ({} => {}m):{}",
                self.thread_channel.name,
                old_len,
                intro.len(),
                lines
            );
        }

        let new_len = intro.len();
        self.cached_intro = Some(intro);

        // Intro posts from others keep the channel alive without a 🧵; if
        // they went away, the origin decides whether the thread survives.
        if new_len < old_len {
            self.refresh_origin(platform).await?;
        }
        Ok(())
    }

    /// Re-fetches the origin message and updates the thread to match
    pub async fn refresh_origin(&mut self, platform: &dyn ChatPlatform) -> Result<(), BotError> {
        let p = Some(platform);
        let message = match platform.channel(self.origin_channel_id) {
            None => {
                tracing::debug!(
                    target: TARGET,
                    "No channel for refresh:\n    {}",
                    fobj(p).channel_id(self.origin_channel_id).message_id(self.origin_message_id)
                );
                None
            }
            Some(channel) => {
                match platform.fetch_message(channel.id, self.origin_message_id).await {
                    Ok(message) => Some(message),
                    Err(e) if e.is_not_found() => {
                        tracing::debug!(
                            target: TARGET,
                            "Fetch failed for refresh (NotFound):\n    {}",
                            fobj(p).channel(&channel).message_id(self.origin_message_id)
                        );
                        None
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        self.origin_updated(platform, message).await
    }

    /// True if anyone but the bot posted in the cached intro
    fn has_foreign_posts(&self, me: Snowflake) -> bool {
        self.cached_intro
            .as_ref()
            .is_some_and(|intro| intro.iter().any(|m| m.author.id != me))
    }

    /// Applies new origin state (`None` if the origin was deleted)
    async fn origin_updated(
        &mut self,
        platform: &dyn ChatPlatform,
        message: Option<Message>,
    ) -> Result<(), BotError> {
        let p = Some(platform);
        let me = platform.current_user().id;
        let loaded = self.cached_intro.is_some();

        let Some(message) = message else {
            if loaded && !self.has_foreign_posts(me) {
                tracing::info!(
                    target: TARGET,
                    "Deleting channel (origin gone):\n    {}",
                    fobj(p).channel(&self.thread_channel)
                );
                platform.delete_channel(self.thread_channel.id).await?;
                self.thread_deleted = true;
                return Ok(());
            }

            // The thread has content of its own; keep it, but say so.
            let content = format!(
                "{} original message in <#{}> was **deleted**",
                THREAD_EMOJI, self.origin_channel_id
            );
            return self.post_intro(platform, &content, None).await;
        };

        let rx = message.reaction(THREAD_EMOJI);
        tracing::debug!(
            target: TARGET,
            "Refetched origin:\n    thread: {}\n    origin: {}\n    reaction: {}",
            fobj(p).channel(&self.thread_channel),
            fobj(p).message(&message),
            rx.map_or_else(
                || "None".to_string(),
                |r| format!("x{}{}", r.count, if r.me { " w/me" } else { "" })
            )
        );

        if rx.map_or(0, |r| r.others()) == 0 && loaded && !self.has_foreign_posts(me) {
            tracing::info!(
                target: TARGET,
                "Deleting channel (reactions removed):\n    {}",
                fobj(p).channel(&self.thread_channel)
            );
            platform.delete_channel(self.thread_channel.id).await?;
            if rx.is_some_and(|r| r.me) {
                platform
                    .remove_own_reaction(message.channel_id, message.id, THREAD_EMOJI)
                    .await?;
            }
            self.thread_deleted = true;
            return Ok(());
        }

        if loaded {
            let guild_id = message.guild_id.or(self.thread_channel.guild_id);
            let embed = intro_embed(&message, guild_id);
            self.post_intro(platform, "", Some(embed)).await?;
        }
        Ok(())
    }

    /// Adds or edits the thread's intro message
    async fn post_intro(
        &mut self,
        platform: &dyn ChatPlatform,
        content: &str,
        embed: Option<Embed>,
    ) -> Result<(), BotError> {
        let p = Some(platform);
        let me = platform.current_user().id;
        let channel_id = self.thread_channel.id;
        let Some(intro) = self.cached_intro.as_mut() else {
            return Ok(());
        };

        match intro.iter().position(|m| m.author.id == me) {
            None if intro.len() >= CACHE_INTRO_MESSAGES => {
                tracing::error!(
                    target: TARGET,
                    "Another user sniped the first post!\n    {}",
                    fobj(p).message(&intro[0])
                );
            }
            None => {
                let posted = platform.send_message(channel_id, content, embed.as_ref()).await?;
                tracing::info!(target: TARGET, "Posted intro:\n    {}", fobj(p).message(&posted));
                intro.push(posted);
            }
            Some(i) => {
                let old = &intro[i];
                if old.content != content || old.embeds.first() != embed.as_ref() {
                    tracing::debug!(
                        target: TARGET,
                        "Updating intro:\n    old: [{}] / {:?}\n    new: [{}] / {:?}",
                        old.content,
                        old.embeds.first(),
                        content,
                        embed
                    );
                    let edited = platform
                        .edit_message(channel_id, old.id, content, embed.as_ref())
                        .await?;
                    tracing::info!(target: TARGET, "Edited intro:\n    {}", fobj(p).message(&edited));
                    intro[i] = edited;
                }
            }
        }
        Ok(())
    }
}
