//! Discord adapter - serenity gateway client and REST calls

pub mod convert;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{
    Cache, ChannelId, ChannelType, Client, ConnectionStage, CreateChannel, CreateMessage,
    EditMessage, EventHandler, GatewayIntents, GetMessages, GuildChannel, GuildId, Http,
    MessageId, MessageUpdateEvent, Reaction, ReactionType, Ready, ResumedEvent,
    ShardStageUpdateEvent, UnavailableGuild, UserId,
};
use serenity::client::Context as SerenityContext;

use crate::application::errors::BotError;
use crate::application::messaging::{Context, Event, EventDispatcher};
use crate::domain::entities::{Channel, Embed, Guild, Message, NewChannel, Snowflake, User};
use crate::domain::traits::ChatPlatform;

/// Gateway intents the bot needs; message content is privileged
pub fn intents(message_content: bool) -> GatewayIntents {
    let mut intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS;
    if message_content {
        intents |= GatewayIntents::MESSAGE_CONTENT;
    }
    intents
}

/// `ChatPlatform` backed by serenity's cache and HTTP client
#[derive(Clone)]
pub struct DiscordPlatform {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }

    /// Finds a cached guild channel by walking the cached guilds
    fn cached_channel(&self, channel_id: Snowflake) -> Option<Channel> {
        let id = ChannelId::new(channel_id);
        self.cache.guilds().into_iter().find_map(|guild_id| {
            let guild = self.cache.guild(guild_id)?;
            guild.channels.get(&id).map(convert::channel)
        })
    }

    fn guild_of(&self, channel_id: Snowflake) -> Option<Snowflake> {
        self.cached_channel(channel_id).and_then(|c| c.guild_id)
    }
}

fn reaction(emoji: &str) -> ReactionType {
    ReactionType::Unicode(emoji.to_string())
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    fn current_user(&self) -> User {
        convert::user(&self.cache.current_user())
    }

    fn guilds(&self) -> Vec<Guild> {
        self.cache
            .guilds()
            .into_iter()
            .filter_map(|id| self.guild(id.get()))
            .collect()
    }

    fn guild(&self, id: Snowflake) -> Option<Guild> {
        self.cache.guild(GuildId::new(id)).map(|g| convert::guild(&g))
    }

    fn guild_channels(&self, guild_id: Snowflake) -> Vec<Channel> {
        self.cache
            .guild(GuildId::new(guild_id))
            .map(|g| g.channels.values().map(convert::channel).collect())
            .unwrap_or_default()
    }

    fn channel(&self, id: Snowflake) -> Option<Channel> {
        self.cached_channel(id)
    }

    fn user(&self, id: Snowflake) -> Option<User> {
        self.cache.user(UserId::new(id)).map(|u| convert::user(&u))
    }

    async fn gateway_url(&self) -> Result<String, BotError> {
        Ok(self.http.get_bot_gateway().await?.url)
    }

    async fn application_id(&self) -> Result<Snowflake, BotError> {
        Ok(self.http.get_current_application_info().await?.id.get())
    }

    async fn fetch_message(&self, channel_id: Snowflake, message_id: Snowflake) -> Result<Message, BotError> {
        let m = ChannelId::new(channel_id)
            .message(self.http.as_ref(), MessageId::new(message_id))
            .await?;
        Ok(convert::message(&m, self.guild_of(channel_id)))
    }

    async fn channel_history(&self, channel_id: Snowflake, limit: u8, oldest_first: bool) -> Result<Vec<Message>, BotError> {
        let mut request = GetMessages::new().limit(limit);
        if oldest_first {
            request = request.after(MessageId::new(1));
        }
        let mut messages = ChannelId::new(channel_id)
            .messages(self.http.as_ref(), request)
            .await?;

        // Discord returns newest first whichever end is asked for.
        if oldest_first {
            messages.sort_by_key(|m| m.id);
        }
        let guild_id = self.guild_of(channel_id);
        Ok(messages.iter().map(|m| convert::message(m, guild_id)).collect())
    }

    async fn reaction_users(&self, channel_id: Snowflake, message_id: Snowflake, emoji: &str, limit: u8) -> Result<Vec<User>, BotError> {
        let users = ChannelId::new(channel_id)
            .reaction_users(self.http.as_ref(), MessageId::new(message_id), reaction(emoji), Some(limit), None::<UserId>)
            .await?;
        Ok(users.iter().map(convert::user).collect())
    }

    async fn create_text_channel(&self, guild_id: Snowflake, new_channel: NewChannel) -> Result<Channel, BotError> {
        let mut builder = CreateChannel::new(new_channel.name)
            .kind(ChannelType::Text)
            .topic(new_channel.topic)
            .position(new_channel.position)
            .audit_log_reason(&new_channel.reason);
        if let Some(parent) = new_channel.parent_id {
            builder = builder.category(ChannelId::new(parent));
        }
        let created: GuildChannel = GuildId::new(guild_id)
            .create_channel(self.http.as_ref(), builder)
            .await?;
        Ok(convert::channel(&created))
    }

    async fn delete_channel(&self, channel_id: Snowflake) -> Result<(), BotError> {
        ChannelId::new(channel_id).delete(self.http.as_ref()).await?;
        Ok(())
    }

    async fn send_message(&self, channel_id: Snowflake, content: &str, embed: Option<&Embed>) -> Result<Message, BotError> {
        let mut builder = CreateMessage::new();
        if !content.is_empty() {
            builder = builder.content(content);
        }
        if let Some(e) = embed {
            builder = builder.embed(convert::create_embed(e));
        }
        let m = ChannelId::new(channel_id)
            .send_message(self.http.as_ref(), builder)
            .await?;
        Ok(convert::message(&m, self.guild_of(channel_id)))
    }

    async fn edit_message(&self, channel_id: Snowflake, message_id: Snowflake, content: &str, embed: Option<&Embed>) -> Result<Message, BotError> {
        let builder = EditMessage::new()
            .content(content)
            .embeds(embed.map(convert::create_embed).into_iter().collect());
        let m = ChannelId::new(channel_id)
            .edit_message(self.http.as_ref(), MessageId::new(message_id), builder)
            .await?;
        Ok(convert::message(&m, self.guild_of(channel_id)))
    }

    async fn add_reaction(&self, channel_id: Snowflake, message_id: Snowflake, emoji: &str) -> Result<(), BotError> {
        ChannelId::new(channel_id)
            .create_reaction(self.http.as_ref(), MessageId::new(message_id), reaction(emoji))
            .await?;
        Ok(())
    }

    async fn remove_own_reaction(&self, channel_id: Snowflake, message_id: Snowflake, emoji: &str) -> Result<(), BotError> {
        ChannelId::new(channel_id)
            .delete_reaction(self.http.as_ref(), MessageId::new(message_id), None, reaction(emoji))
            .await?;
        Ok(())
    }
}

/// Decides when a gateway session counts as ready.
///
/// Guild names are only known once serenity has cached every guild, so with
/// guilds to wait for readiness follows the cache. A bot in no guilds gets no
/// cache signal at all, and the cache signal repeats on every later guild
/// join, so it is honoured once per session.
#[derive(Debug, Default)]
pub struct ReadyGate {
    awaiting_cache: AtomicBool,
}

impl ReadyGate {
    /// Session start; true if the bot is ready right away
    pub fn on_ready(&self, guild_count: usize) -> bool {
        let waiting = guild_count > 0;
        self.awaiting_cache.store(waiting, Ordering::SeqCst);
        !waiting
    }

    /// Cache filled; true only for the first signal after `on_ready`
    pub fn on_cache_ready(&self) -> bool {
        self.awaiting_cache.swap(false, Ordering::SeqCst)
    }
}

/// Bridges serenity's callbacks onto the event dispatcher
struct Handler {
    dispatcher: Arc<EventDispatcher>,
    ready: ReadyGate,
}

impl Handler {
    async fn dispatch(&self, ctx: &SerenityContext, event: Event) {
        let context = Context::new(Arc::new(Self::platform(ctx)));
        self.dispatcher.dispatch(&context, event).await;
    }

    fn platform(ctx: &SerenityContext) -> DiscordPlatform {
        DiscordPlatform::new(Arc::clone(&ctx.http), Arc::clone(&ctx.cache))
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn shard_stage_update(&self, ctx: SerenityContext, event: ShardStageUpdateEvent) {
        match event.new {
            ConnectionStage::Connected => {
                let gateway = match Self::platform(&ctx).gateway_url().await {
                    Ok(url) => url,
                    Err(e) => {
                        tracing::warn!(target: "bot", "Gateway URL lookup failed: {}", e);
                        "(unknown gateway)".to_string()
                    }
                };
                self.dispatch(&ctx, Event::Connect { gateway }).await;
            }
            ConnectionStage::Disconnected => self.dispatch(&ctx, Event::Disconnect).await,
            _ => {}
        }
    }

    async fn ready(&self, ctx: SerenityContext, ready: Ready) {
        tracing::debug!(target: "bot", "Gateway ready as {} ({} guilds pending)", ready.user.name, ready.guilds.len());
        if self.ready.on_ready(ready.guilds.len()) {
            self.dispatch(&ctx, Event::Ready).await;
        }
    }

    async fn cache_ready(&self, ctx: SerenityContext, _guilds: Vec<GuildId>) {
        if self.ready.on_cache_ready() {
            self.dispatch(&ctx, Event::Ready).await;
        }
    }

    async fn resume(&self, ctx: SerenityContext, _: ResumedEvent) {
        self.dispatch(&ctx, Event::Resumed).await;
    }

    async fn guild_create(&self, ctx: SerenityContext, guild: serenity::all::Guild, is_new: Option<bool>) {
        let g = convert::guild(&guild);
        let event = if is_new == Some(true) { Event::GuildJoin(g) } else { Event::GuildAvailable(g) };
        self.dispatch(&ctx, event).await;
    }

    async fn guild_delete(&self, ctx: SerenityContext, incomplete: UnavailableGuild, full: Option<serenity::all::Guild>) {
        let event = match (incomplete.unavailable, full) {
            (true, _) => Event::GuildUnavailable(incomplete.id.get()),
            (false, Some(g)) => Event::GuildRemove(convert::guild(&g)),
            (false, None) => Event::GuildRemove(Guild::new(incomplete.id.get(), incomplete.id.to_string())),
        };
        self.dispatch(&ctx, event).await;
    }

    async fn message(&self, ctx: SerenityContext, new_message: serenity::all::Message) {
        let event = Event::Message(convert::message(&new_message, None));
        self.dispatch(&ctx, event).await;
    }

    async fn message_delete(&self, ctx: SerenityContext, channel_id: ChannelId, deleted_message_id: MessageId, guild_id: Option<GuildId>) {
        let event = Event::MessageDelete {
            guild_id: guild_id.map(|g| g.get()),
            channel_id: channel_id.get(),
            message_id: deleted_message_id.get(),
        };
        self.dispatch(&ctx, event).await;
    }

    async fn message_delete_bulk(&self, ctx: SerenityContext, channel_id: ChannelId, multiple_deleted_messages_ids: Vec<MessageId>, guild_id: Option<GuildId>) {
        let event = Event::BulkMessageDelete {
            guild_id: guild_id.map(|g| g.get()),
            channel_id: channel_id.get(),
            message_ids: multiple_deleted_messages_ids.iter().map(|m| m.get()).collect(),
        };
        self.dispatch(&ctx, event).await;
    }

    async fn message_update(&self, ctx: SerenityContext, old_if_available: Option<serenity::all::Message>, new: Option<serenity::all::Message>, event: MessageUpdateEvent) {
        let guild_id = event.guild_id.map(|g| g.get());
        let event = Event::MessageEdit {
            guild_id,
            channel_id: event.channel_id.get(),
            message_id: event.id.get(),
            before: old_if_available.as_ref().map(|m| convert::message(m, guild_id)),
            after: new.as_ref().map(|m| convert::message(m, guild_id)),
        };
        self.dispatch(&ctx, event).await;
    }

    async fn reaction_add(&self, ctx: SerenityContext, add_reaction: Reaction) {
        self.dispatch(&ctx, Event::ReactionAdd(convert::reaction_event(&add_reaction))).await;
    }

    async fn reaction_remove(&self, ctx: SerenityContext, removed_reaction: Reaction) {
        self.dispatch(&ctx, Event::ReactionRemove(convert::reaction_event(&removed_reaction))).await;
    }

    async fn reaction_remove_all(&self, ctx: SerenityContext, channel_id: ChannelId, removed_from_message_id: MessageId) {
        let guild_id = Self::platform(&ctx).guild_of(channel_id.get());
        let event = Event::ReactionClear {
            guild_id,
            channel_id: channel_id.get(),
            message_id: removed_from_message_id.get(),
        };
        self.dispatch(&ctx, event).await;
    }

    async fn reaction_remove_emoji(&self, ctx: SerenityContext, removed_reactions: Reaction) {
        self.dispatch(&ctx, Event::ReactionClearEmoji(convert::reaction_event(&removed_reactions))).await;
    }

    async fn channel_create(&self, ctx: SerenityContext, channel: GuildChannel) {
        self.dispatch(&ctx, Event::ChannelCreate(convert::channel(&channel))).await;
    }

    async fn channel_update(&self, ctx: SerenityContext, old: Option<GuildChannel>, new: GuildChannel) {
        let event = Event::ChannelUpdate {
            before: old.as_ref().map(convert::channel),
            after: convert::channel(&new),
        };
        self.dispatch(&ctx, event).await;
    }

    async fn channel_delete(&self, ctx: SerenityContext, channel: GuildChannel, _messages: Option<Vec<serenity::all::Message>>) {
        self.dispatch(&ctx, Event::ChannelDelete(convert::channel(&channel))).await;
    }
}

/// Connects to Discord and delivers events until the connection ends
pub async fn run(token: &str, intents: GatewayIntents, dispatcher: EventDispatcher) -> Result<(), BotError> {
    let handler = Handler {
        dispatcher: Arc::new(dispatcher),
        ready: ReadyGate::default(),
    };
    let mut client = Client::builder(token, intents)
        .event_handler(handler)
        .await?;

    tracing::debug!(target: "bot", "Starting gateway client");
    client.start().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intents() {
        let with_content = intents(true);
        assert!(with_content.contains(GatewayIntents::MESSAGE_CONTENT));
        assert!(with_content.contains(GatewayIntents::GUILD_MESSAGE_REACTIONS));
        assert!(!intents(false).contains(GatewayIntents::MESSAGE_CONTENT));
    }

    #[test]
    fn test_ready_without_guilds_is_immediate() {
        let gate = ReadyGate::default();
        assert!(gate.on_ready(0));
        assert!(!gate.on_cache_ready());
    }

    #[test]
    fn test_ready_waits_for_cache_once() {
        let gate = ReadyGate::default();
        assert!(!gate.on_ready(3));
        assert!(gate.on_cache_ready());

        // Later guild joins refill the cache; not a new session.
        assert!(!gate.on_cache_ready());
        assert!(!gate.on_cache_ready());

        // Reconnect with a fresh session.
        assert!(!gate.on_ready(3));
        assert!(gate.on_cache_ready());
    }
}
