//! In-memory adapter for development/testing
//!
//! Holds a small simulated Discord: guilds, members, text channels and
//! message histories. Changes made through `ChatPlatform` or the `sim_*`
//! helpers queue the events Discord would send; `run_events` delivers them.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::application::errors::BotError;
use crate::application::messaging::{Context, Event, EventDispatcher};
use crate::domain::entities::{
    Channel, Embed, Guild, Message, NewChannel, Reaction, ReactionEvent, Snowflake, User,
};
use crate::domain::traits::ChatPlatform;

/// First generated ID: 2020-01-01 at midnight
const FIRST_ID: Snowflake = 0x92ee70e00000000;

/// Generated IDs advance one second each
const ID_STEP: Snowflake = 1000 << 22;

struct MemGuild {
    guild: Guild,
    members: Vec<User>,
    channel_ids: Vec<Snowflake>,
}

struct MemChannel {
    channel: Channel,
    history: Vec<Message>,
}

struct State {
    last_id: Snowflake,
    me: User,
    application_id: Snowflake,
    guilds: Vec<MemGuild>,
    channels: HashMap<Snowflake, MemChannel>,
    /// Users behind each reaction, keyed by (message ID, emoji)
    reaction_users: HashMap<(Snowflake, String), Vec<User>>,
    events: Vec<Event>,
    /// Newest-first history reads per channel
    scans: HashMap<Snowflake, usize>,
}

impl State {
    fn unique_id(&mut self) -> Snowflake {
        self.last_id += ID_STEP;
        self.last_id
    }

    fn channel_mut(&mut self, id: Snowflake) -> Result<&mut MemChannel, BotError> {
        self.channels
            .get_mut(&id)
            .ok_or_else(|| BotError::NotFound(format!("channel {} not found", id)))
    }

    fn message_mut(&mut self, channel_id: Snowflake, message_id: Snowflake) -> Result<&mut Message, BotError> {
        self.channel_mut(channel_id)?
            .history
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| BotError::NotFound(format!("message {} not found", message_id)))
    }

    fn push_message(&mut self, channel_id: Snowflake, author: User, content: &str, embed: Option<&Embed>) -> Result<Message, BotError> {
        let id = self.unique_id();
        let channel = self.channel_mut(channel_id)?;
        let mut message = Message::new(id, channel_id, author, content);
        message.guild_id = channel.channel.guild_id;
        message.embeds.extend(embed.cloned());
        channel.history.push(message.clone());
        Ok(message)
    }

    /// Adds or removes one user's reaction; true if anything changed
    fn set_reaction(&mut self, channel_id: Snowflake, message_id: Snowflake, emoji: &str, user: &User, add: bool) -> Result<bool, BotError> {
        self.message_mut(channel_id, message_id)?;
        let me = self.me.id;
        let users = self
            .reaction_users
            .entry((message_id, emoji.to_string()))
            .or_default();
        let had = users.iter().any(|u| u.id == user.id);
        match (add, had) {
            (true, false) => users.push(user.clone()),
            (false, true) => users.retain(|u| u.id != user.id),
            _ => return Ok(false),
        }
        let reaction = Reaction {
            emoji: emoji.to_string(),
            count: users.len() as u64,
            me: users.iter().any(|u| u.id == me),
        };

        let message = self.message_mut(channel_id, message_id)?;
        message.reactions.retain(|r| r.emoji != emoji);
        if reaction.count > 0 {
            message.reactions.push(reaction);
        }
        let event = ReactionEvent {
            guild_id: message.guild_id,
            channel_id,
            message_id,
            user_id: Some(user.id),
            emoji: emoji.to_string(),
        };
        self.events.push(if add { Event::ReactionAdd(event) } else { Event::ReactionRemove(event) });
        Ok(true)
    }
}

/// Simulated chat platform
pub struct MemoryPlatform {
    state: Mutex<State>,
}

impl MemoryPlatform {
    /// Empty world with a bot user called `bot_name`
    pub fn new(bot_name: &str) -> Self {
        let mut state = State {
            last_id: FIRST_ID,
            me: User::new(0, bot_name),
            application_id: 0,
            guilds: Vec::new(),
            channels: HashMap::new(),
            reaction_users: HashMap::new(),
            events: Vec::new(),
            scans: HashMap::new(),
        };
        state.me = User::new(state.unique_id(), bot_name).with_discriminator(9999).as_bot();
        state.application_id = state.unique_id();
        Self { state: Mutex::new(state) }
    }

    /// One guild with one member, one channel and one message
    pub fn seeded() -> Self {
        let platform = Self::new("Client User");
        platform.populate(1, 1, 1, 1);
        platform
    }

    /// Adds `Mock Guild N` guilds with `Mock Member N` members and
    /// `mock-channel-N` channels holding `Mock message N` messages
    pub fn populate(&self, guilds: usize, members: usize, channels: usize, messages: usize) {
        for gi in 0..guilds {
            let guild = self.add_guild(&format!("Mock Guild {}", gi));
            let members: Vec<User> = (0..members)
                .map(|mi| self.add_member(guild.id, &format!("Mock Member {}", mi), 1000 + mi as u16))
                .collect();
            for ci in 0..channels {
                let channel = self.add_text_channel(guild.id, &format!("mock-channel-{}", ci));
                for mi in 0..messages {
                    if let Some(author) = members.get(mi % members.len().max(1)) {
                        let content = format!("Mock message {} in #mock-channel-{}", mi, ci);
                        let mut state = self.state();
                        let _ = state.push_message(channel.id, author.clone(), &content, None);
                    }
                }
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_guild(&self, name: &str) -> Guild {
        let mut state = self.state();
        let guild = Guild::new(state.unique_id(), name);
        state.guilds.push(MemGuild { guild: guild.clone(), members: Vec::new(), channel_ids: Vec::new() });
        guild
    }

    pub fn add_member(&self, guild_id: Snowflake, name: &str, discriminator: u16) -> User {
        let mut state = self.state();
        let user = User::new(state.unique_id(), name).with_discriminator(discriminator);
        if let Some(g) = state.guilds.iter_mut().find(|g| g.guild.id == guild_id) {
            g.members.push(user.clone());
        }
        user
    }

    /// Adds a text channel without queueing an event
    pub fn add_text_channel(&self, guild_id: Snowflake, name: &str) -> Channel {
        let mut state = self.state();
        let id = state.unique_id();
        let Some(g) = state.guilds.iter_mut().find(|g| g.guild.id == guild_id) else {
            return Channel::text(id, guild_id, name);
        };
        let channel = Channel::text(id, guild_id, name)
            .with_topic(format!("topic for {}", name))
            .with_position(g.channel_ids.len() as u16);
        g.channel_ids.push(id);
        state.channels.insert(id, MemChannel { channel: channel.clone(), history: Vec::new() });
        channel
    }

    /// Members of a guild, in creation order
    pub fn members(&self, guild_id: Snowflake) -> Vec<User> {
        self.state()
            .guilds
            .iter()
            .find(|g| g.guild.id == guild_id)
            .map(|g| g.members.clone())
            .unwrap_or_default()
    }

    /// A guild's channels in creation order
    pub fn channels_in_order(&self, guild_id: Snowflake) -> Vec<Channel> {
        let state = self.state();
        state
            .guilds
            .iter()
            .find(|g| g.guild.id == guild_id)
            .map(|g| {
                g.channel_ids
                    .iter()
                    .filter_map(|id| state.channels.get(id).map(|c| c.channel.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Full history of a channel, oldest first
    pub fn history(&self, channel_id: Snowflake) -> Vec<Message> {
        self.state()
            .channels
            .get(&channel_id)
            .map(|c| c.history.clone())
            .unwrap_or_default()
    }

    /// Posts a message as `author` and queues the message event
    pub fn post_message(&self, channel_id: Snowflake, author: &User, content: &str) -> Result<Message, BotError> {
        let mut state = self.state();
        let message = state.push_message(channel_id, author.clone(), content, None)?;
        state.events.push(Event::Message(message.clone()));
        Ok(message)
    }

    /// Deletes a message and queues the deletion event
    pub fn sim_delete_message(&self, channel_id: Snowflake, message_id: Snowflake) -> Result<(), BotError> {
        let mut state = self.state();
        let channel = state.channel_mut(channel_id)?;
        let guild_id = channel.channel.guild_id;
        channel.history.retain(|m| m.id != message_id);
        state.events.push(Event::MessageDelete { guild_id, channel_id, message_id });
        Ok(())
    }

    /// Adds (`delta` > 0) or removes a user's reaction and queues the event
    pub fn sim_reaction(&self, channel_id: Snowflake, message_id: Snowflake, emoji: &str, user: &User, delta: i32) -> Result<(), BotError> {
        self.state().set_reaction(channel_id, message_id, emoji, user, delta > 0)?;
        Ok(())
    }

    /// How often a channel's recent history was read newest-first
    pub fn history_scans(&self, channel_id: Snowflake) -> usize {
        self.state().scans.get(&channel_id).copied().unwrap_or(0)
    }

    pub fn queue_event(&self, event: Event) {
        self.state().events.push(event);
    }

    /// Removes and returns every queued event
    pub fn take_events(&self) -> Vec<Event> {
        std::mem::take(&mut self.state().events)
    }

    /// Dispatches queued events until none are left, including any queued
    /// by the listeners themselves
    pub async fn run_events(&self, dispatcher: &EventDispatcher, ctx: &Context) {
        loop {
            let batch = self.take_events();
            if batch.is_empty() {
                break;
            }
            for event in batch {
                dispatcher.dispatch(ctx, event).await;
            }
        }
    }
}

#[async_trait]
impl ChatPlatform for MemoryPlatform {
    fn current_user(&self) -> User {
        self.state().me.clone()
    }

    fn guilds(&self) -> Vec<Guild> {
        self.state().guilds.iter().map(|g| g.guild.clone()).collect()
    }

    fn guild(&self, id: Snowflake) -> Option<Guild> {
        self.state().guilds.iter().find(|g| g.guild.id == id).map(|g| g.guild.clone())
    }

    fn guild_channels(&self, guild_id: Snowflake) -> Vec<Channel> {
        self.channels_in_order(guild_id)
    }

    fn channel(&self, id: Snowflake) -> Option<Channel> {
        self.state().channels.get(&id).map(|c| c.channel.clone())
    }

    fn user(&self, id: Snowflake) -> Option<User> {
        let state = self.state();
        if state.me.id == id {
            return Some(state.me.clone());
        }
        state
            .guilds
            .iter()
            .flat_map(|g| g.members.iter())
            .find(|u| u.id == id)
            .cloned()
    }

    async fn gateway_url(&self) -> Result<String, BotError> {
        Ok("wss://gateway.memory.invalid".to_string())
    }

    async fn application_id(&self) -> Result<Snowflake, BotError> {
        Ok(self.state().application_id)
    }

    async fn fetch_message(&self, channel_id: Snowflake, message_id: Snowflake) -> Result<Message, BotError> {
        self.state().message_mut(channel_id, message_id).map(|m| m.clone())
    }

    async fn channel_history(&self, channel_id: Snowflake, limit: u8, oldest_first: bool) -> Result<Vec<Message>, BotError> {
        let mut state = self.state();
        state.channel_mut(channel_id)?;
        if !oldest_first {
            *state.scans.entry(channel_id).or_default() += 1;
        }
        let history = &state.channel_mut(channel_id)?.history;
        let limit = usize::from(limit);
        Ok(if oldest_first {
            history.iter().take(limit).cloned().collect()
        } else {
            history.iter().rev().take(limit).cloned().collect()
        })
    }

    async fn reaction_users(&self, _channel_id: Snowflake, message_id: Snowflake, emoji: &str, limit: u8) -> Result<Vec<User>, BotError> {
        Ok(self
            .state()
            .reaction_users
            .get(&(message_id, emoji.to_string()))
            .map(|users| users.iter().take(usize::from(limit)).cloned().collect())
            .unwrap_or_default())
    }

    async fn create_text_channel(&self, guild_id: Snowflake, new_channel: NewChannel) -> Result<Channel, BotError> {
        let mut state = self.state();
        let id = state.unique_id();
        let guild = state
            .guilds
            .iter_mut()
            .find(|g| g.guild.id == guild_id)
            .ok_or_else(|| BotError::NotFound(format!("guild {} not found", guild_id)))?;
        guild.channel_ids.push(id);

        let mut channel = Channel::text(id, guild_id, new_channel.name)
            .with_topic(new_channel.topic)
            .with_position(new_channel.position);
        channel.parent_id = new_channel.parent_id;
        state.channels.insert(id, MemChannel { channel: channel.clone(), history: Vec::new() });
        state.events.push(Event::ChannelCreate(channel.clone()));
        Ok(channel)
    }

    async fn delete_channel(&self, channel_id: Snowflake) -> Result<(), BotError> {
        let mut state = self.state();
        let removed = state
            .channels
            .remove(&channel_id)
            .ok_or_else(|| BotError::NotFound(format!("channel {} not found", channel_id)))?;
        for g in state.guilds.iter_mut() {
            g.channel_ids.retain(|id| *id != channel_id);
        }
        state.events.push(Event::ChannelDelete(removed.channel));
        Ok(())
    }

    async fn send_message(&self, channel_id: Snowflake, content: &str, embed: Option<&Embed>) -> Result<Message, BotError> {
        let mut state = self.state();
        let me = state.me.clone();
        let message = state.push_message(channel_id, me, content, embed)?;
        state.events.push(Event::Message(message.clone()));
        Ok(message)
    }

    async fn edit_message(&self, channel_id: Snowflake, message_id: Snowflake, content: &str, embed: Option<&Embed>) -> Result<Message, BotError> {
        let mut state = self.state();
        let message = state.message_mut(channel_id, message_id)?;
        let before = message.clone();
        message.content = content.to_string();
        message.embeds = embed.cloned().into_iter().collect();
        let after = message.clone();
        state.events.push(Event::MessageEdit {
            guild_id: after.guild_id,
            channel_id,
            message_id,
            before: Some(before),
            after: Some(after.clone()),
        });
        Ok(after)
    }

    async fn add_reaction(&self, channel_id: Snowflake, message_id: Snowflake, emoji: &str) -> Result<(), BotError> {
        let mut state = self.state();
        let me = state.me.clone();
        state.set_reaction(channel_id, message_id, emoji, &me, true)?;
        Ok(())
    }

    async fn remove_own_reaction(&self, channel_id: Snowflake, message_id: Snowflake, emoji: &str) -> Result<(), BotError> {
        let mut state = self.state();
        let me = state.me.clone();
        state.set_reaction(channel_id, message_id, emoji, &me, false)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_world() {
        let platform = MemoryPlatform::seeded();
        let guilds = platform.guilds();
        assert_eq!(guilds.len(), 1);
        assert_eq!(guilds[0].name, "Mock Guild 0");

        let channels = platform.guild_channels(guilds[0].id);
        assert_eq!(channels[0].name, "mock-channel-0");
        let history = platform.history(channels[0].id);
        assert_eq!(history[0].content, "Mock message 0 in #mock-channel-0");
        assert_eq!(history[0].author.to_string(), "Mock Member 0#1000");
        assert_eq!(history[0].guild_id, Some(guilds[0].id));
        assert!(platform.take_events().is_empty());
    }

    #[test]
    fn test_ids_advance_one_second() {
        let platform = MemoryPlatform::new("bot");
        let a = platform.add_guild("a");
        let b = platform.add_guild("b");
        assert_eq!(b.id - a.id, ID_STEP);
        assert!(a.id > FIRST_ID);
    }

    #[tokio::test]
    async fn test_reactions_track_users() {
        let platform = MemoryPlatform::seeded();
        let guild = platform.guilds()[0].clone();
        let member = platform.members(guild.id)[0].clone();
        let channel = platform.guild_channels(guild.id)[0].clone();
        let message = platform.history(channel.id)[0].clone();

        platform.sim_reaction(channel.id, message.id, "🧵", &member, 1).unwrap();
        platform.add_reaction(channel.id, message.id, "🧵").await.unwrap();

        let fetched = platform.fetch_message(channel.id, message.id).await.unwrap();
        let rx = fetched.reaction("🧵").unwrap();
        assert_eq!((rx.count, rx.me), (2, true));
        let users = platform.reaction_users(channel.id, message.id, "🧵", 1).await.unwrap();
        assert_eq!(users, vec![member.clone()]);

        // Repeating a reaction changes nothing and queues nothing more.
        platform.sim_reaction(channel.id, message.id, "🧵", &member, 1).unwrap();
        let kinds: Vec<String> = platform.take_events().iter().map(|e| e.kind().to_string()).collect();
        assert_eq!(kinds, vec!["reaction_add", "reaction_add"]);

        platform.sim_reaction(channel.id, message.id, "🧵", &member, -1).unwrap();
        platform.remove_own_reaction(channel.id, message.id, "🧵").await.unwrap();
        let fetched = platform.fetch_message(channel.id, message.id).await.unwrap();
        assert!(fetched.reaction("🧵").is_none());
    }

    #[tokio::test]
    async fn test_history_order_and_missing_messages() {
        let platform = MemoryPlatform::new("bot");
        platform.populate(1, 1, 1, 3);
        let channel = platform.guild_channels(platform.guilds()[0].id)[0].clone();

        let oldest = platform.channel_history(channel.id, 2, true).await.unwrap();
        let newest = platform.channel_history(channel.id, 2, false).await.unwrap();
        assert_eq!(oldest[0].content, "Mock message 0 in #mock-channel-0");
        assert_eq!(newest[0].content, "Mock message 2 in #mock-channel-0");
        assert_eq!(newest.len(), 2);

        let err = platform.fetch_message(channel.id, 1).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
