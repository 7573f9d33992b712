//! Thread manager - Tracks thread channels across guilds
//!
//! Listens for reactions, messages and channel changes, creating thread
//! channels for 🧵 reactions and keeping existing threads in step with their
//! origin messages.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::thread_channel::{ThreadChannel, THREAD_EMOJI};
use crate::application::format::fobj;
use crate::application::messaging::{AsyncExclusive, Context, Event, EventKind, Listener, ListenerResult};
use crate::domain::entities::{Channel, Snowflake};
use crate::domain::traits::ChatPlatform;

const TARGET: &str = "bot.thread";

/// Default number of recent messages checked per channel on guild scan
pub const DEFAULT_HISTORY_SCAN_LIMIT: u8 = 100;

type SharedThread = Arc<tokio::sync::Mutex<ThreadChannel>>;

/// (origin channel ID, origin message ID)
type OriginKey = (Snowflake, Snowflake);

struct Entry {
    guild_id: Option<Snowflake>,
    origin: OriginKey,
    thread: SharedThread,
}

#[derive(Default)]
struct Registry {
    by_channel: HashMap<Snowflake, Entry>,
    by_origin: HashMap<OriginKey, Snowflake>,
    /// Guilds scanned during the current gateway session
    scanned_guilds: HashSet<Snowflake>,
}

#[derive(Debug, Clone, Copy)]
enum Refresh {
    /// Intro, but only if the message could be part of it
    IntroIf(Snowflake),
    Origin,
    Both,
}

/// Listener owning all known thread channels
pub struct ThreadManager {
    history_scan_limit: u8,
    registry: Mutex<Registry>,
    by_origin_lock: AsyncExclusive<OriginKey>,
}

impl ThreadManager {
    pub fn new() -> Self {
        Self {
            history_scan_limit: DEFAULT_HISTORY_SCAN_LIMIT,
            registry: Mutex::new(Registry::default()),
            by_origin_lock: AsyncExclusive::new(),
        }
    }

    /// Set how many recent messages per channel are checked for 🧵 on scan
    pub fn with_history_scan_limit(mut self, limit: u8) -> Self {
        self.history_scan_limit = limit;
        self
    }

    /// Number of threads currently tracked
    pub fn thread_count(&self) -> usize {
        self.registry().by_channel.len()
    }

    /// Thread channel ID for an origin message, if one is tracked
    pub fn thread_for_origin(&self, channel_id: Snowflake, message_id: Snowflake) -> Option<Snowflake> {
        self.registry().by_origin.get(&(channel_id, message_id)).copied()
    }

    pub fn is_thread(&self, channel_id: Snowflake) -> bool {
        self.registry().by_channel.contains_key(&channel_id)
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn thread_by_channel(&self, channel_id: Snowflake) -> Option<SharedThread> {
        self.registry().by_channel.get(&channel_id).map(|e| Arc::clone(&e.thread))
    }

    fn thread_by_origin(&self, key: OriginKey) -> Option<SharedThread> {
        let registry = self.registry();
        let channel_id = registry.by_origin.get(&key)?;
        registry.by_channel.get(channel_id).map(|e| Arc::clone(&e.thread))
    }

    fn insert(&self, thread: ThreadChannel) -> SharedThread {
        let channel_id = thread.channel_id();
        let origin = thread.origin_key();
        let entry = Entry {
            guild_id: thread.guild_id(),
            origin,
            thread: Arc::new(tokio::sync::Mutex::new(thread)),
        };
        let shared = Arc::clone(&entry.thread);

        let mut registry = self.registry();
        if let Some(old) = registry.by_channel.insert(channel_id, entry) {
            if old.origin != origin && registry.by_origin.get(&old.origin) == Some(&channel_id) {
                registry.by_origin.remove(&old.origin);
            }
        }
        registry.by_origin.insert(origin, channel_id);
        shared
    }

    fn forget(&self, channel_id: Snowflake) {
        let mut registry = self.registry();
        if let Some(entry) = registry.by_channel.remove(&channel_id) {
            if registry.by_origin.get(&entry.origin) == Some(&channel_id) {
                registry.by_origin.remove(&entry.origin);
            }
            tracing::debug!(target: TARGET, "Forgot thread {}", fobj(None).channel_id(channel_id));
        }
    }

    /// True if the caller should scan `guild_id`; later callers are told no
    fn claim_scan(&self, guild_id: Snowflake) -> bool {
        self.registry().scanned_guilds.insert(guild_id)
    }

    fn forget_guild(&self, guild_id: Snowflake) {
        let mut registry = self.registry();
        let Registry { by_channel, by_origin, scanned_guilds } = &mut *registry;
        scanned_guilds.remove(&guild_id);
        by_channel.retain(|channel_id, entry| {
            let keep = entry.guild_id != Some(guild_id);
            if !keep && by_origin.get(&entry.origin) == Some(channel_id) {
                by_origin.remove(&entry.origin);
            }
            keep
        });
    }

    /// Runs a refresh on one thread, dropping it if its channel went away
    async fn refresh(&self, platform: &dyn ChatPlatform, shared: SharedThread, what: Refresh) -> ListenerResult {
        let mut thread = shared.lock().await;
        if thread.thread_deleted {
            return Ok(());
        }

        let result = match what {
            Refresh::IntroIf(message_id) if thread.relevant_intro_update(message_id) => {
                thread.refresh_intro(platform).await
            }
            Refresh::IntroIf(_) => Ok(()),
            Refresh::Origin => thread.refresh_origin(platform).await,
            Refresh::Both => match thread.refresh_intro(platform).await {
                Ok(()) if !thread.thread_deleted => thread.refresh_origin(platform).await,
                other => other,
            },
        };

        // A thread whose channel vanished under us is done too.
        let gone = match &result {
            Err(e) => e.is_not_found(),
            Ok(()) => thread.thread_deleted,
        };
        if gone {
            thread.thread_deleted = true;
            let channel_id = thread.channel_id();
            drop(thread);
            self.forget(channel_id);
            return Ok(());
        }
        result
    }

    /// Refreshes the origin's thread, or creates one if warranted
    async fn check_origin(&self, platform: &dyn ChatPlatform, channel_id: Snowflake, message_id: Snowflake) -> ListenerResult {
        let key = (channel_id, message_id);
        let _guard = self.by_origin_lock.lock(key).await;

        if let Some(shared) = self.thread_by_origin(key) {
            return self.refresh(platform, shared, Refresh::Origin).await;
        }

        if let Some(thread) = ThreadChannel::maybe_create_from_origin(platform, channel_id, message_id).await? {
            if !thread.thread_deleted {
                self.insert(thread);
            }
        }
        Ok(())
    }

    /// Starts tracking a thread channel (or refreshes our copy of it)
    async fn check_channel(&self, platform: &dyn ChatPlatform, channel: &Channel) -> ListenerResult {
        if let Some(shared) = self.thread_by_channel(channel.id) {
            shared.lock().await.thread_channel = channel.clone();
            return Ok(());
        }

        let Some(thread) = ThreadChannel::maybe_attach(channel) else {
            return Ok(());
        };

        // Channels created by this bot show up while creation still holds the origin.
        let _guard = self.by_origin_lock.lock(thread.origin_key()).await;
        if self.is_thread(channel.id) {
            return Ok(());
        }

        let shared = self.insert(thread);
        self.refresh(platform, shared, Refresh::Both).await
    }

    /// Attaches existing threads and checks recent history for 🧵 requests
    async fn scan_guild(&self, platform: &dyn ChatPlatform, guild_id: Snowflake) -> ListenerResult {
        let channels: Vec<Channel> = platform
            .guild_channels(guild_id)
            .into_iter()
            .filter(Channel::is_text)
            .collect();

        tracing::debug!(
            target: TARGET,
            "Scanning {} ({} text channels)",
            fobj(Some(platform)).guild_id(guild_id),
            channels.len()
        );

        for channel in &channels {
            if let Err(e) = self.check_channel(platform, channel).await {
                tracing::warn!(target: TARGET, "Attach failed: {}\n    {}", fobj(Some(platform)).channel(channel), e);
            }
        }

        for channel in channels.iter().filter(|c| !self.is_thread(c.id)) {
            if let Err(e) = self.scan_history(platform, channel).await {
                tracing::warn!(target: TARGET, "History scan failed: {}\n    {}", fobj(Some(platform)).channel(channel), e);
            }
        }
        Ok(())
    }

    async fn scan_history(&self, platform: &dyn ChatPlatform, channel: &Channel) -> ListenerResult {
        let history = platform
            .channel_history(channel.id, self.history_scan_limit, false)
            .await?;
        for message in history
            .iter()
            .filter(|m| ThreadChannel::relevant_origin_update(Some(*m), None))
        {
            self.check_origin(platform, channel.id, message.id).await?;
        }
        Ok(())
    }

    /// A message changed or vanished: update whichever thread cares
    async fn message_changed(&self, platform: &dyn ChatPlatform, channel_id: Snowflake, message_id: Snowflake) -> ListenerResult {
        if self.thread_for_origin(channel_id, message_id).is_some() {
            self.check_origin(platform, channel_id, message_id).await?;
        }
        if let Some(shared) = self.thread_by_channel(channel_id) {
            self.refresh(platform, shared, Refresh::IntroIf(message_id)).await?;
        }
        Ok(())
    }

    /// A channel went away: drop it, or tell threads whose origin it held
    async fn channel_deleted(&self, platform: &dyn ChatPlatform, channel: &Channel) -> ListenerResult {
        if self.is_thread(channel.id) {
            self.forget(channel.id);
            return Ok(());
        }

        let orphans: Vec<SharedThread> = self
            .registry()
            .by_channel
            .values()
            .filter(|e| e.origin.0 == channel.id)
            .map(|e| Arc::clone(&e.thread))
            .collect();
        for shared in orphans {
            self.refresh(platform, shared, Refresh::Origin).await?;
        }
        Ok(())
    }
}

impl Default for ThreadManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Listener for ThreadManager {
    fn name(&self) -> &str {
        "thread_manager"
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![
            EventKind::Disconnect,
            EventKind::Ready,
            EventKind::GuildJoin,
            EventKind::GuildAvailable,
            EventKind::GuildRemove,
            EventKind::GuildUnavailable,
            EventKind::ChannelCreate,
            EventKind::ChannelUpdate,
            EventKind::ChannelDelete,
            EventKind::Message,
            EventKind::MessageDelete,
            EventKind::BulkMessageDelete,
            EventKind::MessageEdit,
            EventKind::ReactionAdd,
            EventKind::ReactionRemove,
            EventKind::ReactionClear,
            EventKind::ReactionClearEmoji,
        ]
    }

    async fn on_event(&self, ctx: &Context, event: &Event) -> ListenerResult {
        let platform = ctx.platform();
        match event {
            // The next session announces every guild again.
            Event::Disconnect => self.registry().scanned_guilds.clear(),
            Event::Ready => {
                for guild in platform.guilds() {
                    if self.claim_scan(guild.id) {
                        self.scan_guild(platform, guild.id).await?;
                    }
                }
                tracing::info!(target: TARGET, "Tracking {} thread(s)", self.thread_count());
            }
            Event::GuildAvailable(guild) => {
                if self.claim_scan(guild.id) {
                    self.scan_guild(platform, guild.id).await?;
                }
            }
            Event::GuildJoin(guild) => {
                self.claim_scan(guild.id);
                self.scan_guild(platform, guild.id).await?;
            }
            Event::GuildRemove(guild) => self.forget_guild(guild.id),
            Event::GuildUnavailable(guild_id) => self.forget_guild(*guild_id),
            Event::ChannelCreate(channel) => self.check_channel(platform, channel).await?,
            Event::ChannelUpdate { after, .. } => self.check_channel(platform, after).await?,
            Event::ChannelDelete(channel) => self.channel_deleted(platform, channel).await?,
            Event::Message(message) => {
                if let Some(shared) = self.thread_by_channel(message.channel_id) {
                    self.refresh(platform, shared, Refresh::IntroIf(message.id)).await?;
                }
            }
            Event::MessageEdit { channel_id, message_id, after, .. } => {
                let requested = ThreadChannel::relevant_origin_update(after.as_ref(), None);
                if requested && self.thread_for_origin(*channel_id, *message_id).is_none() {
                    self.check_origin(platform, *channel_id, *message_id).await?;
                }
                self.message_changed(platform, *channel_id, *message_id).await?;
            }
            Event::MessageDelete { channel_id, message_id, .. } => {
                self.message_changed(platform, *channel_id, *message_id).await?;
            }
            Event::BulkMessageDelete { channel_id, message_ids, .. } => {
                for message_id in message_ids {
                    self.message_changed(platform, *channel_id, *message_id).await?;
                }
            }
            Event::ReactionAdd(rx) => {
                let known = self.thread_for_origin(rx.channel_id, rx.message_id).is_some();
                if known || ThreadChannel::relevant_origin_update(None, Some(&rx.emoji)) {
                    self.check_origin(platform, rx.channel_id, rx.message_id).await?;
                }
            }
            Event::ReactionRemove(rx) | Event::ReactionClearEmoji(rx) => {
                if rx.emoji == THREAD_EMOJI && self.thread_for_origin(rx.channel_id, rx.message_id).is_some() {
                    self.check_origin(platform, rx.channel_id, rx.message_id).await?;
                }
            }
            Event::ReactionClear { channel_id, message_id, .. } => {
                if self.thread_for_origin(*channel_id, *message_id).is_some() {
                    self.check_origin(platform, *channel_id, *message_id).await?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attached(channel_id: Snowflake, guild_id: Snowflake, origin: OriginKey) -> ThreadChannel {
        let channel = Channel::text(channel_id, guild_id, "🧵thread")
            .with_topic(format!("[<#{}>/{:x}]", origin.0, origin.1));
        ThreadChannel::maybe_attach(&channel).unwrap()
    }

    #[test]
    fn test_registry_indexes() {
        let manager = ThreadManager::new();
        manager.insert(attached(10, 1, (2, 3)));
        manager.insert(attached(11, 1, (2, 4)));
        manager.insert(attached(12, 5, (6, 7)));

        assert_eq!(manager.thread_count(), 3);
        assert_eq!(manager.thread_for_origin(2, 4), Some(11));
        assert!(manager.is_thread(12));

        manager.forget(11);
        assert_eq!(manager.thread_for_origin(2, 4), None);
        assert_eq!(manager.thread_count(), 2);

        manager.forget_guild(1);
        assert_eq!(manager.thread_count(), 1);
        assert_eq!(manager.thread_for_origin(2, 3), None);
        assert_eq!(manager.thread_for_origin(6, 7), Some(12));
    }

    #[test]
    fn test_guild_scanned_once_per_session() {
        let manager = ThreadManager::new();
        assert!(manager.claim_scan(1));
        assert!(!manager.claim_scan(1));
        assert!(manager.claim_scan(2));

        // Back after an outage: scan again.
        manager.forget_guild(1);
        assert!(manager.claim_scan(1));

        manager.registry().scanned_guilds.clear();
        assert!(manager.claim_scan(2));
    }

    #[test]
    fn test_history_scan_limit() {
        assert_eq!(ThreadManager::new().history_scan_limit, DEFAULT_HISTORY_SCAN_LIMIT);
        assert_eq!(ThreadManager::new().with_history_scan_limit(5).history_scan_limit, 5);
    }
}
