//! Event logger - Reports connection and server events
//!
//! Notable events (connect, ready, guild join/leave, listener errors) are
//! logged at INFO. In verbose mode every message, reaction and channel event
//! is logged at DEBUG as well.

use async_trait::async_trait;
use serenity::model::Permissions;

use crate::application::format::fobj;
use crate::application::messaging::{Context, Event, EventKind, Listener, ListenerResult};
use crate::domain::entities::{Guild, Snowflake, User};

const TARGET: &str = "bot";

/// Permissions requested by the invite link
pub fn invite_permissions() -> Permissions {
    Permissions::MANAGE_CHANNELS
        | Permissions::ADD_REACTIONS
        | Permissions::VIEW_CHANNEL
        | Permissions::SEND_MESSAGES
        | Permissions::MANAGE_MESSAGES
        | Permissions::READ_MESSAGE_HISTORY
        | Permissions::MANAGE_ROLES
}

/// OAuth2 link that adds the bot to a server
pub fn invite_url(application_id: Snowflake) -> String {
    format!(
        "https://discord.com/oauth2/authorize?client_id={}&scope=bot&permissions={}",
        application_id,
        invite_permissions().bits()
    )
}

/// The "Ready in N servers" summary
pub fn ready_summary(user: &User, guilds: &[Guild]) -> String {
    let mut summary = format!("Ready in {} servers (as {}):", guilds.len(), user);
    for guild in guilds {
        summary.push_str(&format!("\n    \"{}\"", guild.name));
    }
    summary
}

/// Listener that logs server and connection events
pub struct EventLogger {
    verbose: bool,
}

impl EventLogger {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    async fn log_ready(&self, ctx: &Context) -> ListenerResult {
        let platform = ctx.platform();
        let guilds = platform.guilds();
        tracing::info!(target: TARGET, "{}", ready_summary(&platform.current_user(), &guilds));

        let application_id = platform.application_id().await?;
        tracing::info!(
            target: TARGET,
            "Invite link, open in browser to add servers:\n    {}",
            invite_url(application_id)
        );
        Ok(())
    }

    fn log_debug(&self, ctx: &Context, event: &Event) {
        let p = Some(ctx.platform());
        match event {
            Event::Message(m) => {
                tracing::debug!(target: TARGET, "Post message\n    {}", fobj(p).message(m));
            }
            Event::MessageDelete { guild_id, channel_id, message_id } => {
                let mut d = fobj(p).channel_id(*channel_id).message_id(*message_id);
                if let Some(g) = guild_id {
                    d = d.guild_id(*g);
                }
                tracing::debug!(target: TARGET, "Delete message\n    {}", d);
            }
            Event::BulkMessageDelete { guild_id, channel_id, message_ids } => {
                let mut d = fobj(p).channel_id(*channel_id);
                if let Some(g) = guild_id {
                    d = d.guild_id(*g);
                }
                let lines: Vec<String> = message_ids
                    .iter()
                    .map(|m| format!("    {}", fobj(p).message_id(*m)))
                    .collect();
                tracing::debug!(
                    target: TARGET,
                    "Delete {} messages in {}:\n{}",
                    message_ids.len(),
                    d,
                    lines.join("\n")
                );
            }
            Event::MessageEdit { before: Some(b), after: Some(a), .. } => {
                tracing::debug!(
                    target: TARGET,
                    "Edit message\n    was: {}\n    now: {}",
                    fobj(p).message(b),
                    fobj(p).message(a)
                );
            }
            Event::MessageEdit { channel_id, message_id, .. } => {
                tracing::debug!(
                    target: TARGET,
                    "Edit message\n    {}",
                    fobj(p).channel_id(*channel_id).message_id(*message_id)
                );
            }
            Event::ReactionAdd(rx) | Event::ReactionRemove(rx) => {
                let verb = if event.kind() == EventKind::ReactionAdd { "Add" } else { "Remove" };
                let who = match rx.user_id {
                    Some(u) => fobj(p).user_id(u).to_string(),
                    None => "(None)".to_string(),
                };
                let mut d = fobj(p).channel_id(rx.channel_id).message_id(rx.message_id);
                if let Some(g) = rx.guild_id {
                    d = d.guild_id(g);
                }
                tracing::debug!(target: TARGET, "{} [{}] {} on\n    {}", verb, rx.emoji, who, d);
            }
            Event::ReactionClear { guild_id, channel_id, message_id } => {
                let mut d = fobj(p).channel_id(*channel_id).message_id(*message_id);
                if let Some(g) = guild_id {
                    d = d.guild_id(*g);
                }
                tracing::debug!(target: TARGET, "Clear reactions from\n    {}", d);
            }
            Event::ReactionClearEmoji(rx) => {
                tracing::debug!(
                    target: TARGET,
                    "Clear [{}] from\n    {}",
                    rx.emoji,
                    fobj(p).channel_id(rx.channel_id).message_id(rx.message_id)
                );
            }
            Event::ChannelCreate(c) => {
                tracing::debug!(target: TARGET, "Channel create {}", fobj(p).channel(c));
            }
            Event::ChannelUpdate { after, .. } => {
                tracing::debug!(target: TARGET, "Channel update {}", fobj(p).channel(after));
            }
            Event::ChannelDelete(c) => {
                tracing::debug!(target: TARGET, "Channel delete {}", fobj(p).channel(c));
            }
            Event::GuildAvailable(g) => {
                tracing::debug!(target: TARGET, "Server available {}", fobj(p).guild(g));
            }
            Event::GuildUnavailable(id) => {
                tracing::debug!(target: TARGET, "Server UN-available {}", fobj(p).guild_id(*id));
            }
            _ => {}
        }
    }
}

impl Default for EventLogger {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl Listener for EventLogger {
    fn name(&self) -> &str {
        "event_logger"
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        let mut kinds = vec![
            EventKind::Connect,
            EventKind::Disconnect,
            EventKind::Resumed,
            EventKind::Ready,
            EventKind::GuildJoin,
            EventKind::GuildRemove,
            EventKind::Error,
        ];
        if self.verbose {
            kinds.extend([
                EventKind::Message,
                EventKind::MessageDelete,
                EventKind::BulkMessageDelete,
                EventKind::MessageEdit,
                EventKind::ReactionAdd,
                EventKind::ReactionRemove,
                EventKind::ReactionClear,
                EventKind::ReactionClearEmoji,
                EventKind::ChannelCreate,
                EventKind::ChannelUpdate,
                EventKind::ChannelDelete,
                EventKind::GuildAvailable,
                EventKind::GuildUnavailable,
            ]);
        }
        kinds
    }

    async fn on_event(&self, ctx: &Context, event: &Event) -> ListenerResult {
        match event {
            Event::Connect { gateway } => {
                tracing::info!(target: TARGET, "Connected to Discord:\n    {}", gateway);
            }
            Event::Disconnect => tracing::info!(target: TARGET, "Disconnected from Discord"),
            Event::Resumed => tracing::info!(target: TARGET, "Resumed Discord session"),
            Event::Ready => self.log_ready(ctx).await?,
            Event::GuildJoin(g) => {
                tracing::info!(target: TARGET, "Joined Discord guild (server) \"{}\"", g.name);
            }
            Event::GuildRemove(g) => {
                tracing::info!(target: TARGET, "Removed from Discord guild (server) \"{}\"", g.name);
            }
            Event::Error { source, error } => {
                tracing::error!(target: TARGET, "Exception in \"{}\" handler: {}", source, error);
            }
            other => self.log_debug(ctx, other),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_url() {
        assert_eq!(invite_permissions().bits(), 268_512_336);
        assert_eq!(
            invite_url(1234),
            "https://discord.com/oauth2/authorize?client_id=1234&scope=bot&permissions=268512336"
        );
    }

    #[test]
    fn test_ready_summary() {
        let me = User::new(1, "Roomba").with_discriminator(4242);
        let guilds = vec![Guild::new(2, "Dusty"), Guild::new(3, "Clean")];
        assert_eq!(
            ready_summary(&me, &guilds),
            "Ready in 2 servers (as Roomba#4242):\n    \"Dusty\"\n    \"Clean\""
        );
        assert_eq!(ready_summary(&me, &[]), "Ready in 0 servers (as Roomba#4242):");
    }

    #[test]
    fn test_verbose_subscriptions() {
        let quiet = EventLogger::new(false).subscriptions();
        assert!(quiet.contains(&EventKind::Ready));
        assert!(!quiet.contains(&EventKind::Message));

        let verbose = EventLogger::new(true).subscriptions();
        assert!(verbose.contains(&EventKind::Message));
        assert!(verbose.contains(&EventKind::ReactionClearEmoji));
    }
}
