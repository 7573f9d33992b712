use async_trait::async_trait;

use crate::application::errors::BotError;
use crate::domain::entities::{Channel, Embed, Guild, Message, NewChannel, Snowflake, User};

/// ChatPlatform trait - abstraction over the gateway client's cache and REST API
///
/// Lookups are answered from the client's cache and never hit the network;
/// the async operations do.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// The bot's own user
    fn current_user(&self) -> User;

    /// All guilds currently joined
    fn guilds(&self) -> Vec<Guild>;

    fn guild(&self, id: Snowflake) -> Option<Guild>;

    /// Channels of a guild, in no particular order
    fn guild_channels(&self, guild_id: Snowflake) -> Vec<Channel>;

    fn channel(&self, id: Snowflake) -> Option<Channel>;

    fn user(&self, id: Snowflake) -> Option<User>;

    /// Websocket URL of the gateway
    async fn gateway_url(&self) -> Result<String, BotError>;

    /// ID of the bot's application, used for invite links
    async fn application_id(&self) -> Result<Snowflake, BotError>;

    /// Fetch one message; `BotError::NotFound` if it no longer exists
    async fn fetch_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
    ) -> Result<Message, BotError>;

    /// Fetch up to `limit` messages from either end of a channel's history.
    /// Results are ordered oldest-first when `oldest_first`, else newest-first.
    async fn channel_history(
        &self,
        channel_id: Snowflake,
        limit: u8,
        oldest_first: bool,
    ) -> Result<Vec<Message>, BotError>;

    /// Users who reacted with `emoji`
    async fn reaction_users(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        emoji: &str,
        limit: u8,
    ) -> Result<Vec<User>, BotError>;

    async fn create_text_channel(
        &self,
        guild_id: Snowflake,
        new_channel: NewChannel,
    ) -> Result<Channel, BotError>;

    async fn delete_channel(&self, channel_id: Snowflake) -> Result<(), BotError>;

    async fn send_message(
        &self,
        channel_id: Snowflake,
        content: &str,
        embed: Option<&Embed>,
    ) -> Result<Message, BotError>;

    /// Replace a message's content and embed (`None` clears the embed)
    async fn edit_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        content: &str,
        embed: Option<&Embed>,
    ) -> Result<Message, BotError>;

    async fn add_reaction(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        emoji: &str,
    ) -> Result<(), BotError>;

    /// Remove the bot's own reaction
    async fn remove_own_reaction(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        emoji: &str,
    ) -> Result<(), BotError>;
}
