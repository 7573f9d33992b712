//! Conversions from serenity models to domain entities

use serenity::all::{self as sy, ChannelType};

use crate::domain::entities::{
    Attachment, Channel, ChannelKind, Embed, Guild, Message, Reaction, ReactionEvent, Snowflake,
    User,
};

pub fn user(u: &sy::User) -> User {
    User {
        id: u.id.get(),
        name: u.name.clone(),
        discriminator: u.discriminator.map(|d| d.get()),
        global_name: u.global_name.clone(),
        avatar_url: Some(u.face()),
        bot: u.bot,
    }
}

pub fn guild(g: &sy::Guild) -> Guild {
    Guild::new(g.id.get(), g.name.clone())
}

pub fn channel_kind(kind: ChannelType) -> ChannelKind {
    match kind {
        ChannelType::Text | ChannelType::News => ChannelKind::Text,
        ChannelType::Voice | ChannelType::Stage => ChannelKind::Voice,
        ChannelType::Category => ChannelKind::Category,
        ChannelType::Private => ChannelKind::Private,
        _ => ChannelKind::Other,
    }
}

pub fn channel(c: &sy::GuildChannel) -> Channel {
    Channel {
        id: c.id.get(),
        guild_id: Some(c.guild_id.get()),
        name: c.name.clone(),
        kind: channel_kind(c.kind),
        topic: c.topic.clone(),
        parent_id: c.parent_id.map(|p| p.get()),
        position: c.position,
        recipient: None,
    }
}

fn embed(e: &sy::Embed) -> Embed {
    Embed {
        title: e.title.clone(),
        url: e.url.clone(),
        description: e.description.clone(),
        author_name: e.author.as_ref().map(|a| a.name.clone()),
        author_icon_url: e.author.as_ref().and_then(|a| a.icon_url.clone()),
    }
}

/// Converts a message; REST messages carry no guild ID, so `guild_id` fills in
pub fn message(m: &sy::Message, guild_id: Option<Snowflake>) -> Message {
    Message {
        id: m.id.get(),
        channel_id: m.channel_id.get(),
        guild_id: m.guild_id.map(|g| g.get()).or(guild_id),
        author: user(&m.author),
        content: m.content.clone(),
        attachments: m
            .attachments
            .iter()
            .map(|a| Attachment {
                filename: a.filename.clone(),
                url: a.url.clone(),
                proxy_url: Some(a.proxy_url.clone()),
            })
            .collect(),
        embeds: m.embeds.iter().map(embed).collect(),
        reactions: m
            .reactions
            .iter()
            .map(|r| Reaction {
                emoji: r.reaction_type.to_string(),
                count: r.count,
                me: r.me,
            })
            .collect(),
    }
}

pub fn reaction_event(r: &sy::Reaction) -> ReactionEvent {
    ReactionEvent {
        guild_id: r.guild_id.map(|g| g.get()),
        channel_id: r.channel_id.get(),
        message_id: r.message_id.get(),
        user_id: r.user_id.map(|u| u.get()),
        emoji: r.emoji.to_string(),
    }
}

/// Outgoing embed builder for an intro or similar post
pub fn create_embed(e: &Embed) -> sy::CreateEmbed {
    let mut builder = sy::CreateEmbed::new();
    if let Some(title) = &e.title {
        builder = builder.title(title);
    }
    if let Some(url) = &e.url {
        builder = builder.url(url);
    }
    if let Some(description) = &e.description {
        builder = builder.description(description);
    }
    if let Some(name) = &e.author_name {
        let mut author = sy::CreateEmbedAuthor::new(name);
        if let Some(icon) = &e.author_icon_url {
            author = author.icon_url(icon);
        }
        builder = builder.author(author);
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_kind() {
        assert_eq!(channel_kind(ChannelType::Text), ChannelKind::Text);
        assert_eq!(channel_kind(ChannelType::News), ChannelKind::Text);
        assert_eq!(channel_kind(ChannelType::Stage), ChannelKind::Voice);
        assert_eq!(channel_kind(ChannelType::Category), ChannelKind::Category);
        assert_eq!(channel_kind(ChannelType::Forum), ChannelKind::Other);
    }
}
