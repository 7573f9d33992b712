//! Thread manager integration tests
//! Run with: cargo test --test thread_manager_test

use std::sync::Arc;

use escape_roomba::application::messaging::{Context, Event, EventDispatcher};
use escape_roomba::application::services::thread_channel::{thread_topic, THREAD_EMOJI};
use escape_roomba::application::services::ThreadManager;
use escape_roomba::domain::entities::{Channel, Message, NewChannel, User};
use escape_roomba::domain::traits::ChatPlatform;
use escape_roomba::infrastructure::adapters::MemoryPlatform;

struct World {
    platform: Arc<MemoryPlatform>,
    manager: Arc<ThreadManager>,
    dispatcher: EventDispatcher,
    ctx: Context,
    origin_channel: Channel,
    origin: Message,
    member: User,
}

impl World {
    fn new() -> Self {
        let platform = Arc::new(MemoryPlatform::seeded());
        let manager = Arc::new(ThreadManager::new());
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(manager.clone());
        let ctx = Context::new(platform.clone());

        let guild = platform.guilds()[0].clone();
        let origin_channel = platform.guild_channels(guild.id)[0].clone();
        let origin = platform.history(origin_channel.id)[0].clone();
        let member = platform.members(guild.id)[0].clone();
        Self { platform, manager, dispatcher, ctx, origin_channel, origin, member }
    }

    async fn run(&self) {
        self.platform.run_events(&self.dispatcher, &self.ctx).await;
    }

    async fn react(&self, delta: i32) {
        self.platform
            .sim_reaction(self.origin_channel.id, self.origin.id, THREAD_EMOJI, &self.member, delta)
            .unwrap();
        self.run().await;
    }

    fn channels(&self) -> Vec<Channel> {
        self.platform.guild_channels(self.origin_channel.guild_id.unwrap())
    }

    async fn ready(&self) {
        self.platform.queue_event(Event::Ready);
        self.run().await;
    }
}

#[tokio::test]
async fn test_thread_creation() {
    let world = World::new();
    world.ready().await;
    assert_eq!(world.manager.thread_count(), 0);

    world.react(1).await;

    // The thread channel was added at the end of the guild.
    let channels = world.channels();
    assert_eq!(channels.len(), 2);
    let thread = channels.last().unwrap();
    assert!(thread.name.starts_with(THREAD_EMOJI));
    assert_eq!(thread.name, "🧵Mock-message-0-in…");
    assert_eq!(
        thread.topic.as_deref(),
        Some(thread_topic(world.member.id, world.origin_channel.id, world.origin.id).as_str())
    );
    assert_eq!(
        world.manager.thread_for_origin(world.origin_channel.id, world.origin.id),
        Some(thread.id)
    );

    // The intro mirrors the origin message.
    let intro = world.platform.history(thread.id);
    assert_eq!(intro.len(), 1);
    assert_eq!(intro[0].author.id, world.platform.current_user().id);
    assert_eq!(intro[0].content, "");
    let embed = &intro[0].embeds[0];
    assert_eq!(embed.author_name.as_deref(), Some("Mock Member 0"));
    let description = embed.description.as_deref().unwrap();
    assert!(description.starts_with("Mock message 0 in #mock-channel-0\n\u{a0}\n🧵 [original message]("));
    assert!(description.ends_with(&format!("in <#{}> by <@{}>", world.origin_channel.id, world.member.id)));

    // The bot piled on to the 🧵.
    let origin = world
        .platform
        .fetch_message(world.origin_channel.id, world.origin.id)
        .await
        .unwrap();
    let rx = origin.reaction(THREAD_EMOJI).unwrap();
    assert_eq!((rx.count, rx.me), (2, true));
}

#[tokio::test]
async fn test_second_reaction_reuses_thread() {
    let world = World::new();
    world.ready().await;
    world.react(1).await;

    let guild_id = world.origin_channel.guild_id.unwrap();
    let other = world.platform.add_member(guild_id, "Mock Member 1", 1001);
    world
        .platform
        .sim_reaction(world.origin_channel.id, world.origin.id, THREAD_EMOJI, &other, 1)
        .unwrap();
    world.run().await;

    assert_eq!(world.channels().len(), 2);
    assert_eq!(world.manager.thread_count(), 1);
}

#[tokio::test]
async fn test_unreacting_deletes_empty_thread() {
    let world = World::new();
    world.ready().await;
    world.react(1).await;
    assert_eq!(world.manager.thread_count(), 1);

    world.react(-1).await;

    assert_eq!(world.channels().len(), 1);
    assert_eq!(world.manager.thread_count(), 0);
    let origin = world
        .platform
        .fetch_message(world.origin_channel.id, world.origin.id)
        .await
        .unwrap();
    assert!(origin.reaction(THREAD_EMOJI).is_none());
}

#[tokio::test]
async fn test_thread_with_replies_survives_origin_deletion() {
    let world = World::new();
    world.ready().await;
    world.react(1).await;
    let thread = world.channels().last().unwrap().clone();

    world.platform.post_message(thread.id, &world.member, "first!").unwrap();
    world.run().await;

    world
        .platform
        .sim_delete_message(world.origin_channel.id, world.origin.id)
        .unwrap();
    world.run().await;

    assert_eq!(world.channels().len(), 2);
    let intro = world.platform.history(thread.id);
    assert_eq!(
        intro[0].content,
        format!("🧵 original message in <#{}> was **deleted**", world.origin_channel.id)
    );
    assert!(intro[0].embeds.is_empty());
    assert_eq!(intro[1].content, "first!");
}

#[tokio::test]
async fn test_empty_thread_goes_with_origin() {
    let world = World::new();
    world.ready().await;
    world.react(1).await;

    world
        .platform
        .sim_delete_message(world.origin_channel.id, world.origin.id)
        .unwrap();
    world.run().await;

    assert_eq!(world.channels().len(), 1);
    assert_eq!(world.manager.thread_count(), 0);
}

#[tokio::test]
async fn test_existing_thread_attached_on_ready() {
    let world = World::new();
    let (cid, mid) = (world.origin_channel.id, world.origin.id);
    world.platform.sim_reaction(cid, mid, THREAD_EMOJI, &world.member, 1).unwrap();
    world.platform.add_reaction(cid, mid, THREAD_EMOJI).await.unwrap();
    let thread = world
        .platform
        .create_text_channel(
            world.origin_channel.guild_id.unwrap(),
            NewChannel {
                name: "🧵old-thread".to_string(),
                topic: thread_topic(world.member.id, cid, mid),
                parent_id: None,
                position: 1,
                reason: "Thread creation".to_string(),
            },
        )
        .await
        .unwrap();
    world.platform.take_events();

    world.ready().await;

    assert_eq!(world.manager.thread_for_origin(cid, mid), Some(thread.id));
    assert_eq!(world.channels().len(), 2);
    let intro = world.platform.history(thread.id);
    assert_eq!(intro.len(), 1);
    assert_eq!(intro[0].embeds[0].author_name.as_deref(), Some("Mock Member 0"));
}

#[tokio::test]
async fn test_history_scan_picks_up_missed_reactions() {
    let world = World::new();
    world
        .platform
        .sim_reaction(world.origin_channel.id, world.origin.id, THREAD_EMOJI, &world.member, 1)
        .unwrap();
    world.platform.take_events();

    world.ready().await;

    assert_eq!(world.channels().len(), 2);
    assert_eq!(world.manager.thread_count(), 1);
}

#[tokio::test]
async fn test_other_emoji_ignored() {
    let world = World::new();
    world.ready().await;
    world
        .platform
        .sim_reaction(world.origin_channel.id, world.origin.id, "🧶", &world.member, 1)
        .unwrap();
    world.run().await;

    assert_eq!(world.channels().len(), 1);
    assert_eq!(world.manager.thread_count(), 0);
}

#[tokio::test]
async fn test_thread_dropped_when_last_reply_goes_without_reaction() {
    let world = World::new();
    world.ready().await;
    world.react(1).await;
    let thread = world.channels().last().unwrap().clone();

    let reply = world.platform.post_message(thread.id, &world.member, "reply").unwrap();
    world.run().await;

    // The reply keeps the thread alive after the 🧵 goes.
    world.react(-1).await;
    assert_eq!(world.channels().len(), 2);
    assert_eq!(world.manager.thread_count(), 1);

    world.platform.sim_delete_message(thread.id, reply.id).unwrap();
    world.run().await;

    assert_eq!(world.channels().len(), 1);
    assert_eq!(world.manager.thread_count(), 0);
    let origin = world
        .platform
        .fetch_message(world.origin_channel.id, world.origin.id)
        .await
        .unwrap();
    assert!(origin.reaction(THREAD_EMOJI).is_none());
}

#[tokio::test]
async fn test_guild_scanned_once_per_session() {
    let world = World::new();
    let guild = world.platform.guilds()[0].clone();
    let scans = || world.platform.history_scans(world.origin_channel.id);

    // Startup: the guild shows up both on its own and in the ready sweep.
    world.platform.queue_event(Event::GuildAvailable(guild.clone()));
    world.platform.queue_event(Event::Ready);
    world.run().await;
    assert_eq!(scans(), 1);

    world.platform.queue_event(Event::GuildAvailable(guild.clone()));
    world.run().await;
    assert_eq!(scans(), 1);

    // Outage, then back.
    world.platform.queue_event(Event::GuildUnavailable(guild.id));
    world.platform.queue_event(Event::GuildAvailable(guild.clone()));
    world.run().await;
    assert_eq!(scans(), 2);

    // New session.
    world.platform.queue_event(Event::Disconnect);
    world.platform.queue_event(Event::Ready);
    world.run().await;
    assert_eq!(scans(), 3);

    world.platform.queue_event(Event::GuildJoin(guild));
    world.run().await;
    assert_eq!(scans(), 4);
}
