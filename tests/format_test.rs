//! Formatting integration tests
//! Run with: cargo test --test format_test

use escape_roomba::application::format::{fid, fobj};
use escape_roomba::domain::traits::ChatPlatform;
use escape_roomba::infrastructure::adapters::MemoryPlatform;

#[test]
fn test_fobj_resolves_ids() {
    let platform = MemoryPlatform::seeded();
    let p: &dyn ChatPlatform = &platform;

    let guild = platform.guilds()[0].clone();
    let channel = platform.guild_channels(guild.id)[0].clone();
    let member = platform.members(guild.id)[0].clone();

    assert_eq!(
        fobj(Some(p)).channel_id(channel.id).user_id(member.id).to_string(),
        "\"Mock Guild 0\" #mock-channel-0 (Mock Member 0#1000)"
    );
    assert_eq!(fobj(Some(p)).guild(&guild).to_string(), "\"Mock Guild 0\"");

    // Unknown IDs fall back to their timestamps.
    assert_eq!(
        fobj(Some(p)).user_id(0x9305ac7cb800000).to_string(),
        "u=<2020-01-02/03:04:05.678///>"
    );
}

#[test]
fn test_fobj_message_context() {
    let platform = MemoryPlatform::seeded();
    let p: &dyn ChatPlatform = &platform;
    let guild = platform.guilds()[0].clone();
    let channel = platform.guild_channels(guild.id)[0].clone();
    let message = platform.history(channel.id)[0].clone();

    assert_eq!(
        fobj(Some(p)).message(&message).to_string(),
        "\"Mock Guild 0\" #mock-channel-0 (Mock Member 0#1000): \"Mock message 0 in #m ...\""
    );
    assert_eq!(
        fobj(Some(p)).channel_id(channel.id).message_id(message.id).to_string(),
        format!("\"Mock Guild 0\" #mock-channel-0 m={}", fid(message.id))
    );
}

#[test]
fn test_fid_of_generated_ids() {
    let platform = MemoryPlatform::seeded();
    let guild = platform.guilds()[0].clone();
    assert!(fid(guild.id).starts_with("<2020-01-01/00:00:"));
    assert!(fid(guild.id).ends_with("///>"));
}
