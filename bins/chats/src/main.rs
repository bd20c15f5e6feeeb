//! Chat id lookup for tgrelay.
//!
//! Add the bot to a group or channel, post something there, then run this
//! binary. It prints every group and channel found in the bot's pending
//! updates so the id can be used as `group_id` or `GROUP_ID`.

use std::collections::BTreeMap;

use anyhow::{Context, bail};
use tgrelay_core::deploy::Credential;
use tgrelay_shared::AppConfig;
use tgrelay_telegram::{Chat, TelegramClient, Update};

/// Groups and channels seen in `updates`, one entry per chat id.
fn target_chats(updates: &[Update]) -> Vec<Chat> {
    let mut chats = BTreeMap::new();
    for chat in updates.iter().filter_map(Update::chat) {
        if chat.is_group_or_channel() {
            chats.insert(chat.id, chat.clone());
        }
    }
    chats.into_values().collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let Some(token) = config.telegram.bot_token.as_deref() else {
        bail!("BOT_TOKEN is not set; add it to .env or the environment");
    };
    let credential = Credential::parse(token).context("BOT_TOKEN is malformed")?;
    let client = TelegramClient::new(&config.telegram)?;

    let me = client.get_me(&credential).await?;
    println!(
        "Bot: {} (@{}, id {})",
        me.first_name,
        me.username.as_deref().unwrap_or("-"),
        me.id
    );

    let updates = client.get_updates(&credential).await?;
    let chats = target_chats(&updates);

    if chats.is_empty() {
        println!("No groups or channels found.");
        println!("  1. Add the bot to the group or channel");
        println!("  2. Allow it to post messages");
        println!("  3. Send any message there and run this again");
        return Ok(());
    }

    println!("{}", "=".repeat(60));
    for chat in &chats {
        println!("Name:     {}", chat.title.as_deref().unwrap_or("-"));
        println!("ID:       {}", chat.id);
        println!("Type:     {}", chat.kind);
        println!(
            "Username: {}",
            chat.username
                .as_deref()
                .map_or_else(|| "-".to_string(), |u| format!("@{u}"))
        );
        println!("{}", "-".repeat(60));
    }
    println!("Use one of the ids above as group_id, e.g. group_id={}", chats[0].id);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_chats_dedups_and_filters() {
        let updates: Vec<Update> = serde_json::from_value(serde_json::json!([
            { "update_id": 1, "message": { "message_id": 1, "chat": { "id": -100, "type": "supergroup", "title": "QA" } } },
            { "update_id": 2, "message": { "message_id": 2, "chat": { "id": -100, "type": "supergroup", "title": "QA" } } },
            { "update_id": 3, "message": { "message_id": 3, "chat": { "id": 7, "type": "private" } } },
            { "update_id": 4, "channel_post": { "message_id": 4, "chat": { "id": -200, "type": "channel", "title": "Releases" } } }
        ]))
        .expect("updates");

        let ids: Vec<i64> = target_chats(&updates).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![-200, -100]);
    }
}
