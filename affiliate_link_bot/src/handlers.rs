use std::sync::Arc;

use reqwest::Client;
use teloxide::{
    prelude::*,
    types::{BotCommand, Me, User},
    RequestError,
};

use crate::{
    links, shortener,
    storage::{self, UserRecord, UserStore},
    types::ChannelTarget,
    AFFILIATE_ID,
};

static HELP: &str = "\
This bot rewrites Flipkart links into affiliate deep links.

Step 1: send your token. It goes into affExtParam1 of every link.
Step 2 (optional): link a channel with /setchannel @name or /setchannel -100<id>, \
and rewritten links get posted there too.
Step 3: send messages containing Flipkart links.

Commands:
/settoken <token> - set or replace your token
/setchannel <@name or id> - link a channel
/removechannel - unlink the channel
/testchannel - check that the bot can post to your channel";

static SAVE_FAILED: &str = "Failed to save your data. Try again later.";

pub fn generate_bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "how to use this bot"),
        BotCommand::new("settoken", "set or replace your affiliate token"),
        BotCommand::new("setchannel", "link a channel to repost links to"),
        BotCommand::new("removechannel", "unlink the channel"),
        BotCommand::new("testchannel", "check that the bot can post to your channel"),
    ]
}

/// What feeding one plain-text message through the token/link flow did.
/// Computed separately from replying so that the flow is testable.
#[derive(Debug, PartialEq, Eq)]
enum TextAction {
    /// First contact: the message itself was captured as the token.
    TokenSaved,
    /// The user has a token but the message had no usable links.
    NoLinks,
    /// Links were rewritten; they still want shortening and delivery.
    Links {
        rewritten: Vec<String>,
        channel: Option<ChannelTarget>,
    },
}

/// The token/link state machine, sans Telegram. A user with no record
/// gets their first message saved as their token; afterwards messages are
/// treated as link-rewrite requests.
async fn ingest_text(
    store: &dyn UserStore,
    user_id: UserId,
    username: String,
    text: &str,
) -> Result<TextAction, storage::Error> {
    let Some(record) = store.get(user_id).await? else {
        store
            .put(user_id, UserRecord::new(username, text.to_string()))
            .await?;
        return Ok(TextAction::TokenSaved);
    };

    let found = links::extract_links(text);
    if found.is_empty() {
        return Ok(TextAction::NoLinks);
    }

    let rewritten = found
        .into_iter()
        .map(|link| {
            // Not-quite-URLs degrade to being passed through untouched.
            links::rewrite_link(&link, AFFILIATE_ID, Some(&record.token), None)
                .unwrap_or(link)
        })
        .collect();

    let channel = record
        .channel_id
        .as_deref()
        .and_then(ChannelTarget::parse);

    Ok(TextAction::Links { rewritten, channel })
}

async fn set_token(
    store: &dyn UserStore,
    user_id: UserId,
    username: String,
    token: &str,
) -> Result<(), storage::Error> {
    let mut record = match store.get(user_id).await? {
        Some(record) => record,
        None => UserRecord::new(username.clone(), String::new()),
    };
    record.username = username;
    record.token = token.to_string();
    store.put(user_id, record).await
}

/// Result of trying to link a channel to a user.
#[derive(Debug, PartialEq, Eq)]
enum LinkChannelOutcome {
    /// They haven't sent a token yet, so there's no record to attach to.
    NoRecord,
    Linked,
}

async fn link_channel(
    store: &dyn UserStore,
    user_id: UserId,
    target: &ChannelTarget,
) -> Result<LinkChannelOutcome, storage::Error> {
    let Some(mut record) = store.get(user_id).await? else {
        return Ok(LinkChannelOutcome::NoRecord);
    };
    record.channel_id = Some(target.to_string());
    store.put(user_id, record).await?;
    Ok(LinkChannelOutcome::Linked)
}

/// Unlink the user's channel. Returns whether one was linked at all.
async fn unlink_channel(store: &dyn UserStore, user_id: UserId) -> Result<bool, storage::Error> {
    let Some(mut record) = store.get(user_id).await? else {
        return Ok(false);
    };
    if record.channel_id.take().is_none() {
        return Ok(false);
    }
    store.put(user_id, record).await?;
    Ok(true)
}

/// Splits `/command params` into a lowercased command with any `@botname`
/// suffix trimmed, and the params. [`None`] if this isn't a command.
fn split_command<'a>(text: &'a str, bot_username: &str) -> Option<(String, &'a str)> {
    if !text.starts_with('/') {
        return None;
    }
    let command = text.split_whitespace().next()?;
    let params = text[command.len()..].trim_start();

    let at_username = format!("@{bot_username}");
    let command = command.trim_end_matches(at_username.as_str()).to_lowercase();

    Some((command, params))
}

fn channel_post_failed_text(target: &ChannelTarget, error: &RequestError) -> String {
    format!(
        "Could not post to {target}:\n{error}\n\n\
        Make sure the bot is added to the channel (not a group) \
        and is an admin with the \"Post Messages\" permission."
    )
}

pub async fn handle_message(
    bot: Bot,
    me: Me,
    message: Message,
    store: Arc<dyn UserStore>,
    http: Client,
) -> Result<(), RequestError> {
    // This bot only works over DMs.
    if !message.chat.is_private() {
        return Ok(());
    }
    let Some(user) = message.from.clone() else {
        return Ok(());
    };
    let Some(text) = message.text() else {
        return Ok(());
    };
    let text = text.trim();

    if text.starts_with('/') {
        if !handle_command(&bot, &me, &message, &user, store.as_ref(), text).await? {
            // Unknown command. Don't let a typo'd command become a token.
            bot.send_message(message.chat.id, HELP).await?;
        }
        return Ok(());
    }

    handle_text(&bot, &message, &user, store.as_ref(), &http, text).await
}

/// Returns `true` if a command was parsed and responded to.
async fn handle_command(
    bot: &Bot,
    me: &Me,
    message: &Message,
    user: &User,
    store: &dyn UserStore,
    text: &str,
) -> Result<bool, RequestError> {
    let Some((command, params)) = split_command(text, me.username()) else {
        return Ok(false);
    };
    let chat_id = message.chat.id;

    match command.as_str() {
        "/start" | "/help" => {
            bot.send_message(chat_id, HELP).await?;
        }
        "/settoken" => {
            if params.is_empty() {
                bot.send_message(chat_id, "Usage: /settoken <token>").await?;
                return Ok(true);
            }
            let reply = match set_token(
                store,
                user.id,
                bot_commons::user_handle(user),
                params,
            )
            .await
            {
                Ok(()) => "Token saved. Send Flipkart links to rewrite them.".to_string(),
                Err(error) => {
                    log::error!("Failed to save token for {}: {error}", user.id);
                    SAVE_FAILED.to_string()
                }
            };
            bot.send_message(chat_id, reply).await?;
        }
        "/setchannel" => {
            if params.is_empty() {
                bot.send_message(chat_id, "Usage: /setchannel @name, or /setchannel -100<id>")
                    .await?;
                return Ok(true);
            }
            let Some(target) = ChannelTarget::parse(params) else {
                bot.send_message(
                    chat_id,
                    "That doesn't look like a channel. \
                    Use a public @username, or a numeric id starting with -100.",
                )
                .await?;
                return Ok(true);
            };
            let reply = match link_channel(store, user.id, &target).await {
                Ok(LinkChannelOutcome::Linked) => format!(
                    "Channel linked: {target}\n\
                    Rewritten links will also be posted there. Try /testchannel."
                ),
                Ok(LinkChannelOutcome::NoRecord) => {
                    "Send your token first, then link the channel.".to_string()
                }
                Err(error) => {
                    log::error!("Failed to link channel for {}: {error}", user.id);
                    SAVE_FAILED.to_string()
                }
            };
            bot.send_message(chat_id, reply).await?;
        }
        "/removechannel" => {
            let reply = match unlink_channel(store, user.id).await {
                Ok(true) => "Channel unlinked.".to_string(),
                Ok(false) => "No channel is linked.".to_string(),
                Err(error) => {
                    log::error!("Failed to unlink channel for {}: {error}", user.id);
                    SAVE_FAILED.to_string()
                }
            };
            bot.send_message(chat_id, reply).await?;
        }
        "/testchannel" => {
            let target = match store.get(user.id).await {
                Ok(record) => record
                    .and_then(|r| r.channel_id)
                    .as_deref()
                    .and_then(ChannelTarget::parse),
                Err(error) => {
                    log::warn!("Failed to read record for {}: {error}", user.id);
                    None
                }
            };
            let Some(target) = target else {
                bot.send_message(chat_id, "No channel is linked. Use /setchannel first.")
                    .await?;
                return Ok(true);
            };
            match bot
                .send_message(target.recipient(), "Test post from the affiliate link bot.")
                .await
            {
                Ok(_) => {
                    bot.send_message(chat_id, format!("Posted a test message to {target}."))
                        .await?;
                }
                Err(error) => {
                    log::info!("Test post to {target} failed: {error}");
                    bot.send_message(chat_id, channel_post_failed_text(&target, &error))
                        .await?;
                }
            }
        }
        _ => return Ok(false),
    }

    Ok(true)
}

async fn handle_text(
    bot: &Bot,
    message: &Message,
    user: &User,
    store: &dyn UserStore,
    http: &Client,
    text: &str,
) -> Result<(), RequestError> {
    let chat_id = message.chat.id;

    let action = match ingest_text(store, user.id, bot_commons::user_handle(user), text).await {
        Ok(action) => action,
        Err(error) => {
            log::error!("Failed to update record for {}: {error}", user.id);
            bot.send_message(chat_id, SAVE_FAILED).await?;
            return Ok(());
        }
    };

    match action {
        TextAction::TokenSaved => {
            bot.send_message(
                chat_id,
                "Token saved. Now send Flipkart links, \
                or link a channel with /setchannel.",
            )
            .await?;
        }
        TextAction::NoLinks => {
            bot.send_message(chat_id, "No links found.").await?;
        }
        TextAction::Links { rewritten, channel } => {
            let mut shortened = Vec::with_capacity(rewritten.len());
            for link in &rewritten {
                shortened.push(shortener::shorten(http, link).await);
            }
            let reply = shortened.join("\n\n");

            bot.send_message(chat_id, reply.as_str()).await?;

            if let Some(target) = channel {
                if let Err(error) = bot.send_message(target.recipient(), reply.as_str()).await {
                    log::info!("Channel post to {target} failed: {error}");
                    bot.send_message(chat_id, channel_post_failed_text(&target, &error))
                        .await?;
                }
            }
        }
    }

    Ok(())
}
