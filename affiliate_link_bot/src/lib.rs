//! Source code for a Flipkart affiliate link bot.
//!
//! Users DM the bot their affiliate sub-id token once, then send it
//! messages with Flipkart links; the bot rewrites every link into a
//! `dl.flipkart.com` deep link carrying the affiliate parameters, shortens
//! it if the shortener cooperates, and optionally reposts it to the user's
//! channel.

/// Link extraction and affiliate query rewriting.
pub mod links;

/// Best-effort link shortening.
pub mod shortener;

/// The user record store.
pub mod storage;

/// Various types used throughout.
pub mod types;

/// Functions that handle events from Telegram.
mod handlers;

/// Entry function that starts the bot.
mod entry;
pub use entry::*;

/// The merchant-assigned affiliate identifier of the operator. Every
/// rewritten link carries this as `affid`.
pub static AFFILIATE_ID: &str = "bh7162";

/// Where the user records live.
pub static USERS_FILE: &str = "users.json";
