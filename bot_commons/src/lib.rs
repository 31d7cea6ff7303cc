//! Bits shared between my bots: logging+runtime bootstrap and a few
//! Telegram helpers that every bot ends up wanting anyway.

use std::future::Future;

use teloxide::types::User;

/// Initialize logging and run the `closure` to completion in an async
/// runtime. Logging defaults to level `info` unless overridden by the
/// `RUST_LOG` environment variable; formatting is done by
/// [pretty_env_logger][], see its documentation for the filter syntax.
///
/// Timestamps are skipped when running under systemd, since the journal
/// adds its own.
///
/// [pretty_env_logger]: https://docs.rs/pretty_env_logger
pub fn start_everything(closure: impl Future<Output = ()>) {
    let log_level = std::env::var_os("RUST_LOG")
        .unwrap_or_else(|| std::ffi::OsString::from("info"))
        .into_string()
        .unwrap_or_else(|_| String::from("info"));

    let running_as_systemd_service = std::env::var_os("JOURNAL_STREAM").is_some();

    let mut builder = match running_as_systemd_service {
        true => pretty_env_logger::formatted_builder(),
        false => pretty_env_logger::formatted_timed_builder(),
    };

    builder.parse_filters(&log_level);

    if builder.try_init().is_err() {
        log::error!("Tried to init logger twice!");
    }

    log::info!("hi");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build the async runtime")
        .block_on(closure);
}

/// A handle for a user that is always present: their `@`-less username if
/// they have one, or `user_<id>` if they don't.
#[must_use]
pub fn user_handle(user: &User) -> String {
    if let Some(username) = &user.username {
        username.clone()
    } else {
        format!("user_{}", user.id)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use teloxide::types::UserId;

    fn test_user(username: Option<&str>) -> User {
        User {
            id: UserId(1337),
            is_bot: false,
            first_name: "Test".to_string(),
            last_name: None,
            username: username.map(ToString::to_string),
            language_code: None,
            is_premium: false,
            added_to_attachment_menu: false,
        }
    }

    #[test]
    fn user_handle_prefers_username() {
        assert_eq!(user_handle(&test_user(Some("amogus"))), "amogus");
    }

    #[test]
    fn user_handle_falls_back_to_id() {
        assert_eq!(user_handle(&test_user(None)), "user_1337");
    }
}
