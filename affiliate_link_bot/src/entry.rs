use std::{fs, sync::Arc};

use teloxide::{dptree::deps, prelude::*};

use crate::{
    handlers::{self, generate_bot_commands},
    shortener,
    storage::{JsonFileStore, UserStore},
};

/// # Panics
///
/// Panics if there's no key file, or any other part of startup fails.
pub async fn entry() {
    log::info!("ASYNC WOOOO");
    let key = fs::read_to_string(match cfg!(debug_assertions) {
        true => "key_debug",
        false => "key",
    })
    .expect("Could not load bot key file!");

    let bot = Bot::new(key);

    bot.set_my_commands(generate_bot_commands())
        .await
        .expect("Failed to set bot commands!");

    let store: Arc<dyn UserStore> =
        Arc::new(JsonFileStore::load(crate::USERS_FILE).expect("Failed to open the user store!"));

    let http = shortener::client().expect("Failed to build the HTTP client!");

    log::info!("Creating the handler...");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    log::info!("Dispatching the dispatcher!");

    Dispatcher::builder(bot, handler)
        .default_handler(|_| async {})
        .dependencies(deps![store, http])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("it appears we have been bonked.");
}
