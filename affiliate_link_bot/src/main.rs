use bot_commons::*;

fn main() {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "WARNING,affiliate_link_bot=debug");
    }
    start_everything(affiliate_link_bot::entry());
}
