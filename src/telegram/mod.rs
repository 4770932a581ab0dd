pub mod bot;
pub mod client;
pub mod commands;

pub use bot::run_bot;
pub use client::TelegramClient;
