//! Chat transport seam.
//!
//! Everything the relay needs from the chat protocol goes through
//! [`ChatApi`], so handlers and the publisher can be driven by a test double.

pub mod client;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub use self::client::BotClient;
pub use self::types::{Message, OutgoingMessage, Update, User};

#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Identity of the bot, also validates the credential
    async fn get_me(&self) -> Result<User>;

    /// Long-polls for updates with an id of at least `offset`
    async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>>;

    async fn send_message(&self, msg: OutgoingMessage) -> Result<()>;

    async fn leave_chat(&self, chat_id: i64) -> Result<()>;
}
