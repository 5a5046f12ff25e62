use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::hookrelay::allowlist::{AllowList, AllowOutcome};
use crate::hookrelay::idset::is_storable;
use crate::hookrelay::subscriptions::SubscriptionManager;
use crate::hookrelay::telegram::types::{CallbackQuery, ChosenInlineResult, InlineQuery};
use crate::hookrelay::telegram::{ChatApi, Message, OutgoingMessage};

pub const REPLY_SUBSCRIBED: &str = "Subscribed. Every request hitting the relay will be forwarded to you.";
pub const REPLY_ALREADY_SUBSCRIBED: &str = "You are already subscribed.";
pub const REPLY_NOT_ALLOWED: &str = "You are not allowed to subscribe. Ask the administrator to add your id.";
pub const REPLY_UNSUBSCRIBED: &str = "Unsubscribed. You will no longer receive messages.";
pub const REPLY_NEVER_SUBSCRIBED: &str = "You were not subscribed.";
pub const REPLY_NOT_PRIVILEGED: &str = "Only the administrator can change the allow-list.";
pub const REPLY_TRY_LATER: &str = "Something went wrong, please try again later.";

/// Routes inbound chat traffic to the subscription and allow-list state
pub struct CommandDispatcher {
    api: Arc<dyn ChatApi>,
    pub subscriptions: Arc<SubscriptionManager>,
    pub allowlist: Arc<AllowList>,
    bot_id: i64,
}

impl CommandDispatcher {
    pub fn new(
        api: Arc<dyn ChatApi>,
        subscriptions: Arc<SubscriptionManager>,
        allowlist: Arc<AllowList>,
        bot_id: i64,
    ) -> Self {
        Self {
            api,
            subscriptions,
            allowlist,
            bot_id,
        }
    }

    /// Called for every inbound message
    pub async fn handle_message(&self, msg: &Message) {
        if msg.from.as_ref().map(|u| u.id) == Some(self.bot_id) {
            debug!("Ignoring own message {}", msg.message_id);
            return;
        }

        if !msg.chat.is_private() {
            info!("Leaving non-private chat {} ({})", msg.chat.id, msg.chat.kind);
            if let Err(e) = self.api.leave_chat(msg.chat.id).await {
                error!("Failed to leave chat {}: {}", msg.chat.id, e);
            }
            return;
        }

        if msg.is_command() {
            let reply = match msg.command().map(str::to_lowercase).as_deref() {
                Some("start") => self.cmd_start(msg).await,
                Some("stop") => self.cmd_stop(msg).await,
                Some("whoami") => self.cmd_whoami(msg),
                Some("help") | Some("settings") => None,
                Some("addid") if self.allowlist.has_admin() => self.cmd_addid(msg).await,
                Some("rmid") if self.allowlist.has_admin() => self.cmd_rmid(msg).await,
                _ => self.cmd_easter_egg(msg),
            };
            if let Some(text) = reply {
                self.reply(msg, text).await;
            }
            return;
        }

        if let Some(original) = &msg.reply_to_message {
            if original.text().is_empty() || msg.text().is_empty() {
                error!("Message empty");
            }
            return;
        }

        if msg.text().is_empty() {
            debug!("Non-text message: {:?}", msg);
            return;
        }

        self.message_easter_egg(msg);
    }

    async fn cmd_start(&self, msg: &Message) -> Option<String> {
        let id = sender_id(msg);
        if !self.allowlist.permits_subscription(&id) {
            info!("Refused subscription of {} ({})", id, username(msg));
            return Some(REPLY_NOT_ALLOWED.to_string());
        }

        let reply = match self.subscriptions.subscribe(&id).await {
            Ok(true) => {
                info!("New user: @{}", username(msg));
                REPLY_SUBSCRIBED
            }
            Ok(false) => REPLY_ALREADY_SUBSCRIBED,
            Err(e) => {
                error!("Failed to persist subscription of {}: {}", id, e);
                REPLY_TRY_LATER
            }
        };
        Some(reply.to_string())
    }

    async fn cmd_stop(&self, msg: &Message) -> Option<String> {
        let id = sender_id(msg);
        let reply = match self.subscriptions.unsubscribe(&id).await {
            Ok(true) => {
                info!("Remove user: @{}", username(msg));
                REPLY_UNSUBSCRIBED
            }
            Ok(false) => REPLY_NEVER_SUBSCRIBED,
            Err(e) => {
                error!("Failed to persist unsubscription of {}: {}", id, e);
                REPLY_TRY_LATER
            }
        };
        Some(reply.to_string())
    }

    fn cmd_whoami(&self, msg: &Message) -> Option<String> {
        let id = sender_id(msg);
        let status = if self.subscriptions.is_subscribed(&id) {
            "subscribed"
        } else {
            "not subscribed"
        };
        Some(format!("Your id is {}. You are {}.", id, status))
    }

    async fn cmd_addid(&self, msg: &Message) -> Option<String> {
        let target = msg.command_arguments();
        if !is_storable(target) {
            return Some("Usage: /addid <id>".to_string());
        }
        let reply = match self.allowlist.allow(&sender_id(msg), target).await {
            Ok(AllowOutcome::Added) => format!("{} added to the allow-list.", target),
            Ok(AllowOutcome::AlreadyPresent) => format!("{} is already on the allow-list.", target),
            Ok(AllowOutcome::Rejected) => REPLY_NOT_PRIVILEGED.to_string(),
            Ok(other) => {
                warn!("Unexpected allow outcome {:?}", other);
                REPLY_TRY_LATER.to_string()
            }
            Err(e) => {
                error!("Failed to persist allow-list addition of {}: {}", target, e);
                REPLY_TRY_LATER.to_string()
            }
        };
        Some(reply)
    }

    async fn cmd_rmid(&self, msg: &Message) -> Option<String> {
        let target = msg.command_arguments();
        if !is_storable(target) {
            return Some("Usage: /rmid <id>".to_string());
        }
        let reply = match self.allowlist.disallow(&sender_id(msg), target).await {
            Ok(AllowOutcome::Removed) => format!("{} removed from the allow-list.", target),
            Ok(AllowOutcome::NotPresent) => format!("{} is not on the allow-list.", target),
            Ok(AllowOutcome::Rejected) => REPLY_NOT_PRIVILEGED.to_string(),
            Ok(other) => {
                warn!("Unexpected disallow outcome {:?}", other);
                REPLY_TRY_LATER.to_string()
            }
            Err(e) => {
                error!("Failed to persist allow-list removal of {}: {}", target, e);
                REPLY_TRY_LATER.to_string()
            }
        };
        Some(reply)
    }

    /// Unknown commands land here. Never touches subscriber state.
    fn cmd_easter_egg(&self, msg: &Message) -> Option<String> {
        debug!("Unknown command {:?} from {}", msg.command(), msg.chat.id);
        None
    }

    fn message_easter_egg(&self, msg: &Message) {
        debug!("Plain message from {}: {} chars", msg.chat.id, msg.text().chars().count());
    }

    pub async fn handle_inline_query(&self, query: &InlineQuery) {
        debug!("Inline query {} from {}", query.id, query.from.id);
    }

    pub async fn handle_chosen_result(&self, result: &ChosenInlineResult) {
        debug!("Chosen inline result {} from {}", result.result_id, result.from.id);
    }

    pub async fn handle_callback(&self, query: &CallbackQuery) {
        debug!("Callback query {} from {}", query.id, query.from.id);
    }

    pub async fn handle_channel_post(&self, post: &Message) {
        debug!("Channel post {} in {}", post.message_id, post.chat.id);
    }

    async fn reply(&self, msg: &Message, text: String) {
        if let Err(e) = self.api.send_message(OutgoingMessage::new(msg.chat.id, text)).await {
            warn!("Failed to reply to {}: {}", msg.chat.id, e);
        }
    }
}

/// Private chats share their id with the sender, so the chat id is the identity
fn sender_id(msg: &Message) -> String {
    msg.chat.id.to_string()
}

fn username(msg: &Message) -> &str {
    msg.chat
        .username
        .as_deref()
        .or_else(|| msg.from.as_ref().and_then(|u| u.username.as_deref()))
        .unwrap_or("unknown")
}
