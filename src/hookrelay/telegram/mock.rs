use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ErrorCode, RelayError, Result};
use super::types::{OutgoingMessage, Update, User};
use super::ChatApi;

/// Records every outbound call. Sends to chats in `fail_for` fail.
#[derive(Default)]
pub(crate) struct RecordingApi {
    pub(crate) me: User,
    pub(crate) fail_for: HashSet<i64>,
    pub(crate) attempts: Mutex<Vec<i64>>,
    pub(crate) sent: Mutex<Vec<OutgoingMessage>>,
    pub(crate) left: Mutex<Vec<i64>>,
    pub(crate) updates: Mutex<VecDeque<Result<Vec<Update>>>>,
    pub(crate) offsets: Mutex<Vec<i64>>,
}

impl RecordingApi {
    pub(crate) fn new(bot_id: i64) -> Self {
        Self {
            me: User {
                id: bot_id,
                is_bot: true,
                first_name: "relay".into(),
                username: Some("relay_bot".into()),
            },
            ..Self::default()
        }
    }

    pub(crate) fn failing_for(mut self, chat_ids: impl IntoIterator<Item = i64>) -> Self {
        self.fail_for.extend(chat_ids);
        self
    }

    pub(crate) fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn replies_to(&self, chat_id: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|m| m.chat_id == chat_id)
            .map(|m| m.text)
            .collect()
    }

    pub(crate) fn push_updates(&self, batch: Result<Vec<Update>>) {
        self.updates.lock().unwrap().push_back(batch);
    }
}

#[async_trait]
impl ChatApi for RecordingApi {
    async fn get_me(&self) -> Result<User> {
        Ok(self.me.clone())
    }

    async fn get_updates(&self, offset: i64, _timeout: Duration) -> Result<Vec<Update>> {
        self.offsets.lock().unwrap().push(offset);
        let next = self.updates.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => {
                // Behave like an idle long-poll
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn send_message(&self, msg: OutgoingMessage) -> Result<()> {
        self.attempts.lock().unwrap().push(msg.chat_id);
        if self.fail_for.contains(&msg.chat_id) {
            return Err(RelayError::new(ErrorCode::SendFailed, "bot was blocked by the user"));
        }
        self.sent.lock().unwrap().push(msg);
        Ok(())
    }

    async fn leave_chat(&self, chat_id: i64) -> Result<()> {
        self.left.lock().unwrap().push(chat_id);
        Ok(())
    }
}
