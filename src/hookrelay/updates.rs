use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorCode, RelayError, Result};
use crate::hookrelay::backoff::BackoffPolicy;
use crate::hookrelay::handler::CommandDispatcher;
use crate::hookrelay::telegram::types::{CallbackQuery, ChosenInlineResult, InlineQuery};
use crate::hookrelay::telegram::{ChatApi, Message, Update};

/// Longer inline queries are not answered
pub const MAX_INLINE_QUERY_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    Message(Message),
    InlineQuery(InlineQuery),
    ChosenInlineResult(ChosenInlineResult),
    CallbackQuery(CallbackQuery),
    ChannelPost(Message),
}

/// Picks the first populated payload, in protocol priority order
pub fn classify(update: Update) -> Option<UpdateKind> {
    if let Some(msg) = update.message {
        return Some(UpdateKind::Message(msg));
    }
    if let Some(query) = update.inline_query {
        if query.query.len() <= MAX_INLINE_QUERY_LEN {
            return Some(UpdateKind::InlineQuery(query));
        }
    }
    if let Some(result) = update.chosen_inline_result {
        return Some(UpdateKind::ChosenInlineResult(result));
    }
    if let Some(query) = update.callback_query {
        return Some(UpdateKind::CallbackQuery(query));
    }
    update.channel_post.map(UpdateKind::ChannelPost)
}

pub async fn route(dispatcher: &CommandDispatcher, kind: UpdateKind) {
    match kind {
        UpdateKind::Message(msg) => dispatcher.handle_message(&msg).await,
        UpdateKind::InlineQuery(query) => dispatcher.handle_inline_query(&query).await,
        UpdateKind::ChosenInlineResult(result) => dispatcher.handle_chosen_result(&result).await,
        UpdateKind::CallbackQuery(query) => dispatcher.handle_callback(&query).await,
        UpdateKind::ChannelPost(post) => dispatcher.handle_channel_post(&post).await,
    }
}

/// Long-polls the chat API and runs every update as its own task
pub struct UpdateLoop {
    api: Arc<dyn ChatApi>,
    dispatcher: Arc<CommandDispatcher>,
    permits: Arc<Semaphore>,
    poll_timeout: Duration,
    max_retries: u32,
    backoff: BackoffPolicy,
}

impl UpdateLoop {
    pub fn new(api: Arc<dyn ChatApi>, dispatcher: Arc<CommandDispatcher>, max_concurrent: usize) -> Self {
        Self {
            api,
            dispatcher,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            poll_timeout: Duration::from_secs(60),
            max_retries: 5,
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Consecutive failed polls tolerated before giving up; 0 fails on the first one
    pub fn with_retries(mut self, max_retries: u32, backoff: BackoffPolicy) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    /// Runs until cancelled, or until polling keeps failing
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        info!("Update loop started (poll timeout {:?})", self.poll_timeout);
        let mut offset = 0i64;
        let mut failures = 0u32;

        loop {
            let batch = tokio::select! {
                _ = shutdown.cancelled() => break,
                batch = self.api.get_updates(offset, self.poll_timeout) => batch,
            };

            match batch {
                Ok(updates) => {
                    failures = 0;
                    if !updates.is_empty() {
                        debug!("Received {} updates", updates.len());
                    }
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        if !self.dispatch(update, &shutdown).await {
                            info!("Update loop stopped while waiting for a handler slot");
                            return Ok(());
                        }
                    }
                }
                Err(e) => {
                    if failures >= self.max_retries {
                        error!("Giving up on update retrieval after {} retries: {}", failures, e);
                        return Err(RelayError::new(
                            ErrorCode::TransportFailed,
                            format!("update retrieval failed: {}", e),
                        ));
                    }
                    let delay = self.backoff.next(failures);
                    failures += 1;
                    warn!("Update retrieval failed ({}/{}), retrying in {:?}: {}", failures, self.max_retries, delay, e);

                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!("Update loop stopped");
        Ok(())
    }

    /// Returns false when shutdown arrived before a handler slot freed up
    async fn dispatch(&self, update: Update, shutdown: &CancellationToken) -> bool {
        let update_id = update.update_id;
        let Some(kind) = classify(update) else {
            debug!("Ignoring update {} without a handled payload", update_id);
            return true;
        };

        // Waits here once every permit is in use
        let permit = tokio::select! {
            _ = shutdown.cancelled() => return false,
            permit = self.permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return false,
            },
        };
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            let _permit = permit;
            route(&dispatcher, kind).await;
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hookrelay::allowlist::AllowList;
    use crate::hookrelay::store::MemoryStore;
    use crate::hookrelay::subscriptions::SubscriptionManager;
    use crate::hookrelay::telegram::mock::RecordingApi;
    use crate::hookrelay::telegram::types::{Chat, MessageEntity, User};

    fn start_update(update_id: i64, chat: i64) -> Update {
        Update {
            update_id,
            message: Some(Message {
                message_id: update_id,
                from: Some(User { id: chat, ..User::default() }),
                chat: Chat { id: chat, kind: "private".into(), ..Chat::default() },
                text: Some("/start".into()),
                entities: vec![MessageEntity { kind: "bot_command".into(), offset: 0, length: 6 }],
                reply_to_message: None,
            }),
            ..Update::default()
        }
    }

    async fn dispatcher(api: Arc<RecordingApi>) -> Arc<CommandDispatcher> {
        let store = Arc::new(MemoryStore::new());
        let subscriptions = Arc::new(SubscriptionManager::load(store.clone()).await);
        let allowlist = Arc::new(AllowList::load(store, None, false).await);
        Arc::new(CommandDispatcher::new(api, subscriptions, allowlist, 999))
    }

    fn no_wait() -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(1),
            max: Duration::from_millis(1),
            factor: 1.0,
            jitter: false,
        }
    }

    #[test]
    fn oversized_inline_queries_are_dropped() {
        let query = |text: &str| Update {
            update_id: 1,
            inline_query: Some(InlineQuery {
                id: "q".into(),
                from: User::default(),
                query: text.into(),
            }),
            ..Update::default()
        };

        assert!(matches!(classify(query("short")), Some(UpdateKind::InlineQuery(_))));
        assert_eq!(classify(query(&"x".repeat(256))), None);
        assert_eq!(classify(Update::default()), None);
    }

    #[tokio::test]
    async fn dispatches_updates_and_advances_offset() {
        let api = Arc::new(RecordingApi::new(999));
        api.push_updates(Ok(vec![start_update(5, 10), start_update(6, 20)]));
        let dispatcher = dispatcher(api.clone()).await;

        let shutdown = CancellationToken::new();
        let updates = UpdateLoop::new(api.clone(), dispatcher.clone(), 4);
        let handle = tokio::spawn(updates.run(shutdown.clone()));

        tokio::time::timeout(Duration::from_secs(2), async {
            while dispatcher.subscriptions.len() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        shutdown.cancel();
        handle.await.unwrap().unwrap();

        let offsets = api.offsets.lock().unwrap().clone();
        assert_eq!(offsets[0], 0);
        assert!(offsets[1..].iter().all(|o| *o == 7));
        assert!(dispatcher.subscriptions.is_subscribed("10"));
        assert!(dispatcher.subscriptions.is_subscribed("20"));
    }

    #[tokio::test]
    async fn recovers_from_transient_poll_failures() {
        let api = Arc::new(RecordingApi::new(999));
        api.push_updates(Err(RelayError::new(ErrorCode::TransportFailed, "reset")));
        api.push_updates(Ok(vec![start_update(1, 10)]));
        let dispatcher = dispatcher(api.clone()).await;

        let shutdown = CancellationToken::new();
        let updates = UpdateLoop::new(api.clone(), dispatcher.clone(), 4).with_retries(1, no_wait());
        let handle = tokio::spawn(updates.run(shutdown.clone()));

        tokio::time::timeout(Duration::from_secs(2), async {
            while !dispatcher.subscriptions.is_subscribed("10") {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        shutdown.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn persistent_failures_end_the_loop() {
        let api = Arc::new(RecordingApi::new(999));
        for _ in 0..3 {
            api.push_updates(Err(RelayError::new(ErrorCode::TransportFailed, "down")));
        }
        let dispatcher = dispatcher(api.clone()).await;

        let updates = UpdateLoop::new(api.clone(), dispatcher, 4).with_retries(2, no_wait());
        let err = updates.run(CancellationToken::new()).await.unwrap_err();

        assert_eq!(err.code(), Some(ErrorCode::TransportFailed));
        assert_eq!(api.offsets.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn shutdown_interrupts_wait_for_a_handler_slot() {
        let api = Arc::new(RecordingApi::new(999));
        api.push_updates(Ok(vec![start_update(1, 10)]));
        let dispatcher = dispatcher(api.clone()).await;

        let updates = UpdateLoop::new(api.clone(), dispatcher.clone(), 1);
        let _busy = updates.permits.clone().acquire_owned().await.unwrap();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(updates.run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();

        let stopped = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(stopped.unwrap().unwrap().is_ok());
        assert!(!dispatcher.subscriptions.is_subscribed("10"));
    }

    #[tokio::test]
    async fn zero_retries_is_fatal_immediately() {
        let api = Arc::new(RecordingApi::new(999));
        api.push_updates(Err(RelayError::new(ErrorCode::TransportFailed, "down")));
        let dispatcher = dispatcher(api.clone()).await;

        let updates = UpdateLoop::new(api.clone(), dispatcher, 4).with_retries(0, no_wait());
        assert!(updates.run(CancellationToken::new()).await.is_err());
        assert_eq!(api.offsets.lock().unwrap().len(), 1);
    }
}
