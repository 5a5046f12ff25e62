use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::hookrelay::subscriptions::SubscriptionManager;
use crate::hookrelay::telegram::{ChatApi, OutgoingMessage};
use crate::hookrelay::types::ChatId;

/// Bot API limit on message text, counted in UTF-16 code units
pub const MAX_MESSAGE_UNITS: usize = 4096;

/// Counts of one fan-out pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
    /// Dropped by the per-subscriber rate limit
    pub skipped: usize,
}

/// Delivers payloads to every current subscriber
pub struct Publisher {
    api: Arc<dyn ChatApi>,
    subscriptions: Arc<SubscriptionManager>,
    parse_mode: Option<String>,
    min_interval: Option<Duration>,
    last_sent: DashMap<ChatId, Instant>,
}

impl Publisher {
    pub fn new(api: Arc<dyn ChatApi>, subscriptions: Arc<SubscriptionManager>) -> Self {
        Self {
            api,
            subscriptions,
            parse_mode: None,
            min_interval: None,
            last_sent: DashMap::new(),
        }
    }

    pub fn with_parse_mode(mut self, parse_mode: Option<String>) -> Self {
        self.parse_mode = parse_mode;
        self
    }

    pub fn with_min_interval(mut self, min_interval: Option<Duration>) -> Self {
        self.min_interval = min_interval;
        self
    }

    /// Sends `payload` once to each subscriber in the current snapshot.
    ///
    /// A failed send is logged and counted; it never stops delivery to the
    /// remaining subscribers and is not retried.
    pub async fn publish(&self, payload: &str) -> DeliveryReport {
        let delivery = Uuid::new_v4();
        let subscribers = self.subscriptions.subscribers();
        let text = truncate(payload, MAX_MESSAGE_UNITS);
        debug!("[{}] Publishing {} bytes to {} subscribers", delivery, text.len(), subscribers.len());

        let mut report = DeliveryReport::default();
        for id in &subscribers {
            let chat_id = match id.parse::<i64>() {
                Ok(chat_id) => chat_id,
                Err(_) => {
                    warn!("[{}] Skipping malformed subscriber id {:?}", delivery, id);
                    report.failed += 1;
                    continue;
                }
            };

            if !self.admit(id, Instant::now()) {
                debug!("[{}] Rate limited {}", delivery, id);
                report.skipped += 1;
                continue;
            }

            let msg = OutgoingMessage {
                chat_id,
                text: text.to_string(),
                parse_mode: self.parse_mode.clone(),
                disable_web_page_preview: true,
            };
            match self.api.send_message(msg).await {
                Ok(()) => {
                    debug!("[{}] Delivered to {}", delivery, id);
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!("[{}] Delivery to {} failed: {}", delivery, id, e);
                    report.failed += 1;
                }
            }
        }

        if self.min_interval.is_some() {
            self.last_sent.retain(|id, _| subscribers.contains(id));
        }

        info!(
            "[{}] Fan-out done: {} delivered, {} failed, {} skipped",
            delivery, report.delivered, report.failed, report.skipped
        );
        report
    }

    /// Applies the per-subscriber minimum interval, recording the send time
    fn admit(&self, id: &str, now: Instant) -> bool {
        let Some(interval) = self.min_interval else {
            return true;
        };

        if let Some(last) = self.last_sent.get(id) {
            if now.duration_since(*last) < interval {
                return false;
            }
        }
        self.last_sent.insert(id.to_string(), now);
        true
    }
}

/// Cuts `text` to at most `max` UTF-16 code units on a char boundary
pub fn truncate(text: &str, max: usize) -> &str {
    let mut units = 0;
    for (idx, c) in text.char_indices() {
        units += c.len_utf16();
        if units > max {
            return &text[..idx];
        }
    }
    text
}
