//! Resilient messaging with automatic retry for Telegram API operations.
//!
//! Every outbound message goes through [`Delivery`]. A failed send, reply,
//! edit or callback acknowledgment is retried with linear backoff
//! (5 s, 10 s, 15 s, 20 s, 25 s by default) and dropped with an error log once
//! the budget is spent. Nothing here panics or terminates the process.
//!
//! # Usage
//!
//! ```ignore
//! use teledock_transport_telegram::bot::resilient::{Delivery, RetryPolicy, PACING_GENERAL};
//!
//! let delivery = Delivery::new(transport, RetryPolicy::default());
//! let handle = delivery.reply(trigger, Outgoing::html("<b>done</b>")).await;
//! delivery.deliver_chunks(DeliveryTarget::Reply(trigger), chat_id, parts, PACING_GENERAL).await;
//! ```

use super::transport::{MessageHandle, Outgoing, Transport, TransportError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use teloxide::types::ChatId;
use tokio_retry::Retry;
use tracing::{debug, error, warn};

/// Pause between consecutive chunks of a general response.
pub const PACING_GENERAL: Duration = Duration::from_millis(100);
/// Pause between consecutive chunks of an inspect record.
pub const PACING_INSPECT: Duration = Duration::from_millis(250);

/// Retry budget for one outbound operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before retry `n` is `base_delay * n`
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Five retries, 5 s apart and growing linearly.
    pub const DEFAULT: Self = Self {
        max_retries: 5,
        base_delay: Duration::from_secs(5),
    };

    /// Delays slept before each retry, in order.
    pub fn delays(self) -> impl Iterator<Item = Duration> {
        (1..=self.max_retries).map(move |n| self.base_delay * n)
    }

    /// Delay slept after failed attempt `attempt` (1-based), or `None` when
    /// that attempt was the last one allowed.
    #[must_use]
    pub fn backoff_after(self, attempt: u32) -> Option<Duration> {
        (attempt <= self.max_retries).then(|| self.base_delay * attempt)
    }

    /// Total attempts including the first one.
    #[must_use]
    pub const fn max_attempts(self) -> u32 {
        self.max_retries + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Where a message should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryTarget {
    /// New message in a chat
    Chat(ChatId),
    /// Reply correlated to the triggering message
    Reply(MessageHandle),
    /// Replace the content of an existing message
    Edit(MessageHandle),
}

impl DeliveryTarget {
    const fn operation(self) -> &'static str {
        match self {
            Self::Chat(_) => "send",
            Self::Reply(_) => "reply",
            Self::Edit(_) => "edit",
        }
    }
}

/// State of one attempt within a delivery call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryAttempt {
    /// Attempt number, starting at 1
    pub number: u32,
    /// Delay before the next attempt if this one fails
    pub backoff: Option<Duration>,
}

/// Terminal result of a delivery call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome<T> {
    /// The transport accepted the operation
    Delivered {
        /// Value returned by the transport
        value: T,
        /// Attempts used, including the successful one
        attempts: u32,
    },
    /// Every attempt failed
    Aborted {
        /// Attempts used
        attempts: u32,
        /// Error of the last attempt
        error: TransportError,
    },
}

impl<T> DeliveryOutcome<T> {
    /// Delivered value, if any.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Delivered { value, .. } => Some(value),
            Self::Aborted { .. } => None,
        }
    }

    /// Number of attempts made.
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Delivered { attempts, .. } | Self::Aborted { attempts, .. } => *attempts,
        }
    }
}

/// Delivery engine shared by command handlers and the callback router.
#[derive(Clone)]
pub struct Delivery {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl Delivery {
    /// Create a delivery engine over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Deliver `message` to `target`, retrying transport failures.
    ///
    /// Returns `None` when every attempt failed; the failure is logged and
    /// must be treated as best effort by the caller.
    pub async fn deliver(&self, target: DeliveryTarget, message: Outgoing) -> Option<MessageHandle> {
        self.deliver_with_outcome(target, message).await.into_value()
    }

    /// Like [`Delivery::deliver`] but reports how the call ended.
    pub async fn deliver_with_outcome(
        &self,
        target: DeliveryTarget,
        message: Outgoing,
    ) -> DeliveryOutcome<MessageHandle> {
        let transport = &self.transport;
        self.with_retry(target.operation(), || {
            let message = message.clone();
            async move {
                match target {
                    DeliveryTarget::Chat(chat_id) => transport.send(chat_id, message).await,
                    DeliveryTarget::Reply(to) => transport.reply(to, message).await,
                    DeliveryTarget::Edit(existing) => transport.edit(existing, message).await,
                }
            }
        })
        .await
    }

    /// Send a new message to a chat.
    pub async fn send(&self, chat_id: ChatId, message: Outgoing) -> Option<MessageHandle> {
        self.deliver(DeliveryTarget::Chat(chat_id), message).await
    }

    /// Reply to a message.
    pub async fn reply(&self, to: MessageHandle, message: Outgoing) -> Option<MessageHandle> {
        self.deliver(DeliveryTarget::Reply(to), message).await
    }

    /// Replace the content of a message in place.
    pub async fn edit(&self, existing: MessageHandle, message: Outgoing) -> Option<MessageHandle> {
        self.deliver(DeliveryTarget::Edit(existing), message).await
    }

    /// Acknowledge a callback query. Returns whether the acknowledgment went through.
    pub async fn acknowledge(&self, callback_id: &str, text: Option<String>) -> bool {
        let transport = &self.transport;
        self.with_retry("answer_callback", || {
            let callback_id = callback_id.to_string();
            let text = text.clone();
            async move { transport.answer_callback(callback_id, text).await }
        })
        .await
        .into_value()
        .is_some()
    }

    /// Deliver an ordered sequence of chunks.
    ///
    /// Chunk 0 goes to `first` (a reply or an edit correlated to the
    /// triggering event). Every later chunk is a new message in `chat_id`,
    /// preceded by a blocking `pacing` wait, so chunks are emitted strictly in
    /// order. Follow-up chunks with empty text are skipped.
    ///
    /// Returns the number of chunks the transport accepted.
    pub async fn deliver_chunks(
        &self,
        first: DeliveryTarget,
        chat_id: ChatId,
        chunks: Vec<Outgoing>,
        pacing: Duration,
    ) -> usize {
        let total = chunks.len();
        let mut delivered = 0;

        for (index, chunk) in chunks.into_iter().enumerate() {
            let target = if index == 0 {
                first
            } else {
                if chunk.text.is_empty() {
                    continue;
                }
                tokio::time::sleep(pacing).await;
                DeliveryTarget::Chat(chat_id)
            };

            if self.deliver(target, chunk).await.is_some() {
                delivered += 1;
            }
        }

        debug!(total, delivered, "Chunked delivery finished");
        delivered
    }

    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut op: F) -> DeliveryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let policy = self.policy;
        let mut attempts = 0;

        let result = Retry::spawn(policy.delays(), || {
            attempts += 1;
            let attempt = DeliveryAttempt {
                number: attempts,
                backoff: policy.backoff_after(attempts),
            };
            let fut = op();
            async move {
                fut.await.inspect_err(|e| {
                    if let Some(backoff) = attempt.backoff {
                        warn!(
                            operation,
                            attempt = attempt.number,
                            sleep = ?backoff,
                            error = %e,
                            "{operation} failed, sleeping and retrying"
                        );
                    }
                })
            }
        })
        .await;

        match result {
            Ok(value) => DeliveryOutcome::Delivered { value, attempts },
            Err(e) => {
                error!(
                    operation,
                    attempts,
                    error = %e,
                    "{operation} aborted, retry limit exceeded"
                );
                DeliveryOutcome::Aborted { attempts, error: e }
            }
        }
    }
}
