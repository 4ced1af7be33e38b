//! Callback tokens and the callback router.
//!
//! Menu buttons carry `"<action>:<id-prefix>"`. When a button is pressed the
//! router decodes the token, runs the action against the container runtime
//! and resolves the callback exactly once: the query is acknowledged and the
//! menu message is edited in place with the result.

use super::resilient::{Delivery, DeliveryTarget, PACING_GENERAL, PACING_INSPECT};
use super::transport::{MessageHandle, Outgoing};
use super::views::{code_blocks, ContainerView, DefaultContainerView};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use teledock_core::runtime::{ContainerRuntime, LogTail, RuntimeError};
use teledock_core::utils::truncate_str;
use thiserror::Error;
use tracing::{debug, info, warn};

const TOKEN_DELIMITER: char = ':';

/// Telegram rejects callback answers longer than this.
const TOAST_MAX_CHARS: usize = 200;

/// Action a menu button triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackAction {
    /// Start a stopped container
    Start,
    /// Stop a running container
    Stop,
    /// Show the inspect record
    Inspect,
    /// Show the latest log lines
    Logs,
}

impl CallbackAction {
    /// Every action, in declaration order.
    pub const ALL: [Self; 4] = [Self::Start, Self::Stop, Self::Inspect, Self::Logs];

    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Inspect => "inspect",
            Self::Logs => "logs",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == name)
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while decoding callback data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Not exactly two non-empty fields
    #[error("malformed callback data: {0:?}")]
    Malformed(String),
    /// First field is not a known action
    #[error("unknown callback action: {0:?}")]
    UnknownAction(String),
}

/// Decoded `(action, id-prefix)` pair carried by a button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackToken {
    /// Action to run
    pub action: CallbackAction,
    /// Container id prefix; never contains the delimiter
    pub prefix: String,
}

impl CallbackToken {
    /// Create a token.
    #[must_use]
    pub fn new(action: CallbackAction, prefix: impl Into<String>) -> Self {
        Self {
            action,
            prefix: prefix.into(),
        }
    }

    /// Encode as button data.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}{TOKEN_DELIMITER}{}", self.action, self.prefix)
    }

    /// Decode button data.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`] unless `data` has exactly two
    /// non-empty fields, and [`TokenError::UnknownAction`] when the first
    /// field is not an action.
    pub fn decode(data: &str) -> Result<Self, TokenError> {
        let mut fields = data.split(TOKEN_DELIMITER);
        let (Some(action), Some(prefix), None) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(TokenError::Malformed(data.to_string()));
        };
        if action.is_empty() || prefix.is_empty() {
            return Err(TokenError::Malformed(data.to_string()));
        }

        let action = CallbackAction::parse(action)
            .ok_or_else(|| TokenError::UnknownAction(action.to_string()))?;
        Ok(Self::new(action, prefix))
    }
}

/// A button press, stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCallback {
    /// Callback query id used for the acknowledgment
    pub id: String,
    /// Id of the user who pressed the button
    pub from: i64,
    /// Message carrying the menu, when the client still has it
    pub message: Option<MessageHandle>,
    /// Raw button data
    pub data: Option<String>,
}

/// Routes button presses to container actions.
#[derive(Clone)]
pub struct CallbackRouter {
    delivery: Delivery,
    runtime: Arc<dyn ContainerRuntime>,
    admins: Arc<HashSet<i64>>,
}

impl CallbackRouter {
    /// Create a router.
    #[must_use]
    pub fn new(
        delivery: Delivery,
        runtime: Arc<dyn ContainerRuntime>,
        admins: Arc<HashSet<i64>>,
    ) -> Self {
        Self {
            delivery,
            runtime,
            admins,
        }
    }

    /// Handle one callback.
    ///
    /// Presses from non-admins and undecodable data are dropped without an
    /// acknowledgment. Everything else is resolved exactly once.
    pub async fn handle(&self, callback: InboundCallback) {
        if !self.admins.contains(&callback.from) {
            info!(user_id = callback.from, "Ignoring callback from non-admin user");
            return;
        }

        let data = callback.data.as_deref().unwrap_or_default();
        let token = match CallbackToken::decode(data) {
            Ok(token) => token,
            Err(e @ TokenError::Malformed(_)) => {
                warn!(error = %e, "Dropping callback");
                return;
            }
            Err(e @ TokenError::UnknownAction(_)) => {
                debug!(error = %e, "Ignoring callback");
                return;
            }
        };

        let Some(message) = callback.message else {
            warn!(action = %token.action, "Callback has no message attached, acknowledging only");
            self.delivery.acknowledge(&callback.id, None).await;
            return;
        };

        info!(
            user_id = callback.from,
            action = %token.action,
            prefix = %token.prefix,
            "Handling callback"
        );

        let result = self.run_action(&token).await;
        match result {
            Ok((parts, pacing)) => self.resolve(&callback.id, message, parts, pacing).await,
            Err(e) => self.reject(&callback.id, message, &token.prefix, &e).await,
        }
    }

    async fn run_action(
        &self,
        token: &CallbackToken,
    ) -> Result<(Vec<String>, Duration), RuntimeError> {
        let id = token.prefix.as_str();
        match token.action {
            CallbackAction::Stop => {
                self.runtime.stop(id).await?;
                Ok((vec![DefaultContainerView::resource_stopped(id)], PACING_GENERAL))
            }
            CallbackAction::Start => {
                self.runtime.start(id).await?;
                Ok((vec![DefaultContainerView::resource_started(id)], PACING_GENERAL))
            }
            CallbackAction::Inspect => {
                let record = self.runtime.inspect(id).await?;
                Ok((code_blocks::<DefaultContainerView>(&record), PACING_INSPECT))
            }
            CallbackAction::Logs => {
                let logs = self.runtime.logs(id, LogTail::default()).await?.concat();
                Ok((code_blocks::<DefaultContainerView>(&logs), PACING_GENERAL))
            }
        }
    }

    async fn resolve(
        &self,
        callback_id: &str,
        message: MessageHandle,
        parts: Vec<String>,
        pacing: Duration,
    ) {
        self.delivery.acknowledge(callback_id, None).await;
        let parts = parts.into_iter().map(Outgoing::html).collect();
        self.delivery
            .deliver_chunks(DeliveryTarget::Edit(message), message.chat_id, parts, pacing)
            .await;
    }

    async fn reject(
        &self,
        callback_id: &str,
        message: MessageHandle,
        prefix: &str,
        error: &RuntimeError,
    ) {
        warn!(prefix = %prefix, error = %error, "Container action failed");
        let reason = error.to_string();
        self.delivery
            .acknowledge(callback_id, Some(truncate_str(&reason, TOAST_MAX_CHARS)))
            .await;
        self.delivery
            .edit(
                message,
                Outgoing::html(DefaultContainerView::resource_errored(prefix, &reason)),
            )
            .await;
    }
}
