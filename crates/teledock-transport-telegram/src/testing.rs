//! Test doubles for the transport and the container runtime.
//!
//! `RecordingTransport` accepts everything and remembers what was sent, with
//! the (possibly paused) tokio clock reading of each call. `FakeRuntime`
//! serves a fixed container snapshot and records every backend call.

use crate::bot::transport::{MessageHandle, Outgoing, Transport, TransportError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;
use teledock_core::runtime::{
    ContainerRuntime, ImageSummary, ListFilter, LogTail, Resource, ResourceState, RuntimeError,
};
use teloxide::types::{BotCommand, ChatId, InlineKeyboardMarkup, MessageId};
use tokio::time::Instant;

/// One call observed by [`RecordingTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: &'static str,
    pub chat_id: Option<ChatId>,
    /// Reply or edit target
    pub message_id: Option<MessageId>,
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
    pub at: Instant,
}

#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<RecordedCall>>,
    next_id: AtomicI32,
}

impl RecordingTransport {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(
        &self,
        kind: &'static str,
        chat_id: Option<ChatId>,
        message_id: Option<MessageId>,
        message: Option<Outgoing>,
        text: String,
    ) {
        let keyboard = message.and_then(|m| m.keyboard);
        self.calls.lock().expect("calls lock").push(RecordedCall {
            kind,
            chat_id,
            message_id,
            text,
            keyboard,
            at: Instant::now(),
        });
    }

    fn fresh_handle(&self, chat_id: ChatId) -> MessageHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1000;
        MessageHandle::new(chat_id, MessageId(id))
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, chat_id: ChatId, message: Outgoing) -> Result<MessageHandle, TransportError> {
        let text = message.text.clone();
        self.record("send", Some(chat_id), None, Some(message), text);
        Ok(self.fresh_handle(chat_id))
    }

    async fn reply(
        &self,
        to: MessageHandle,
        message: Outgoing,
    ) -> Result<MessageHandle, TransportError> {
        let text = message.text.clone();
        self.record("reply", Some(to.chat_id), Some(to.message_id), Some(message), text);
        Ok(self.fresh_handle(to.chat_id))
    }

    async fn edit(
        &self,
        target: MessageHandle,
        message: Outgoing,
    ) -> Result<MessageHandle, TransportError> {
        let text = message.text.clone();
        self.record(
            "edit",
            Some(target.chat_id),
            Some(target.message_id),
            Some(message),
            text,
        );
        Ok(target)
    }

    async fn answer_callback(
        &self,
        _callback_id: String,
        text: Option<String>,
    ) -> Result<(), TransportError> {
        self.record("answer_callback", None, None, None, text.unwrap_or_default());
        Ok(())
    }

    async fn set_commands(&self, commands: Vec<BotCommand>) -> Result<(), TransportError> {
        let names: Vec<String> = commands.into_iter().map(|c| c.command).collect();
        self.record("set_commands", None, None, None, names.join(","));
        Ok(())
    }
}

/// In-memory container runtime.
#[derive(Default)]
pub struct FakeRuntime {
    resources: Vec<Resource>,
    images: Vec<ImageSummary>,
    inspect: String,
    logs: Vec<String>,
    failure: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeRuntime {
    pub fn with_resources(resources: Vec<Resource>) -> Self {
        Self {
            resources,
            inspect: "{}".to_string(),
            ..Self::default()
        }
    }

    pub fn with_images(mut self, images: Vec<ImageSummary>) -> Self {
        self.images = images;
        self
    }

    pub fn with_inspect(mut self, record: String) -> Self {
        self.inspect = record;
        self
    }

    pub fn with_logs(mut self, logs: Vec<String>) -> Self {
        self.logs = logs;
        self
    }

    /// Make every container action (not listings) fail with `message`.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn outcome(&self) -> Result<(), RuntimeError> {
        match &self.failure {
            Some(message) => Err(RuntimeError::Docker(
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404,
                    message: message.clone(),
                },
            )),
            None => Ok(()),
        }
    }
}

fn describe(filter: &ListFilter) -> &'static str {
    match (filter.state, filter.label.is_some(), filter.all) {
        (Some(state), _, _) => state.as_str(),
        (None, true, _) => "stacks",
        (None, false, true) => "all",
        (None, false, false) => "running",
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list(&self, filter: ListFilter) -> Result<Vec<Resource>, RuntimeError> {
        self.record(format!("list:{}", describe(&filter)));
        Ok(self
            .resources
            .iter()
            .filter(|r| filter.all || r.state == ResourceState::Running)
            .filter(|r| filter.state.is_none_or(|state| r.state == state))
            .filter(|r| filter.label.is_none() || r.stack.is_some())
            .cloned()
            .collect())
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>, RuntimeError> {
        self.record("images".to_string());
        Ok(self.images.clone())
    }

    async fn start(&self, id: &str) -> Result<(), RuntimeError> {
        self.record(format!("start:{id}"));
        self.outcome()
    }

    async fn stop(&self, id: &str) -> Result<(), RuntimeError> {
        self.record(format!("stop:{id}"));
        self.outcome()
    }

    async fn inspect(&self, id: &str) -> Result<String, RuntimeError> {
        self.record(format!("inspect:{id}"));
        self.outcome().map(|()| self.inspect.clone())
    }

    async fn logs(&self, id: &str, tail: LogTail) -> Result<Vec<String>, RuntimeError> {
        self.record(format!("logs:{id}:{tail}"));
        self.outcome().map(|()| self.logs.clone())
    }
}

/// `count` containers with distinct hex ids, all running.
///
/// Container `n` (starting at 1) is named `/svc-n` and its id starts with ten
/// copies of the hex digit for `n`.
pub fn sample_resources(count: usize) -> Vec<Resource> {
    (1..=count)
        .map(|n| {
            let digit = std::char::from_digit(u32::try_from(n % 16).unwrap_or(0), 16)
                .unwrap_or('0');
            Resource {
                id: format!("{}00aabbccdd", digit.to_string().repeat(10)),
                name: format!("/svc-{n}"),
                state: ResourceState::Running,
                status: "Up 5 minutes".to_string(),
                image: "alpine:3".to_string(),
                stack: None,
            }
        })
        .collect()
}
