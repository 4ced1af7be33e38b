//! Command handlers and the admin gate.
//!
//! [`CommandDispatcher`] turns a parsed command line into runtime calls and
//! formatted replies. Commands that need a container id fall back to an
//! inline selection menu when the id is missing or not a valid id.

use super::callback::CallbackAction;
use super::commands::{CommandKind, ParsedCommand};
use super::menu::build_menu;
use super::resilient::{Delivery, DeliveryTarget, PACING_GENERAL};
use super::transport::{MessageHandle, Outgoing};
use super::views::{code_blocks, ContainerView, DefaultContainerView};
use super::UnauthorizedCache;
use std::collections::HashSet;
use std::sync::Arc;
use teledock_core::config::MESSAGE_CHUNK_CHARS;
use teledock_core::runtime::{
    group_stacks, is_valid_resource_id, ContainerRuntime, ListFilter, LogTail, ResourceState,
    RuntimeError,
};
use teledock_core::utils::{pack_entries, truncate_str};
use tracing::{info, warn};

const ENTRY_SEPARATOR: &str = "\n\n";

/// An inbound command message, stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCommand {
    /// The message carrying the command
    pub message: MessageHandle,
    /// Sender id; `None` for channel posts and anonymous admins
    pub sender: Option<i64>,
    /// Sender display name, for logs
    pub sender_name: String,
    /// Whether the chat is a private chat with the bot
    pub is_private: bool,
}

/// Executes commands on behalf of administrators.
#[derive(Clone)]
pub struct CommandDispatcher {
    delivery: Delivery,
    runtime: Arc<dyn ContainerRuntime>,
    admins: Arc<HashSet<i64>>,
    unauthorized: UnauthorizedCache,
}

impl CommandDispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new(
        delivery: Delivery,
        runtime: Arc<dyn ContainerRuntime>,
        admins: Arc<HashSet<i64>>,
        unauthorized: UnauthorizedCache,
    ) -> Self {
        Self {
            delivery,
            runtime,
            admins,
            unauthorized,
        }
    }

    /// Whether `sender` is on the admin list.
    #[must_use]
    pub fn is_admin(&self, sender: Option<i64>) -> bool {
        sender.is_some_and(|id| self.admins.contains(&id))
    }

    /// Run one command.
    ///
    /// Non-admins get no reply and cause no runtime call; the attempt is only
    /// logged.
    pub async fn dispatch(&self, inbound: &InboundCommand, command: ParsedCommand) {
        if command.kind.requires_admin() && !self.is_admin(inbound.sender) {
            self.unauthorized
                .record(
                    inbound.sender.unwrap_or_default(),
                    &inbound.sender_name,
                    &format!("{:?}", command.kind),
                )
                .await;
            return;
        }

        info!(
            user_id = inbound.sender.unwrap_or_default(),
            command = ?command.kind,
            payload = %truncate_str(&command.payload, 64),
            "Handling command"
        );

        let payload = command.payload.as_str();
        match command.kind {
            CommandKind::Start => self.start(inbound).await,
            CommandKind::List => self.containers(inbound, ListFilter::running()).await,
            CommandKind::ListAll => self.containers(inbound, ListFilter::all()).await,
            CommandKind::Images => self.images(inbound).await,
            CommandKind::Stacks => self.stacks(inbound).await,
            CommandKind::Stop => self.stop(inbound, payload).await,
            CommandKind::Run => self.run(inbound, payload).await,
            CommandKind::Inspect => self.inspect(inbound, payload).await,
            CommandKind::Logs => self.logs(inbound, payload).await,
        }
    }

    async fn start(&self, inbound: &InboundCommand) {
        if !inbound.is_private {
            return;
        }
        self.delivery
            .send(
                inbound.message.chat_id,
                Outgoing::html(DefaultContainerView::start_info()),
            )
            .await;
    }

    async fn containers(&self, inbound: &InboundCommand, filter: ListFilter) {
        let cards = match self.runtime.list(filter).await {
            Ok(resources) if resources.is_empty() => {
                vec![DefaultContainerView::no_containers().to_string()]
            }
            Ok(resources) => resources
                .iter()
                .map(DefaultContainerView::container_card)
                .collect(),
            Err(e) => return self.report(inbound, &e).await,
        };
        self.send_entries(inbound, &cards).await;
    }

    async fn images(&self, inbound: &InboundCommand) {
        let cards = match self.runtime.list_images().await {
            Ok(images) if images.is_empty() => {
                vec![DefaultContainerView::no_images().to_string()]
            }
            Ok(images) => images.iter().map(DefaultContainerView::image_card).collect(),
            Err(e) => return self.report(inbound, &e).await,
        };
        self.send_entries(inbound, &cards).await;
    }

    async fn stacks(&self, inbound: &InboundCommand) {
        let stacks = match self.runtime.list(ListFilter::compose_projects()).await {
            Ok(resources) => group_stacks(resources),
            Err(e) => return self.report(inbound, &e).await,
        };
        let cards: Vec<String> = if stacks.is_empty() {
            vec![DefaultContainerView::no_stacks().to_string()]
        } else {
            stacks
                .iter()
                .map(|(name, services)| DefaultContainerView::stack_card(name, services.len()))
                .collect()
        };
        self.send_entries(inbound, &cards).await;
    }

    async fn stop(&self, inbound: &InboundCommand, payload: &str) {
        let Some(id) = target_id(payload) else {
            return self
                .ask_for_container(inbound, ListFilter::running(), CallbackAction::Stop)
                .await;
        };
        let text = match self.runtime.stop(id).await {
            Ok(()) => DefaultContainerView::resource_stopped(id),
            Err(e) => DefaultContainerView::runtime_error(&e.to_string()),
        };
        self.delivery
            .reply(inbound.message, Outgoing::html(text))
            .await;
    }

    async fn run(&self, inbound: &InboundCommand, payload: &str) {
        let Some(id) = target_id(payload) else {
            return self
                .ask_for_container(
                    inbound,
                    ListFilter::with_state(ResourceState::Exited),
                    CallbackAction::Start,
                )
                .await;
        };
        let text = match self.runtime.start(id).await {
            Ok(()) => DefaultContainerView::resource_started(id),
            Err(e) => DefaultContainerView::runtime_error(&e.to_string()),
        };
        self.delivery
            .reply(inbound.message, Outgoing::html(text))
            .await;
    }

    async fn inspect(&self, inbound: &InboundCommand, payload: &str) {
        let Some(id) = target_id(payload) else {
            return self
                .ask_for_container(inbound, ListFilter::all(), CallbackAction::Inspect)
                .await;
        };
        match self.runtime.inspect(id).await {
            Ok(record) => {
                self.reply_blocks(inbound, code_blocks::<DefaultContainerView>(&record))
                    .await;
            }
            Err(e) => self.report(inbound, &e).await,
        }
    }

    async fn logs(&self, inbound: &InboundCommand, payload: &str) {
        let mut args = payload.split_whitespace();
        let Some(id) = args.next().filter(|id| is_valid_resource_id(id)) else {
            return self
                .ask_for_container(inbound, ListFilter::all(), CallbackAction::Logs)
                .await;
        };
        let tail = LogTail::parse(args.next());
        match self.runtime.logs(id, tail).await {
            Ok(segments) => {
                self.reply_blocks(inbound, code_blocks::<DefaultContainerView>(&segments.concat()))
                    .await;
            }
            Err(e) => self.report(inbound, &e).await,
        }
    }

    /// Reply with a selection menu over the containers matching `filter`.
    async fn ask_for_container(
        &self,
        inbound: &InboundCommand,
        filter: ListFilter,
        action: CallbackAction,
    ) {
        let resources = match self.runtime.list(filter).await {
            Ok(resources) => resources,
            Err(e) => return self.report(inbound, &e).await,
        };
        let menu = build_menu(&resources, action);
        let message = if menu.is_empty() {
            Outgoing::html(DefaultContainerView::nothing_to_choose())
        } else {
            Outgoing::html(DefaultContainerView::choose_container())
                .with_keyboard(menu.into_markup())
        };
        self.delivery.reply(inbound.message, message).await;
    }

    async fn send_entries(&self, inbound: &InboundCommand, entries: &[String]) {
        let parts = pack_entries(entries, ENTRY_SEPARATOR, MESSAGE_CHUNK_CHARS)
            .into_iter()
            .map(Outgoing::html)
            .collect();
        let chat_id = inbound.message.chat_id;
        self.delivery
            .deliver_chunks(DeliveryTarget::Chat(chat_id), chat_id, parts, PACING_GENERAL)
            .await;
    }

    async fn reply_blocks(&self, inbound: &InboundCommand, blocks: Vec<String>) {
        let parts = blocks.into_iter().map(Outgoing::html).collect();
        self.delivery
            .deliver_chunks(
                DeliveryTarget::Reply(inbound.message),
                inbound.message.chat_id,
                parts,
                PACING_GENERAL,
            )
            .await;
    }

    async fn report(&self, inbound: &InboundCommand, error: &RuntimeError) {
        warn!(error = %error, "Runtime call failed");
        self.delivery
            .reply(
                inbound.message,
                Outgoing::html(DefaultContainerView::runtime_error(&error.to_string())),
            )
            .await;
    }
}

/// First payload word, if it is a usable container id.
fn target_id(payload: &str) -> Option<&str> {
    payload
        .split_whitespace()
        .next()
        .filter(|id| is_valid_resource_id(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::callback::{CallbackRouter, InboundCallback};
    use crate::bot::commands::parse_command;
    use crate::bot::resilient::RetryPolicy;
    use crate::testing::{sample_resources, FakeRuntime, RecordingTransport};
    use teloxide::types::{ChatId, InlineKeyboardButtonKind, MessageId};

    const ADMIN: i64 = 7;
    const CHAT: ChatId = ChatId(-100);

    struct Harness {
        dispatcher: CommandDispatcher,
        router: CallbackRouter,
        transport: Arc<RecordingTransport>,
        runtime: Arc<FakeRuntime>,
    }

    fn harness(runtime: FakeRuntime) -> Harness {
        let transport = Arc::new(RecordingTransport::default());
        let runtime = Arc::new(runtime);
        let delivery = Delivery::new(transport.clone(), RetryPolicy::default());
        let admins = Arc::new(HashSet::from([ADMIN]));
        Harness {
            dispatcher: CommandDispatcher::new(
                delivery.clone(),
                runtime.clone(),
                admins.clone(),
                UnauthorizedCache::new(60, 100),
            ),
            router: CallbackRouter::new(delivery, runtime.clone(), admins),
            transport,
            runtime,
        }
    }

    fn inbound(sender: i64, is_private: bool) -> InboundCommand {
        InboundCommand {
            message: MessageHandle::new(CHAT, MessageId(1)),
            sender: Some(sender),
            sender_name: "tester".to_string(),
            is_private,
        }
    }

    async fn run(h: &Harness, sender: i64, text: &str) {
        let command = parse_command(text).expect("known command");
        h.dispatcher.dispatch(&inbound(sender, false), command).await;
    }

    #[tokio::test]
    async fn test_stop_menu_then_button_press() {
        let h = harness(FakeRuntime::with_resources(sample_resources(7)));

        run(&h, ADMIN, "/stop").await;

        let calls = h.transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].kind, "reply");
        assert_eq!(calls[0].text, "Choose a container");
        let keyboard = calls[0].keyboard.clone().expect("menu keyboard");
        let shape: Vec<usize> = keyboard.inline_keyboard.iter().map(Vec::len).collect();
        assert_eq!(shape, vec![3, 3, 1]);

        let fifth = &keyboard.inline_keyboard[1][1];
        assert_eq!(fifth.text, "svc-5");
        let InlineKeyboardButtonKind::CallbackData(data) = fifth.kind.clone() else {
            panic!("menu buttons carry callback data");
        };
        assert_eq!(data, "stop:5555555555");

        h.router
            .handle(InboundCallback {
                id: "cb".to_string(),
                from: ADMIN,
                message: Some(MessageHandle::new(CHAT, MessageId(1000))),
                data: Some(data),
            })
            .await;

        assert_eq!(
            h.runtime.calls(),
            vec!["list:running", "stop:5555555555"]
        );
        let calls = h.transport.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].kind, "answer_callback");
        assert_eq!(calls[2].kind, "edit");
        assert_eq!(calls[2].message_id, Some(MessageId(1000)));
        assert_eq!(calls[2].text, "Resource 5555555555 stopped");
    }

    #[tokio::test]
    async fn test_logs_with_invalid_id_shows_menu_without_fetching() {
        let h = harness(FakeRuntime::with_resources(sample_resources(2)));

        run(&h, ADMIN, "/logs nginx all").await;

        assert_eq!(h.runtime.calls(), vec!["list:all"]);
        let calls = h.transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].text, "Choose a container");
    }

    #[tokio::test]
    async fn test_logs_with_valid_id_honors_tail() {
        let h = harness(
            FakeRuntime::with_resources(vec![]).with_logs(vec!["booted <ok>\n".to_string()]),
        );

        run(&h, ADMIN, "/logs 1111111111 all").await;
        run(&h, ADMIN, "/logs 1111111111 many").await;

        assert_eq!(
            h.runtime.calls(),
            vec!["logs:1111111111:all", "logs:1111111111:10"]
        );
        let calls = h.transport.calls();
        assert_eq!(calls[0].kind, "reply");
        assert_eq!(calls[0].text, "<code>booted &lt;ok&gt;\n</code>");
    }

    #[tokio::test]
    async fn test_unauthorized_commands_are_silent() {
        let h = harness(FakeRuntime::with_resources(sample_resources(3)));

        for text in [
            "/ps", "/psa", "/images", "/stacks", "/stop 1111111111", "/run", "/inspect",
            "/logs 1111111111",
        ] {
            run(&h, 99, text).await;
        }

        assert!(h.transport.calls().is_empty());
        assert!(h.runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn test_start_answers_only_in_private_chats() {
        let h = harness(FakeRuntime::with_resources(vec![]));

        run(&h, 99, "/start").await;
        assert!(h.transport.calls().is_empty());

        let command = parse_command("/start").expect("start");
        h.dispatcher.dispatch(&inbound(99, true), command).await;
        let calls = h.transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].kind, "send");
        assert!(calls[0].text.contains("Teledock"));
    }

    #[tokio::test]
    async fn test_listings() {
        let h = harness(FakeRuntime::with_resources(sample_resources(3)));

        run(&h, ADMIN, "/ls").await;
        run(&h, ADMIN, "/images").await;
        run(&h, ADMIN, "/lss").await;

        let calls = h.transport.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].kind, "send");
        assert_eq!(calls[0].text.matches("✅  <b>svc-").count(), 3);
        assert_eq!(calls[1].text, "No images found");
        assert_eq!(calls[2].text, "No stacks running");
    }

    #[tokio::test]
    async fn test_run_menu_lists_exited_containers_only() {
        let mut resources = sample_resources(4);
        resources[1].state = ResourceState::Exited;
        let h = harness(FakeRuntime::with_resources(resources));

        run(&h, ADMIN, "/run").await;

        assert_eq!(h.runtime.calls(), vec!["list:exited"]);
        let keyboard = h.transport.calls()[0].keyboard.clone().expect("menu");
        assert_eq!(keyboard.inline_keyboard.len(), 1);
        assert_eq!(keyboard.inline_keyboard[0][0].text, "svc-2");
    }

    #[tokio::test]
    async fn test_empty_menu_says_so() {
        let h = harness(FakeRuntime::with_resources(vec![]));

        run(&h, ADMIN, "/stop").await;

        let calls = h.transport.calls();
        assert_eq!(calls[0].text, "No containers to choose from");
        assert!(calls[0].keyboard.is_none());
    }

    #[tokio::test]
    async fn test_stop_with_id_reports_runtime_error() {
        let h = harness(FakeRuntime::with_resources(vec![]).failing("No such container"));

        run(&h, ADMIN, "/down deadbeef00").await;

        assert_eq!(h.runtime.calls(), vec!["stop:deadbeef00"]);
        let calls = h.transport.calls();
        assert_eq!(calls[0].kind, "reply");
        assert!(calls[0].text.contains("No such container"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_inspect_replies_then_sends() {
        let h = harness(FakeRuntime::with_resources(vec![]).with_inspect("z".repeat(6500)));

        run(&h, ADMIN, "/describe 4f2a9c01bd").await;

        let kinds: Vec<&str> = h.transport.calls().iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec!["reply", "send", "send"]);
    }
}
