use crate::bot::callback::{CallbackRouter, InboundCallback};
use crate::bot::commands::{parse_command, CommandTable};
use crate::bot::handlers::{CommandDispatcher, InboundCommand};
use crate::bot::resilient::{Delivery, RetryPolicy};
use crate::bot::transport::{MessageHandle, TelegramTransport, Transport};
use crate::bot::UnauthorizedCache;
use crate::config::{BotSettings, UNAUTHORIZED_CACHE_MAX_SIZE};
use std::sync::Arc;
use teledock_core::runtime::{ContainerRuntime, DockerRuntime};
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{debug, error, info};

/// Username of the running bot, used to ignore commands addressed to others.
#[derive(Debug, Clone)]
struct BotUsername(String);

/// Run the Telegram transport runtime.
///
/// Exits the process if the Docker daemon or the Bot API is unreachable at
/// startup. Returns when the dispatcher is stopped with Ctrl-C.
pub async fn run_bot(settings: Arc<BotSettings>) {
    let runtime = init_runtime().await;

    let bot = Bot::new(settings.telegram.token.clone());
    let username = init_identity(&bot).await;

    let transport: Arc<dyn Transport> = Arc::new(TelegramTransport::new(bot.clone()));
    CommandTable::new().register(transport.as_ref()).await;

    let delivery = Delivery::new(transport, RetryPolicy::default());
    let unauthorized_cache = init_unauthorized_cache(&settings);
    let commands = Arc::new(CommandDispatcher::new(
        delivery.clone(),
        runtime.clone(),
        settings.admins.clone(),
        unauthorized_cache,
    ));
    let callbacks = Arc::new(CallbackRouter::new(
        delivery,
        runtime,
        settings.admins.clone(),
    ));

    info!(admins = settings.admins.len(), "Bot is running...");

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![commands, callbacks, Arc::new(username)])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Bot stopped");
}

async fn init_runtime() -> Arc<dyn ContainerRuntime> {
    let runtime = match DockerRuntime::connect() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to initialize the docker client: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.ping().await {
        error!("Docker daemon is not reachable: {}", e);
        std::process::exit(1);
    }
    Arc::new(runtime)
}

async fn init_identity(bot: &Bot) -> BotUsername {
    match bot.get_me().await {
        Ok(me) => {
            info!(
                id = me.id.0,
                name = %me.first_name,
                username = %me.username(),
                "Connected to Telegram"
            );
            BotUsername(me.username().to_string())
        }
        Err(e) => {
            error!("Failed to reach the Telegram Bot API: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_unauthorized_cache(settings: &BotSettings) -> UnauthorizedCache {
    let cooldown = settings.telegram.unauthorized_cooldown_secs;

    info!(
        "Initializing UnauthorizedCache (cooldown: {}s, max_size: {})",
        cooldown, UNAUTHORIZED_CACHE_MAX_SIZE
    );

    UnauthorizedCache::new(cooldown, UNAUTHORIZED_CACHE_MAX_SIZE)
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.text().is_some())
                .endpoint(handle_command),
        )
}

async fn handle_callback(
    q: CallbackQuery,
    router: Arc<CallbackRouter>,
) -> Result<(), teloxide::RequestError> {
    router.handle(inbound_callback(&q)).await;
    respond(())
}

async fn handle_command(
    msg: Message,
    dispatcher: Arc<CommandDispatcher>,
    username: Arc<BotUsername>,
) -> Result<(), teloxide::RequestError> {
    let Some(command) = msg.text().and_then(parse_command) else {
        return respond(());
    };
    if !command.is_addressed_to(&username.0) {
        debug!(mention = ?command.mention, "Command addressed to another bot");
        return respond(());
    }

    dispatcher.dispatch(&inbound_command(&msg), command).await;
    respond(())
}

fn inbound_callback(q: &CallbackQuery) -> InboundCallback {
    InboundCallback {
        id: q.id.0.clone(),
        from: q.from.id.0.cast_signed(),
        message: q
            .message
            .as_ref()
            .map(|msg| MessageHandle::new(msg.chat().id, msg.id())),
        data: q.data.clone(),
    }
}

fn inbound_command(msg: &Message) -> InboundCommand {
    InboundCommand {
        message: MessageHandle::new(msg.chat.id, msg.id),
        sender: msg.from.as_ref().map(|u| u.id.0.cast_signed()),
        sender_name: sender_name(msg),
        is_private: msg.chat.is_private(),
    }
}

fn sender_name(msg: &Message) -> String {
    if let Some(ref user) = msg.from {
        if let Some(ref username) = user.username {
            return username.clone();
        }
        if !user.first_name.is_empty() {
            return user.first_name.clone();
        }
    }
    "Unknown".to_string()
}
