//! Static command table and command-line parsing.

use super::transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use teloxide::types::BotCommand;
use tracing::{debug, error, info};

/// Every command the bot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Greeting, private chats only
    Start,
    /// Running containers
    List,
    /// All containers
    ListAll,
    /// Stop a container
    Stop,
    /// Start a stopped container
    Run,
    /// Inspect record of a container
    Inspect,
    /// Compose stacks
    Stacks,
    /// Container logs
    Logs,
    /// Installed images
    Images,
}

impl CommandKind {
    /// Whether the sender must be on the admin list.
    #[must_use]
    pub const fn requires_admin(self) -> bool {
        !matches!(self, Self::Start)
    }
}

/// One row of the command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    /// Canonical name, published to the client command list
    pub name: &'static str,
    /// Extra names resolving to the same command
    pub aliases: &'static [&'static str],
    /// Description shown by clients
    pub description: &'static str,
    /// Handler selector
    pub kind: CommandKind,
}

/// The command table.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "start",
        aliases: &[],
        description: "Shows info",
        kind: CommandKind::Start,
    },
    CommandSpec {
        name: "ps",
        aliases: &["ls", "list"],
        description: "List running containers",
        kind: CommandKind::List,
    },
    CommandSpec {
        name: "psa",
        aliases: &["lsa", "listall"],
        description: "List all containers",
        kind: CommandKind::ListAll,
    },
    CommandSpec {
        name: "stop",
        aliases: &["down"],
        description: "Stop a running container. <ContainerID>",
        kind: CommandKind::Stop,
    },
    CommandSpec {
        name: "run",
        aliases: &[],
        description: "Start a stopped container. <ContainerID>",
        kind: CommandKind::Run,
    },
    CommandSpec {
        name: "inspect",
        aliases: &["describe"],
        description: "Inspect a container. <ContainerID>",
        kind: CommandKind::Inspect,
    },
    CommandSpec {
        name: "stacks",
        aliases: &["lss", "liststacks"],
        description: "Lists all compose stacks",
        kind: CommandKind::Stacks,
    },
    CommandSpec {
        name: "logs",
        aliases: &[],
        description: "Shows container logs. <ContainerID> <tail>",
        kind: CommandKind::Logs,
    },
    CommandSpec {
        name: "images",
        aliases: &[],
        description: "List all installed images",
        kind: CommandKind::Images,
    },
];

/// Resolve a command name or alias.
#[must_use]
pub fn lookup(name: &str) -> Option<CommandKind> {
    COMMANDS
        .iter()
        .find(|entry| entry.name == name || entry.aliases.contains(&name))
        .map(|entry| entry.kind)
}

/// A recognized command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Which command
    pub kind: CommandKind,
    /// Bot username after `@`, if the command was addressed
    pub mention: Option<String>,
    /// Everything after the command word, trimmed
    pub payload: String,
}

impl ParsedCommand {
    /// Whether the command is meant for the bot named `username`.
    #[must_use]
    pub fn is_addressed_to(&self, username: &str) -> bool {
        self.mention
            .as_deref()
            .is_none_or(|mention| mention.eq_ignore_ascii_case(username))
    }
}

/// Parse `/name[@bot] [payload]`. Names are case-sensitive.
///
/// # Examples
///
/// ```
/// use teledock_transport_telegram::bot::commands::{parse_command, CommandKind};
/// let cmd = parse_command("/down@teledock_bot  4f2a9c01bd ").expect("known command");
/// assert_eq!(cmd.kind, CommandKind::Stop);
/// assert_eq!(cmd.payload, "4f2a9c01bd");
/// ```
#[must_use]
pub fn parse_command(text: &str) -> Option<ParsedCommand> {
    let line = text.trim_start().strip_prefix('/')?;
    let (head, payload) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(head, rest)| (head, rest.trim()));
    let (name, mention) = match head.split_once('@') {
        Some((name, bot)) => (name, Some(bot.to_string())),
        None => (head, None),
    };

    lookup(name).map(|kind| ParsedCommand {
        kind,
        mention,
        payload: payload.to_string(),
    })
}

/// Publishes the command list to the transport exactly once.
#[derive(Debug, Default)]
pub struct CommandTable {
    registered: AtomicBool,
}

impl CommandTable {
    /// Create an unregistered table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            registered: AtomicBool::new(false),
        }
    }

    /// Canonical names and descriptions in table order.
    #[must_use]
    pub fn bot_commands() -> Vec<BotCommand> {
        COMMANDS
            .iter()
            .map(|entry| BotCommand::new(entry.name, entry.description))
            .collect()
    }

    /// Publish the command list. Later calls are no-ops.
    ///
    /// Returns `true` if this call performed the registration. A rejected
    /// publication is logged and not retried; commands keep working without it.
    pub async fn register(&self, transport: &dyn Transport) -> bool {
        if self.registered.swap(true, Ordering::SeqCst) {
            debug!("Commands already registered");
            return false;
        }

        info!(count = COMMANDS.len(), "Registering commands");
        if let Err(e) = transport.set_commands(Self::bot_commands()).await {
            error!(error = %e, "Failed to publish the command list");
        }
        true
    }
}
