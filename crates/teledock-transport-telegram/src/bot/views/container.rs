//! Container UI components
//!
//! Contains text messages and HTML cards for containers, images and stacks.

use html_escape::encode_text;
use teledock_core::config::{MESSAGE_CHUNK_CHARS, RESOURCE_ID_DISPLAY_LEN};
use teledock_core::runtime::{ImageSummary, Resource, ResourceState};
use teledock_core::utils::chunk_text;

// ─────────────────────────────────────────────────────────────────────────────
// Trait definition
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for container UI view rendering
///
/// Provides all text messages and formatting for container interactions.
/// Every returned string is HTML; dynamic values are escaped.
pub trait ContainerView {
    /// Greeting shown by `/start`
    fn start_info() -> &'static str;

    /// Prompt attached to a selection menu
    fn choose_container() -> &'static str;

    /// Reply when a selection menu would be empty
    fn nothing_to_choose() -> &'static str;

    /// Empty container listing
    fn no_containers() -> &'static str;

    /// Empty image listing
    fn no_images() -> &'static str;

    /// Empty stack listing
    fn no_stacks() -> &'static str;

    /// A container was stopped
    fn resource_stopped(id: &str) -> String;

    /// A container was started
    fn resource_started(id: &str) -> String;

    /// An action on a container failed
    fn resource_errored(id: &str, error: &str) -> String;

    /// A runtime error shown verbatim
    fn runtime_error(error: &str) -> String;

    /// One container card
    fn container_card(resource: &Resource) -> String;

    /// One image card
    fn image_card(image: &ImageSummary) -> String;

    /// One compose stack card
    fn stack_card(name: &str, services: usize) -> String;

    /// A fragment of raw output in a monospace block
    fn code_block(chunk: &str) -> String;
}

// ─────────────────────────────────────────────────────────────────────────────
// Default implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Default English-language implementation of `ContainerView`
pub struct DefaultContainerView;

impl ContainerView for DefaultContainerView {
    fn start_info() -> &'static str {
        "🐳 <b>Teledock</b>\n\n\
        Control the containers of this host from Telegram.\n\
        Send /ps to list running containers or /psa to list all of them."
    }

    fn choose_container() -> &'static str {
        "Choose a container"
    }

    fn nothing_to_choose() -> &'static str {
        "No containers to choose from"
    }

    fn no_containers() -> &'static str {
        "No containers running"
    }

    fn no_images() -> &'static str {
        "No images found"
    }

    fn no_stacks() -> &'static str {
        "No stacks running"
    }

    fn resource_stopped(id: &str) -> String {
        format!("Resource {} stopped", encode_text(id))
    }

    fn resource_started(id: &str) -> String {
        format!("Resource {} started", encode_text(id))
    }

    fn resource_errored(id: &str, error: &str) -> String {
        format!("Resource {} errored: {}", encode_text(id), encode_text(error))
    }

    fn runtime_error(error: &str) -> String {
        format!("⚠️ {}", encode_text(error))
    }

    fn container_card(resource: &Resource) -> String {
        let mut lines = vec![
            format!(
                "{}  <b>{}</b>",
                state_emoji(resource.state),
                encode_text(resource.display_name())
            ),
            padded_field("ID:", resource.short_id(RESOURCE_ID_DISPLAY_LEN)),
            padded_field("STATUS:", &resource.status),
            padded_field("IMAGE:", &resource.image),
        ];
        if let Some(stack) = &resource.stack {
            lines.push(padded_field("STACK:", stack));
        }
        lines.join("\n")
    }

    fn image_card(image: &ImageSummary) -> String {
        format!(
            "<b>Tag: </b><code>{}</code>\n<b>ID: </b><code>{}</code>",
            encode_text(image.primary_tag()),
            encode_text(image.short_id())
        )
    }

    fn stack_card(name: &str, services: usize) -> String {
        format!(
            "<b>{}</b>\n{}",
            encode_text(name),
            padded_field("SERVICES:", &services.to_string())
        )
    }

    fn code_block(chunk: &str) -> String {
        if chunk.is_empty() {
            return "<i>(empty)</i>".to_string();
        }
        format!("<code>{}</code>", encode_text(chunk))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Emoji shown in front of a container name.
#[must_use]
pub const fn state_emoji(state: ResourceState) -> &'static str {
    match state {
        ResourceState::Running => "✅",
        ResourceState::Created => "🥚",
        ResourceState::Restarting => "♻️",
        ResourceState::Removing => "🗑️",
        ResourceState::Paused => "⏸️",
        ResourceState::Exited => "⛔",
        ResourceState::Dead => "💀",
        ResourceState::Unknown => "",
    }
}

/// Split raw output into monospace message bodies.
///
/// Chunking happens before escaping, so entities are never cut in half.
#[must_use]
pub fn code_blocks<V: ContainerView>(raw: &str) -> Vec<String> {
    chunk_text(raw, MESSAGE_CHUNK_CHARS)
        .iter()
        .map(|chunk| V::code_block(&chunk.content))
        .collect()
}

/// Label padded to eight columns followed by the value, both monospace.
fn padded_field(label: &str, value: &str) -> String {
    format!("<code> {label:<8}</code><code>{}</code>", encode_text(value))
}
