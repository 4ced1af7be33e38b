//! Inline selection menus built from container listings.

use super::callback::{CallbackAction, CallbackToken};
use std::collections::HashSet;
use teledock_core::config::RESOURCE_ID_PREFIX_LEN;
use teledock_core::runtime::Resource;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::warn;

/// Buttons per menu row.
pub const MENU_ROW_WIDTH: usize = 3;

/// One selectable container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuButton {
    /// Container name shown on the button
    pub label: String,
    /// Token sent back when the button is pressed
    pub token: CallbackToken,
}

/// Grid of buttons, [`MENU_ROW_WIDTH`] per row; the last row may be short.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Menu {
    /// Rows in display order
    pub rows: Vec<Vec<MenuButton>>,
}

impl Menu {
    /// Whether the menu has no buttons.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total number of buttons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Convert into a Telegram inline keyboard.
    #[must_use]
    pub fn into_markup(self) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup::new(self.rows.into_iter().map(|row| {
            row.into_iter()
                .map(|button| InlineKeyboardButton::callback(button.label, button.token.encode()))
                .collect::<Vec<_>>()
        }))
    }
}

/// Build a selection menu for `action` over `resources`, in listing order.
///
/// Each button carries the first [`RESOURCE_ID_PREFIX_LEN`] characters of the
/// container id. Two containers sharing that prefix cannot be told apart by
/// the daemon; this is logged but not resolved.
#[must_use]
pub fn build_menu(resources: &[Resource], action: CallbackAction) -> Menu {
    let mut seen = HashSet::with_capacity(resources.len());
    let buttons: Vec<MenuButton> = resources
        .iter()
        .map(|resource| {
            let prefix = resource.short_id(RESOURCE_ID_PREFIX_LEN).to_string();
            if !seen.insert(prefix.clone()) {
                warn!(prefix = %prefix, name = %resource.display_name(), "Duplicate container id prefix in menu");
            }
            MenuButton {
                label: resource.display_name().to_string(),
                token: CallbackToken::new(action, prefix),
            }
        })
        .collect();

    Menu {
        rows: buttons
            .chunks(MENU_ROW_WIDTH)
            .map(<[MenuButton]>::to_vec)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teledock_core::runtime::ResourceState;
    use teloxide::types::InlineKeyboardButtonKind;

    fn resources(count: usize) -> Vec<Resource> {
        (0..count)
            .map(|n| Resource {
                id: format!("{n:0>10}abcdef"),
                name: format!("/app-{n}"),
                state: ResourceState::Running,
                status: "Up".to_string(),
                image: "alpine".to_string(),
                stack: None,
            })
            .collect()
    }

    #[test]
    fn test_empty_listing_gives_empty_menu() {
        let menu = build_menu(&[], CallbackAction::Stop);
        assert!(menu.is_empty());
        assert_eq!(menu.len(), 0);
    }

    #[test]
    fn test_row_shape() {
        for (count, expected) in [
            (1, vec![1]),
            (3, vec![3]),
            (4, vec![3, 1]),
            (7, vec![3, 3, 1]),
            (9, vec![3, 3, 3]),
        ] {
            let menu = build_menu(&resources(count), CallbackAction::Inspect);
            let shape: Vec<usize> = menu.rows.iter().map(Vec::len).collect();
            assert_eq!(shape, expected, "{count} containers");
            assert_eq!(menu.rows.len(), count.div_ceil(MENU_ROW_WIDTH));
        }
    }

    #[test]
    fn test_buttons_keep_listing_order_and_strip_slash() {
        let menu = build_menu(&resources(5), CallbackAction::Logs);
        let labels: Vec<&str> = menu
            .rows
            .iter()
            .flatten()
            .map(|b| b.label.as_str())
            .collect();
        assert_eq!(labels, vec!["app-0", "app-1", "app-2", "app-3", "app-4"]);

        let second = &menu.rows[0][1];
        assert_eq!(second.token.action, CallbackAction::Logs);
        assert_eq!(second.token.prefix, "0000000001");
    }

    #[test]
    fn test_short_ids_are_used_whole() {
        let mut listing = resources(1);
        listing[0].id = "abc123".to_string();
        let menu = build_menu(&listing, CallbackAction::Start);
        assert_eq!(menu.rows[0][0].token.prefix, "abc123");
    }

    #[test]
    fn test_markup_carries_encoded_tokens() {
        let markup = build_menu(&resources(4), CallbackAction::Stop).into_markup();
        assert_eq!(markup.inline_keyboard.len(), 2);
        let button = &markup.inline_keyboard[1][0];
        assert_eq!(button.text, "app-3");
        assert_eq!(
            button.kind,
            InlineKeyboardButtonKind::CallbackData("stop:0000000003".to_string())
        );
    }
}
