// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context-menu engine.
//!
//! Menus are trees of items and separators.  Opening clamps the box into the
//! viewport (flipping when a right/bottom edge would overflow); at most one
//! submenu chain is active; Escape and background clicks dismiss; selecting
//! a leaf invokes its action and closes the whole chain.

use std::sync::Arc;

use parking_lot::Mutex;

/// Menus keep this gap from every viewport edge.
pub const VIEWPORT_MARGIN: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Invoked when a leaf item is selected.
pub type MenuAction = Arc<dyn Fn() + Send + Sync>;

/// One row of a menu.
pub enum MenuNode {
    Item(MenuItem),
    Separator,
}

pub struct MenuItem {
    pub id: String,
    pub label: String,
    pub icon: Option<String>,
    pub shortcut: Option<String>,
    pub disabled: bool,
    pub danger: bool,
    pub children: Vec<MenuNode>,
    pub on_select: Option<MenuAction>,
}

impl MenuItem {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_owned(),
            label: label.to_owned(),
            icon: None,
            shortcut: None,
            disabled: false,
            danger: false,
            children: Vec::new(),
            on_select: None,
        }
    }

    pub fn icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_owned());
        self
    }

    pub fn shortcut(mut self, shortcut: &str) -> Self {
        self.shortcut = Some(shortcut.to_owned());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn danger(mut self) -> Self {
        self.danger = true;
        self
    }

    pub fn children(mut self, children: Vec<MenuNode>) -> Self {
        self.children = children;
        self
    }

    pub fn on_select(mut self, action: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_select = Some(Arc::new(action));
        self
    }
}

/// Clamp a menu box opened at `anchor` into the viewport.
///
/// The box flips to the other side of the anchor when its right/bottom edge
/// would overflow, then lands fully inside
/// `[VIEWPORT_MARGIN, viewport − VIEWPORT_MARGIN]` on both axes.
pub fn clamp_to_viewport(anchor: Point, menu: Size, viewport: Size) -> Point {
    let clamp_axis = |at: f64, extent: f64, limit: f64| {
        let mut position = at;
        if position + extent > limit - VIEWPORT_MARGIN {
            position = at - extent;
        }
        let max = (limit - VIEWPORT_MARGIN - extent).max(VIEWPORT_MARGIN);
        position.clamp(VIEWPORT_MARGIN, max)
    };
    Point {
        x: clamp_axis(anchor.x, menu.width, viewport.width),
        y: clamp_axis(anchor.y, menu.height, viewport.height),
    }
}

/// Outcome of a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// A leaf action ran; the menu closed.
    Invoked(String),
    /// A parent was selected; its submenu is now the active chain.
    OpenedSubmenu,
    /// Disabled item, separator, or bad path.
    Ignored,
}

struct MenuState {
    position: Option<Point>,
    chain: Vec<usize>,
}

/// An open-state machine over a fixed item tree.
pub struct ContextMenu {
    items: Vec<MenuNode>,
    state: Mutex<MenuState>,
}

impl ContextMenu {
    pub fn new(items: Vec<MenuNode>) -> Self {
        Self { items, state: Mutex::new(MenuState { position: None, chain: Vec::new() }) }
    }

    /// Open at cursor coordinates, measuring against the viewport.
    /// Returns the clamped position.
    pub fn open(&self, anchor: Point, menu: Size, viewport: Size) -> Point {
        let position = clamp_to_viewport(anchor, menu, viewport);
        let mut state = self.state.lock();
        state.position = Some(position);
        state.chain.clear();
        position
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().position.is_some()
    }

    pub fn position(&self) -> Option<Point> {
        self.state.lock().position
    }

    /// The active submenu chain as a path of item indices.
    pub fn open_chain(&self) -> Vec<usize> {
        self.state.lock().chain.clone()
    }

    /// Escape pressed.
    pub fn handle_escape(&self) {
        self.dismiss();
    }

    /// Click landed outside the menu.
    pub fn handle_background_click(&self) {
        self.dismiss();
    }

    fn dismiss(&self) {
        let mut state = self.state.lock();
        state.position = None;
        state.chain.clear();
    }

    /// Pointer entered the item at `path`.  A parent with children becomes
    /// the active chain; hovering elsewhere truncates any deeper chain.
    pub fn hover(&self, path: &[usize]) {
        if !self.is_open() {
            return;
        }
        let Some(item) = self.item_at(path) else {
            return;
        };
        let mut state = self.state.lock();
        if item.disabled || item.children.is_empty() {
            // Keep only the part of the chain this hover is inside of.
            let keep = path.len().saturating_sub(1);
            let chain_len = state.chain.len();
            state.chain.truncate(keep.min(chain_len));
        } else {
            state.chain = path.to_vec();
        }
    }

    /// Select the item at `path`.
    pub fn select(&self, path: &[usize]) -> SelectOutcome {
        if !self.is_open() {
            return SelectOutcome::Ignored;
        }
        let Some(item) = self.item_at(path) else {
            return SelectOutcome::Ignored;
        };
        if item.disabled {
            return SelectOutcome::Ignored;
        }
        if !item.children.is_empty() {
            self.state.lock().chain = path.to_vec();
            return SelectOutcome::OpenedSubmenu;
        }
        let id = item.id.clone();
        let action = item.on_select.clone();
        self.dismiss();
        if let Some(action) = action {
            action();
        }
        SelectOutcome::Invoked(id)
    }

    fn item_at(&self, path: &[usize]) -> Option<&MenuItem> {
        let mut nodes = &self.items;
        let mut found: Option<&MenuItem> = None;
        for &index in path {
            match nodes.get(index)? {
                MenuNode::Item(item) => {
                    found = Some(item);
                    nodes = &item.children;
                }
                MenuNode::Separator => return None,
            }
        }
        found
    }
}

#[cfg(test)]
#[path = "menu_tests.rs"]
mod tests;
