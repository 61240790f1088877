use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use rand::Rng;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::{
    config::WidgetConfig,
    dom::{ESCAPE_KEY, HostPage, NodeId, PageEvent, ReadyState, SharedPage},
    error::WidgetError,
    scheduler::{ScheduledTask, SharedScheduler},
    style::{
        BUTTON_CLASS, CLOSE_ANIMATION, CLOSING_CLASS, INLINE_CLASS, INSTANCE_ATTRIBUTE,
        OPEN_CLASS, OVERLAY_CLASS, WINDOW_CLASS, render_stylesheet,
    },
};

pub const INSTANCE_PREFIX: &str = "chatkit-";
const INSTANCE_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub const CLOSE_GLYPH: &str = "✕";
pub const OPEN_LABEL: &str = "Open chat";
pub const CLOSE_LABEL: &str = "Close chat";
pub const FRAME_TITLE: &str = "Chat Widget";

/// `chatkit-` followed by nine random base-36 characters.
pub fn generate_instance_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..INSTANCE_SUFFIX_LEN)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect();
    format!("{INSTANCE_PREFIX}{suffix}")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountState {
    /// Waiting for the page to finish parsing.
    Pending,
    Floating,
    Inline(NodeId),
    /// The inline target was missing; the instance does nothing.
    Failed,
}

#[derive(Clone, Copy, Debug)]
struct Floating {
    launcher: NodeId,
    panel: NodeId,
    overlay: NodeId,
}

struct WidgetState {
    mount: MountState,
    open: bool,
    generation: u64,
    cleanup: Option<ScheduledTask>,
}

impl WidgetState {
    fn is_floating(&self) -> bool {
        self.mount == MountState::Floating
    }
}

pub struct Widget {
    page: SharedPage,
    scheduler: SharedScheduler,
    config: WidgetConfig,
    instance_id: String,
    floating: Option<Floating>,
    state: Mutex<WidgetState>,
}

/// Cloneable handle to one widget instance.
#[derive(Clone)]
pub struct WidgetHandle(Arc<Widget>);

impl Widget {
    /// Builds an instance on `page` from host `overrides` and mounts it, or
    /// waits for [`PageEvent::DomContentLoaded`] while the page is loading.
    pub fn init(page: SharedPage, scheduler: SharedScheduler, overrides: &Value) -> WidgetHandle {
        let config = WidgetConfig::merge(&page.origin(), overrides);
        let instance_id = generate_instance_id();

        let style = page.create_element("style");
        page.set_attribute(style, INSTANCE_ATTRIBUTE, &instance_id);
        page.set_inner_html(style, &render_stylesheet(&config, &instance_id));
        page.append_to_head(style);

        let floating = (!config.position().is_inline())
            .then(|| build_floating(page.as_ref(), &config, &instance_id));

        let widget = Arc::new(Widget {
            page,
            scheduler,
            config,
            instance_id,
            floating,
            state: Mutex::new(WidgetState {
                mount: MountState::Pending,
                open: false,
                generation: 0,
                cleanup: None,
            }),
        });

        if widget.page.ready_state() == ReadyState::Loading {
            debug!(instance = %widget.instance_id, "page still loading; deferring mount");
        } else {
            widget.mount();
        }
        WidgetHandle(widget)
    }

    fn lock(&self) -> MutexGuard<'_, WidgetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mount(&self) {
        let mut state = self.lock();
        if state.mount != MountState::Pending {
            return;
        }
        state.mount = match self.floating {
            Some(nodes) => {
                self.page.append_to_body(nodes.overlay);
                self.page.append_to_body(nodes.launcher);
                self.page.append_to_body(nodes.panel);
                MountState::Floating
            }
            None => match self.mount_inline() {
                Ok(frame) => MountState::Inline(frame),
                Err(err) => {
                    self.page.console_error(&err.to_string());
                    error!(instance = %self.instance_id, %err, "chatkit widget not mounted");
                    MountState::Failed
                }
            },
        };
        info!(
            instance = %self.instance_id,
            position = %self.config.position(),
            mount = ?state.mount,
            "chatkit widget initialised"
        );
    }

    fn mount_inline(&self) -> Result<NodeId, WidgetError> {
        let target = self.config.target_element();
        let container = self
            .page
            .element_by_id(target)
            .ok_or_else(|| WidgetError::TargetNotFound(target.to_string()))?;

        let frame = self.page.create_element("iframe");
        self.page.set_attribute(frame, "class", INLINE_CLASS);
        self.page.set_attribute(frame, INSTANCE_ATTRIBUTE, &self.instance_id);
        self.page.set_attribute(frame, "src", self.config.base_url());
        self.page.set_attribute(frame, "title", FRAME_TITLE);
        self.page.set_attribute(frame, "allow", self.config.frame_permissions());
        self.page.append_child(container, frame);
        Ok(frame)
    }

    fn open_locked(&self, state: &mut WidgetState) {
        let Some(nodes) = self.floating else {
            return;
        };
        if !state.is_floating() || state.open {
            return;
        }
        state.open = true;
        state.generation += 1;
        if let Some(cleanup) = state.cleanup.take() {
            cleanup.cancel();
        }

        self.page.remove_class(nodes.panel, CLOSING_CLASS);
        self.page.add_class(nodes.panel, OPEN_CLASS);
        self.page.set_attribute(nodes.panel, "aria-hidden", "false");
        self.page.add_class(nodes.overlay, OPEN_CLASS);
        self.page.set_text_content(nodes.launcher, CLOSE_GLYPH);
        self.page.set_attribute(nodes.launcher, "aria-label", CLOSE_LABEL);
        debug!(instance = %self.instance_id, "chatkit widget opened");
    }

    fn close_locked(self: &Arc<Self>, state: &mut WidgetState) {
        let Some(nodes) = self.floating else {
            return;
        };
        if !state.is_floating() || !state.open {
            return;
        }
        state.open = false;
        state.generation += 1;
        if let Some(previous) = state.cleanup.take() {
            previous.cancel();
        }

        self.page.remove_class(nodes.panel, OPEN_CLASS);
        self.page.add_class(nodes.panel, CLOSING_CLASS);
        self.page.remove_class(nodes.overlay, OPEN_CLASS);
        self.page.set_inner_html(nodes.launcher, self.config.button_text());
        self.page.set_attribute(nodes.launcher, "aria-label", OPEN_LABEL);

        let generation = state.generation;
        let weak: Weak<Widget> = Arc::downgrade(self);
        state.cleanup = Some(self.scheduler.schedule(
            CLOSE_ANIMATION,
            Box::new(move || {
                if let Some(widget) = weak.upgrade() {
                    widget.finish_close(generation);
                }
            }),
        ));
        debug!(instance = %self.instance_id, "chatkit widget closing");
    }

    fn finish_close(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation {
            return;
        }
        state.cleanup = None;
        if let Some(nodes) = self.floating {
            self.page.remove_class(nodes.panel, CLOSING_CLASS);
            self.page.set_attribute(nodes.panel, "aria-hidden", "true");
        }
    }
}

fn build_floating(page: &dyn HostPage, config: &WidgetConfig, instance_id: &str) -> Floating {
    let launcher = page.create_element("button");
    page.set_attribute(launcher, "class", BUTTON_CLASS);
    page.set_attribute(launcher, INSTANCE_ATTRIBUTE, instance_id);
    page.set_attribute(launcher, "type", "button");
    page.set_attribute(launcher, "aria-label", OPEN_LABEL);
    page.set_inner_html(launcher, config.button_text());

    let panel = page.create_element("iframe");
    page.set_attribute(panel, "class", WINDOW_CLASS);
    page.set_attribute(panel, INSTANCE_ATTRIBUTE, instance_id);
    page.set_attribute(panel, "id", instance_id);
    page.set_attribute(panel, "src", config.base_url());
    page.set_attribute(panel, "title", FRAME_TITLE);
    page.set_attribute(panel, "allow", config.frame_permissions());
    page.set_attribute(panel, "aria-hidden", "true");

    let overlay = page.create_element("div");
    page.set_attribute(overlay, "class", OVERLAY_CLASS);
    page.set_attribute(overlay, INSTANCE_ATTRIBUTE, instance_id);

    Floating {
        launcher,
        panel,
        overlay,
    }
}

impl WidgetHandle {
    pub fn instance_id(&self) -> &str {
        &self.0.instance_id
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.0.config
    }

    pub fn mount_state(&self) -> MountState {
        self.0.lock().mount
    }

    pub fn launcher(&self) -> Option<NodeId> {
        self.0.floating.map(|nodes| nodes.launcher)
    }

    pub fn panel(&self) -> Option<NodeId> {
        self.0.floating.map(|nodes| nodes.panel)
    }

    pub fn overlay(&self) -> Option<NodeId> {
        self.0.floating.map(|nodes| nodes.overlay)
    }

    /// Always false inline or before the floating surfaces are mounted.
    pub fn is_open(&self) -> bool {
        let state = self.0.lock();
        state.is_floating() && state.open
    }

    pub fn open(&self) {
        let mut state = self.0.lock();
        self.0.open_locked(&mut state);
    }

    pub fn close(&self) {
        let mut state = self.0.lock();
        self.0.close_locked(&mut state);
    }

    pub fn toggle(&self) {
        let mut state = self.0.lock();
        if state.open {
            self.0.close_locked(&mut state);
        } else {
            self.0.open_locked(&mut state);
        }
    }

    /// Feeds a page event to this instance. Events for other elements are
    /// ignored.
    pub fn handle_event(&self, event: &PageEvent) {
        match event {
            PageEvent::DomContentLoaded => self.0.mount(),
            PageEvent::Click(node) => {
                let Some(nodes) = self.0.floating else {
                    return;
                };
                if *node == nodes.launcher {
                    self.toggle();
                } else if *node == nodes.overlay {
                    self.close();
                }
            }
            PageEvent::KeyDown(key) if key == ESCAPE_KEY => self.close(),
            PageEvent::KeyDown(_) => {}
        }
    }
}

impl std::fmt::Debug for WidgetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetHandle")
            .field("instance_id", &self.0.instance_id)
            .field("position", &self.0.config.position())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tracing_test::traced_test;

    use super::*;
    use crate::{memory::MemoryPage, scheduler::ManualScheduler};

    #[test]
    fn instance_ids_are_prefixed_base36() {
        let id = generate_instance_id();
        let suffix = id.strip_prefix(INSTANCE_PREFIX).unwrap();
        assert_eq!(suffix.len(), 9);
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(generate_instance_id(), id);
    }

    #[test]
    #[traced_test]
    fn missing_inline_target_is_reported_once() {
        let page = Arc::new(MemoryPage::new("https://host.example"));
        let handle = Widget::init(
            page.clone(),
            Arc::new(ManualScheduler::new()),
            &json!({"position": "inline", "targetElement": "nowhere"}),
        );

        assert_eq!(handle.mount_state(), MountState::Failed);
        assert_eq!(
            page.console_errors(),
            vec!["ChatKit: Target element not found: nowhere".to_string()]
        );
        assert!(logs_contain("chatkit widget not mounted"));

        handle.handle_event(&PageEvent::DomContentLoaded);
        assert_eq!(page.console_errors().len(), 1);
    }

    #[test]
    fn stale_cleanup_is_ignored() {
        let page = Arc::new(MemoryPage::new("https://host.example"));
        let handle = Widget::init(page.clone(), Arc::new(ManualScheduler::new()), &json!({}));
        handle.open();
        handle.close();
        let panel = handle.panel().unwrap();

        let current = handle.0.lock().generation;
        handle.0.finish_close(current - 1);
        assert!(page.node(panel).unwrap().has_class(CLOSING_CLASS));

        handle.0.finish_close(current);
        assert!(!page.node(panel).unwrap().has_class(CLOSING_CLASS));
    }
}
