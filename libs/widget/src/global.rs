//! Process-wide default instance for hosts that drive the widget through a
//! single global object instead of holding a [`WidgetHandle`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::debug;

use crate::{
    dom::SharedPage,
    scheduler::SharedScheduler,
    widget::{Widget, WidgetHandle},
};

static DEFAULT_INSTANCE: Lazy<Mutex<Option<WidgetHandle>>> = Lazy::new(|| Mutex::new(None));

fn slot() -> MutexGuard<'static, Option<WidgetHandle>> {
    DEFAULT_INSTANCE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Makes `handle` the default instance, returning the one it replaces.
pub fn install_default(handle: WidgetHandle) -> Option<WidgetHandle> {
    debug!(instance = handle.instance_id(), "installing default chatkit widget");
    slot().replace(handle)
}

pub fn default_instance() -> Option<WidgetHandle> {
    slot().clone()
}

pub fn clear_default() -> Option<WidgetHandle> {
    slot().take()
}

/// Initialises a widget and installs it as the default instance.
pub fn boot(page: SharedPage, scheduler: SharedScheduler, overrides: &Value) -> WidgetHandle {
    let handle = Widget::init(page, scheduler, overrides);
    install_default(handle.clone());
    handle
}

pub fn open() {
    if let Some(handle) = default_instance() {
        handle.open();
    }
}

pub fn close() {
    if let Some(handle) = default_instance() {
        handle.close();
    }
}

pub fn toggle() {
    if let Some(handle) = default_instance() {
        handle.toggle();
    }
}

pub fn is_open() -> bool {
    default_instance().is_some_and(|handle| handle.is_open())
}
