//! The slice of the host page the widget touches.
//!
//! Methods take `&self` the way browser DOM bindings do; implementations keep
//! their own interior state. A host embedding the widget in a real browser
//! forwards these calls to the document, and [`crate::MemoryPage`] keeps the
//! tree in memory for headless rendering and tests.

use std::sync::Arc;

/// Opaque handle to an element owned by the page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

pub trait HostPage: Send + Sync {
    /// Origin of the host page, used as the default framed URL.
    fn origin(&self) -> String;
    fn ready_state(&self) -> ReadyState;

    fn create_element(&self, tag: &str) -> NodeId;
    fn set_attribute(&self, node: NodeId, name: &str, value: &str);
    fn set_inner_html(&self, node: NodeId, html: &str);
    fn set_text_content(&self, node: NodeId, text: &str);
    fn add_class(&self, node: NodeId, class: &str);
    fn remove_class(&self, node: NodeId, class: &str);

    fn append_to_head(&self, node: NodeId);
    fn append_to_body(&self, node: NodeId);
    fn append_child(&self, parent: NodeId, child: NodeId);
    /// Looks up an attached element by its `id` attribute.
    fn element_by_id(&self, id: &str) -> Option<NodeId>;

    /// The page's diagnostic console.
    fn console_error(&self, message: &str);
}

pub type SharedPage = Arc<dyn HostPage>;

/// Events the embedding runtime forwards to widget instances.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageEvent {
    DomContentLoaded,
    Click(NodeId),
    KeyDown(String),
}

impl PageEvent {
    pub fn key(key: impl Into<String>) -> Self {
        PageEvent::KeyDown(key.into())
    }

    pub fn escape() -> Self {
        PageEvent::KeyDown(ESCAPE_KEY.into())
    }
}

pub const ESCAPE_KEY: &str = "Escape";
