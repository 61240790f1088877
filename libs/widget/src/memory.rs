use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::error;

use crate::dom::{HostPage, NodeId, ReadyState};

/// Snapshot of one element in a [`MemoryPage`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryNode {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub classes: Vec<String>,
    pub inner_html: Option<String>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
}

impl MemoryNode {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

struct Dom {
    origin: String,
    ready_state: ReadyState,
    next_id: u64,
    nodes: HashMap<NodeId, MemoryNode>,
    head: NodeId,
    body: NodeId,
    console: Vec<String>,
}

impl Dom {
    fn alloc(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, MemoryNode::new(tag));
        id
    }

    fn append(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || !self.nodes.contains_key(&parent) {
            return;
        }
        let previous = match self.nodes.get_mut(&child) {
            Some(node) => node.parent.replace(parent),
            None => return,
        };
        if let Some(previous) = previous.and_then(|p| self.nodes.get_mut(&p)) {
            previous.children.retain(|c| *c != child);
        }
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.children.push(child);
        }
    }

    fn is_attached(&self, mut node: NodeId) -> bool {
        loop {
            if node == self.head || node == self.body {
                return true;
            }
            match self.nodes.get(&node).and_then(|n| n.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    fn render(&self, node: NodeId, out: &mut String) {
        let Some(element) = self.nodes.get(&node) else {
            return;
        };
        let _ = write!(out, "<{}", element.tag);
        for (name, value) in &element.attributes {
            let _ = write!(out, " {}=\"{}\"", name, escape(value));
        }
        if !element.classes.is_empty() {
            let _ = write!(out, " class=\"{}\"", escape(&element.classes.join(" ")));
        }
        out.push('>');
        if let Some(html) = &element.inner_html {
            out.push_str(html);
        }
        for child in &element.children {
            self.render(*child, out);
        }
        let _ = write!(out, "</{}>", element.tag);
    }
}

/// In-memory [`HostPage`] for headless rendering and tests.
pub struct MemoryPage {
    inner: Mutex<Dom>,
}

impl MemoryPage {
    /// A page whose structure is already parsed.
    pub fn new(origin: impl Into<String>) -> Self {
        Self::with_ready_state(origin, ReadyState::Complete)
    }

    /// A page that is still loading; the widget must wait for
    /// `DomContentLoaded`.
    pub fn loading(origin: impl Into<String>) -> Self {
        Self::with_ready_state(origin, ReadyState::Loading)
    }

    fn with_ready_state(origin: impl Into<String>, ready_state: ReadyState) -> Self {
        let mut dom = Dom {
            origin: origin.into(),
            ready_state,
            next_id: 0,
            nodes: HashMap::new(),
            head: NodeId(0),
            body: NodeId(0),
            console: Vec::new(),
        };
        let html = dom.alloc("html");
        dom.head = dom.alloc("head");
        dom.body = dom.alloc("body");
        let (head, body) = (dom.head, dom.body);
        dom.append(html, head);
        dom.append(html, body);
        Self {
            inner: Mutex::new(dom),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Dom> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_ready_state(&self, ready_state: ReadyState) {
        self.lock().ready_state = ready_state;
    }

    pub fn head(&self) -> NodeId {
        self.lock().head
    }

    pub fn body(&self) -> NodeId {
        self.lock().body
    }

    /// Adds an empty `<div id=..>` to the body, like a host-provided mount
    /// point.
    pub fn insert_container(&self, id: &str) -> NodeId {
        let mut dom = self.lock();
        let node = dom.alloc("div");
        if let Some(element) = dom.nodes.get_mut(&node) {
            element.attributes.insert("id".into(), id.into());
        }
        let body = dom.body;
        dom.append(body, node);
        node
    }

    pub fn node(&self, node: NodeId) -> Option<MemoryNode> {
        self.lock().nodes.get(&node).cloned()
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.lock()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Attached elements carrying `class`, oldest first.
    pub fn find_by_class(&self, class: &str) -> Vec<NodeId> {
        let dom = self.lock();
        let mut found = Vec::new();
        let mut stack = vec![dom.body, dom.head];
        while let Some(node) = stack.pop() {
            if let Some(element) = dom.nodes.get(&node) {
                if element.has_class(class) {
                    found.push(node);
                }
                stack.extend(element.children.iter().rev().copied());
            }
        }
        found.sort();
        found
    }

    pub fn console_errors(&self) -> Vec<String> {
        self.lock().console.clone()
    }

    /// Serialises the body subtree.
    pub fn body_html(&self) -> String {
        let dom = self.lock();
        let mut out = String::new();
        dom.render(dom.body, &mut out);
        out
    }

    pub fn head_html(&self) -> String {
        let dom = self.lock();
        let mut out = String::new();
        dom.render(dom.head, &mut out);
        out
    }
}

impl HostPage for MemoryPage {
    fn origin(&self) -> String {
        self.lock().origin.clone()
    }

    fn ready_state(&self) -> ReadyState {
        self.lock().ready_state
    }

    fn create_element(&self, tag: &str) -> NodeId {
        self.lock().alloc(tag)
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let mut dom = self.lock();
        let Some(element) = dom.nodes.get_mut(&node) else {
            return;
        };
        if name == "class" {
            element.classes = value.split_whitespace().map(str::to_string).collect();
        } else {
            element.attributes.insert(name.to_string(), value.to_string());
        }
    }

    fn set_inner_html(&self, node: NodeId, html: &str) {
        if let Some(element) = self.lock().nodes.get_mut(&node) {
            element.inner_html = Some(html.to_string());
        }
    }

    fn set_text_content(&self, node: NodeId, text: &str) {
        if let Some(element) = self.lock().nodes.get_mut(&node) {
            element.inner_html = Some(escape(text));
        }
    }

    fn add_class(&self, node: NodeId, class: &str) {
        if let Some(element) = self.lock().nodes.get_mut(&node) {
            if !element.has_class(class) {
                element.classes.push(class.to_string());
            }
        }
    }

    fn remove_class(&self, node: NodeId, class: &str) {
        if let Some(element) = self.lock().nodes.get_mut(&node) {
            element.classes.retain(|c| c != class);
        }
    }

    fn append_to_head(&self, node: NodeId) {
        let mut dom = self.lock();
        let head = dom.head;
        dom.append(head, node);
    }

    fn append_to_body(&self, node: NodeId) {
        let mut dom = self.lock();
        let body = dom.body;
        dom.append(body, node);
    }

    fn append_child(&self, parent: NodeId, child: NodeId) {
        self.lock().append(parent, child);
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        let dom = self.lock();
        let mut candidates: Vec<NodeId> = dom
            .nodes
            .iter()
            .filter(|(_, element)| element.attribute("id") == Some(id))
            .map(|(node, _)| *node)
            .filter(|node| dom.is_attached(*node))
            .collect();
        candidates.sort();
        candidates.into_iter().next()
    }

    fn console_error(&self, message: &str) {
        error!(target: "host_console", "{message}");
        self.lock().console.push(message.to_string());
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}
