//! In-process model of the browsing-context hierarchy.
//!
//! Each frame owns an inbox of posted messages and runs whatever logic its
//! owner attaches to it; frames never share memory. Delivery is asynchronous,
//! non-blocking, and order-preserving per sender, which is all the underlying
//! platform guarantees. Cross-origin boundaries are modeled by opaque frames:
//! probing their children fails the way a denied property access would.

use std::sync::{Arc, Mutex, Weak};

use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

use crate::channel::MessagePort;

/// Target-origin wildcard accepted by [`FrameHandle::post_message`].
pub const WILDCARD_ORIGIN: &str = "*";

/// Denied access across a frame boundary (the SecurityError analog).
#[derive(Debug, Error)]
#[error("cross-origin frame access denied")]
pub struct FrameAccessError;

/// A message delivered to a frame's inbox: the serialized payload plus any
/// channel endpoints transferred along with it.
#[derive(Debug)]
pub struct PostedMessage {
    pub data: String,
    pub ports: Vec<MessagePort>,
}

/// Attributes for a created child frame.
///
/// Layout-neutralizing attributes (no border, no margins, no scrolling,
/// transparency allowed) are always forced and therefore not represented;
/// a created frame can never visibly alter the host page.
#[derive(Debug, Clone)]
pub struct FrameAttrs {
    pub name: Option<String>,
    pub width: u32,
    pub height: u32,
    pub hidden: bool,
    /// Model a cross-origin boundary: property access on this frame is denied.
    pub opaque: bool,
}

impl Default for FrameAttrs {
    fn default() -> Self {
        Self {
            name: None,
            width: 0,
            height: 0,
            hidden: true,
            opaque: false,
        }
    }
}

#[derive(Debug)]
struct FrameNode {
    location: Url,
    attrs: FrameAttrs,
    parent: Weak<FrameNode>,
    children: Mutex<Vec<FrameHandle>>,
    inbox_tx: mpsc::UnboundedSender<PostedMessage>,
    inbox_rx: Mutex<Option<mpsc::UnboundedReceiver<PostedMessage>>>,
}

/// Shared handle to one browsing context. Cheap to clone; the frame lives as
/// long as any handle (or its parent) does.
#[derive(Debug, Clone)]
pub struct FrameHandle(Arc<FrameNode>);

impl FrameHandle {
    fn build(location: Url, attrs: FrameAttrs, parent: Weak<FrameNode>) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        FrameHandle(Arc::new(FrameNode {
            location,
            attrs,
            parent,
            children: Mutex::new(Vec::new()),
            inbox_tx,
            inbox_rx: Mutex::new(Some(inbox_rx)),
        }))
    }

    /// Create a top-level context at the given location.
    pub fn top(location: &str) -> Result<Self, url::ParseError> {
        Ok(Self::build(
            Url::parse(location)?,
            FrameAttrs::default(),
            Weak::new(),
        ))
    }

    /// Create a nested context inheriting this frame's location, the way an
    /// inline (srcdoc-style) frame does.
    pub fn create_child(&self, attrs: FrameAttrs) -> FrameHandle {
        let child = Self::build(self.0.location.clone(), attrs, Arc::downgrade(&self.0));
        self.lock_children().push(child.clone());
        child
    }

    /// Create a nested context with its own document location.
    pub fn create_child_at(
        &self,
        location: &str,
        attrs: FrameAttrs,
    ) -> Result<FrameHandle, url::ParseError> {
        let child = Self::build(Url::parse(location)?, attrs, Arc::downgrade(&self.0));
        self.lock_children().push(child.clone());
        Ok(child)
    }

    pub fn parent(&self) -> Option<FrameHandle> {
        self.0.parent.upgrade().map(FrameHandle)
    }

    /// Whether two handles refer to the same browsing context.
    pub fn same_frame(&self, other: &FrameHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_top(&self) -> bool {
        self.0.parent.strong_count() == 0
    }

    pub fn location(&self) -> &Url {
        &self.0.location
    }

    /// Live origin of this context, in ASCII serialization.
    pub fn origin(&self) -> String {
        self.0.location.origin().ascii_serialization()
    }

    pub fn name(&self) -> Option<&str> {
        self.0.attrs.name.as_deref()
    }

    pub fn attrs(&self) -> &FrameAttrs {
        &self.0.attrs
    }

    pub fn child_count(&self) -> usize {
        self.lock_children().len()
    }

    /// Probe for a named child frame. Fails on an opaque (cross-origin)
    /// frame instead of answering.
    pub fn has_named_child(&self, name: &str) -> Result<bool, FrameAccessError> {
        if self.0.attrs.opaque {
            return Err(FrameAccessError);
        }
        Ok(self
            .lock_children()
            .iter()
            .any(|child| child.name() == Some(name)))
    }

    /// Post a serialized message to this frame, transferring `ports` with it.
    ///
    /// Never blocks. Delivery is refused when `target_origin` is neither the
    /// wildcard nor this frame's live origin; refusal is silent at the
    /// protocol level, the platform only logs it.
    pub fn post_message(
        &self,
        data: impl Into<String>,
        target_origin: &str,
        ports: Vec<MessagePort>,
    ) {
        let live = self.origin();
        if target_origin != WILDCARD_ORIGIN && target_origin != live {
            tracing::warn!(target_origin, live = %live, "postMessage refused: origin mismatch");
            return;
        }
        let _ = self.0.inbox_tx.send(PostedMessage {
            data: data.into(),
            ports,
        });
    }

    /// Take the inbox receiver. The first caller becomes this context's
    /// message loop; later calls get `None`.
    pub fn take_messages(&self) -> Option<mpsc::UnboundedReceiver<PostedMessage>> {
        self.0
            .inbox_rx
            .lock()
            .expect("frame inbox lock poisoned")
            .take()
    }

    fn lock_children(&self) -> std::sync::MutexGuard<'_, Vec<FrameHandle>> {
        self.0.children.lock().expect("frame tree lock poisoned")
    }
}
