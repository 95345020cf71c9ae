//! # Creative Sandbox
//!
//! Renders third-party ad creatives without granting them access to the host
//! context: a structured message protocol is relayed to a trusted
//! intermediary, and the creative's own rendering code executes inside a
//! freshly created, isolated runtime.
//!
//! ## Security Guarantees
//!
//! - **Isolated execution**: creative source runs in its own V8 isolate with
//!   no fs, net, env, or module access - only console and the protocol
//!   callback surface
//! - **Origin-scoped delivery**: outbound envelopes are scoped to the
//!   publisher origin derived once per transaction
//! - **No fault escapes**: anything that goes wrong inside the render path
//!   becomes a single `ad-render-failed` event, never an uncaught fault
//! - **Layout-inert frames**: created frames are zero-size, scroll-free and
//!   borderless
//!
//! ## Usage
//!
//! ```rust,ignore
//! use creative_sandbox::{CreativeRenderer, FrameHandle, RenderParams};
//!
//! #[tokio::main]
//! async fn main() {
//!     let win = FrameHandle::top("https://pub.example/page").unwrap();
//!     let renderer = CreativeRenderer::bind(win);
//!     renderer.render(RenderParams {
//!         ad_id: "ad1".into(),
//!         publisher_url: "https://pub.example/page".into(),
//!         click_url: "https://pub.example/click".into(),
//!     }).unwrap();
//! }
//! ```

pub mod auction;
mod channel;
mod error;
mod frame;
mod guard;
mod loader;
mod locator;
mod protocol;
mod render;
mod sanitize;
mod sandbox;

pub use channel::{reply_channel, MessagePort, ReplyReceiver};
pub use error::RenderError;
pub use frame::{FrameAccessError, FrameAttrs, FrameHandle, PostedMessage, WILDCARD_ORIGIN};
pub use loader::InertLoader;
pub use locator::resolve_target;
pub use protocol::{
    Envelope, EventInfo, RequestOptions, ERROR_EXCEPTION, EVENT_AD_RENDER_FAILED,
    EVENT_AD_RENDER_SUCCEEDED, LOCATOR_FRAME_NAME, MESSAGE_EVENT, MESSAGE_REQUEST,
    MESSAGE_RESPONSE,
};
pub use render::{CreativeRenderer, RenderParams};
pub use sandbox::{RenderOutcome, SandboxOptions};
