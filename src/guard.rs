//! Converts faults into protocol failure events.
//!
//! Nothing that goes wrong inside a message handler or the rendering path may
//! propagate past the protocol boundary: every fault becomes exactly one
//! `ad-render-failed` event on the target, and nothing more.

use std::future::Future;

use crate::error::RenderError;
use crate::protocol::{EventInfo, EVENT_AD_RENDER_FAILED};
use crate::render::Messenger;

/// Run a fallible step of the transaction; any error is absorbed and reported
/// as a single failure event. Returns whether the step succeeded.
pub(crate) async fn guarded<F>(messenger: &Messenger, step: F) -> bool
where
    F: Future<Output = Result<(), RenderError>>,
{
    match step.await {
        Ok(()) => true,
        Err(err) => {
            report_failure(messenger, &err);
            false
        }
    }
}

/// Send the failure event for one fault. Stack-bearing faults are also
/// surfaced on the diagnostic channel; that is a side effect only.
pub(crate) fn report_failure(messenger: &Messenger, err: &RenderError) {
    messenger.send_event(
        EVENT_AD_RENDER_FAILED,
        Some(EventInfo {
            reason: err.reason().to_string(),
            message: Some(err.to_string()),
        }),
    );
    if let Some(stack) = err.stack() {
        tracing::error!(ad_id = messenger.ad_id(), stack, "creative render fault");
    }
}
