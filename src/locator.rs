//! Locates the trusted intermediary context for outbound protocol traffic.

use crate::frame::FrameHandle;
use crate::protocol::LOCATOR_FRAME_NAME;

/// Walk the ancestor chain looking for the nearest context that exposes the
/// well-known locator frame.
///
/// Falls back to the immediate parent when the marker is never found or the
/// walk hits a boundary that denies access: the parent is the most defensible
/// default even though it proves nothing, and the protocol must still attempt
/// delivery. A top-level `win` has no parent and degrades to itself.
pub fn resolve_target(win: &FrameHandle) -> FrameHandle {
    let parent = match win.parent() {
        Some(parent) => parent,
        None => return win.clone(),
    };

    let mut candidate = parent.clone();
    loop {
        match candidate.has_named_child(LOCATOR_FRAME_NAME) {
            Ok(true) => return candidate,
            // Denied access reads the same as "not found": abandon the walk.
            Err(_) => return parent,
            Ok(false) => {
                if candidate.is_top() {
                    return parent;
                }
                match candidate.parent() {
                    Some(next) => candidate = next,
                    None => return parent,
                }
            }
        }
    }
}
