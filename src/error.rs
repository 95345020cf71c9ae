//! Error taxonomy for the render protocol.
//!
//! Faults are classified by where they crossed the protocol boundary, not by
//! their underlying cause: anything that happens inside the injected renderer
//! is a `Creative` fault and carries whatever reason code the creative
//! attached, everything else is infrastructure.

use thiserror::Error;

use crate::protocol::ERROR_EXCEPTION;

#[derive(Debug, Error)]
pub enum RenderError {
    /// The publisher URL could not be resolved against the frame location.
    #[error("invalid publisher url: {0}")]
    PublisherUrl(#[from] url::ParseError),

    /// A fault raised inside the creative sandbox: the injected source failed
    /// to evaluate, the render entry point threw, or its promise rejected.
    #[error("{message}")]
    Creative {
        /// Reason code attached by the creative, if any.
        reason: Option<String>,
        message: String,
        /// JS stack, when the fault carried one.
        stack: Option<String>,
    },

    /// The sandbox context itself could not be constructed or driven.
    #[error("sandbox failed: {0}")]
    Sandbox(String),

    /// An envelope could not be serialized for transport.
    #[error(transparent)]
    Wire(#[from] serde_json::Error),
}

impl RenderError {
    /// Protocol reason code for a failure event. Faults that carry no
    /// explicit reason report the generic exception code.
    pub fn reason(&self) -> &str {
        match self {
            RenderError::Creative {
                reason: Some(reason),
                ..
            } => reason,
            _ => ERROR_EXCEPTION,
        }
    }

    /// JS stack detail, when present. Drives diagnostic logging only.
    pub fn stack(&self) -> Option<&str> {
        match self {
            RenderError::Creative { stack, .. } => stack.as_deref(),
            _ => None,
        }
    }
}
