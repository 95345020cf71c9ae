//! Entry point: binds a render function to a browsing context and drives the
//! request -> response -> sandbox sequence for each transaction.

use serde_json::{Map, Value};
use url::Url;

use crate::channel::{reply_channel, ReplyReceiver};
use crate::error::RenderError;
use crate::frame::FrameHandle;
use crate::guard;
use crate::locator;
use crate::protocol::{
    Envelope, EventInfo, RequestOptions, EVENT_AD_RENDER_SUCCEEDED, MESSAGE_EVENT,
};
use crate::sandbox::{self, RenderOutcome, SandboxOptions};

/// Parameters for one render transaction.
#[derive(Debug, Clone)]
pub struct RenderParams {
    /// Correlation key for the whole transaction.
    pub ad_id: String,
    /// Publisher page URL; its origin is the trust boundary for every
    /// outbound message of the transaction.
    pub publisher_url: String,
    /// Click-through URL forwarded in the request options.
    pub click_url: String,
}

/// Sends envelopes for one transaction: every outbound message is tagged with
/// the transaction's `adId`, scoped to the publisher origin, and carries a
/// freshly created reply channel.
#[derive(Debug, Clone)]
pub(crate) struct Messenger {
    target: FrameHandle,
    ad_id: String,
    pub_origin: String,
}

impl Messenger {
    pub(crate) fn new(target: FrameHandle, ad_id: String, pub_origin: String) -> Self {
        Self {
            target,
            ad_id,
            pub_origin,
        }
    }

    pub(crate) fn ad_id(&self) -> &str {
        &self.ad_id
    }

    /// Merge `{message, adId}` with a payload object and post it to the
    /// target. The retained reply endpoint is returned; callers that expect
    /// no reply just drop it.
    pub(crate) fn send(&self, kind: &str, payload: Value) -> ReplyReceiver {
        let mut body = Map::new();
        body.insert("message".to_string(), Value::String(kind.to_string()));
        body.insert("adId".to_string(), Value::String(self.ad_id.clone()));
        match payload {
            Value::Object(extra) => body.extend(extra),
            Value::Null => {}
            other => {
                tracing::warn!(?other, "dropping non-object envelope payload");
            }
        }

        let (reply, port) = reply_channel();
        self.target
            .post_message(Value::Object(body).to_string(), &self.pub_origin, vec![port]);
        reply
    }

    fn send_envelope(&self, envelope: &Envelope) -> Result<ReplyReceiver, RenderError> {
        let wire = envelope.to_wire()?;
        let (reply, port) = reply_channel();
        self.target.post_message(wire, &self.pub_origin, vec![port]);
        Ok(reply)
    }

    pub(crate) fn send_event(&self, event: &str, info: Option<EventInfo>) {
        let mut payload = Map::new();
        payload.insert("event".to_string(), Value::String(event.to_string()));
        if let Some(info) = info {
            if let Ok(info) = serde_json::to_value(info) {
                payload.insert("info".to_string(), info);
            }
        }
        let _ = self.send(MESSAGE_EVENT, Value::Object(payload));
    }
}

/// The render function for one browsing context.
///
/// Bind it once per top-level context, at load time: the trusted target is
/// resolved synchronously, best effort, at that point and reused read-only
/// for every transaction. Distinct `adId`s may be in flight concurrently.
#[derive(Debug)]
pub struct CreativeRenderer {
    win: FrameHandle,
    target: FrameHandle,
    options: SandboxOptions,
}

impl CreativeRenderer {
    pub fn bind(win: FrameHandle) -> Self {
        Self::bind_with_options(win, SandboxOptions::default())
    }

    pub fn bind_with_options(win: FrameHandle, options: SandboxOptions) -> Self {
        let target = locator::resolve_target(&win);
        Self {
            win,
            target,
            options,
        }
    }

    /// The resolved intermediary this renderer delivers to.
    pub fn target(&self) -> &FrameHandle {
        &self.target
    }

    /// Start one render transaction.
    ///
    /// Arms the response listener, sends the request envelope, and returns;
    /// the rest of the transaction runs on a spawned task and terminates only
    /// through a success or failure event (or never, if no response arrives).
    /// Must be called within a tokio runtime.
    pub fn render(&self, params: RenderParams) -> Result<(), RenderError> {
        // Derived once; immutable for the life of the transaction.
        let pub_origin = Url::options()
            .base_url(Some(self.win.location()))
            .parse(&params.publisher_url)?
            .origin()
            .ascii_serialization();

        let messenger = Messenger::new(self.target.clone(), params.ad_id.clone(), pub_origin);
        let request = Envelope::Request {
            ad_id: params.ad_id.clone(),
            options: RequestOptions {
                click_url: params.click_url,
            },
        };
        let mut reply = messenger.send_envelope(&request)?;

        let win = self.win.clone();
        let options = self.options.clone();
        let ad_id = params.ad_id;
        tokio::spawn(async move {
            while let Some(raw) = reply.recv().await {
                let Some(envelope) = Envelope::from_wire(&raw) else {
                    // Transport noise; not for us.
                    continue;
                };
                match envelope {
                    Envelope::Response {
                        ad_id: id,
                        renderer,
                        data,
                    } if id == ad_id => {
                        run_transaction(&win, &messenger, id, renderer, data, options).await;
                        // At most one sandbox per transaction.
                        break;
                    }
                    other => {
                        tracing::trace!(
                            ad_id = other.ad_id(),
                            expected = %ad_id,
                            "ignoring uncorrelated envelope"
                        );
                    }
                }
            }
        });
        Ok(())
    }
}

async fn run_transaction(
    win: &FrameHandle,
    messenger: &Messenger,
    ad_id: String,
    renderer: String,
    data: Map<String, Value>,
    options: SandboxOptions,
) {
    guard::guarded(messenger, async {
        // The creative sees the whole response envelope, renderer included.
        let payload = serde_json::to_value(Envelope::Response {
            ad_id,
            renderer: renderer.clone(),
            data,
        })?;
        let outcome =
            sandbox::render_creative(win, renderer, payload, messenger.clone(), options).await?;
        match outcome {
            RenderOutcome::Completed => {
                messenger.send_event(EVENT_AD_RENDER_SUCCEEDED, None);
            }
            RenderOutcome::Pending => {
                tracing::debug!(
                    ad_id = messenger.ad_id(),
                    "renderer never resolved; transaction stays pending"
                );
            }
        }
        Ok(())
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameAttrs;
    use crate::protocol::LOCATOR_FRAME_NAME;

    #[tokio::test]
    async fn request_is_scoped_to_the_publisher_origin() {
        let top = FrameHandle::top("https://pub.example/page").unwrap();
        top.create_child(FrameAttrs {
            name: Some(LOCATOR_FRAME_NAME.to_string()),
            ..Default::default()
        });
        let win = top.create_child(FrameAttrs::default());
        let mut inbox = top.take_messages().unwrap();

        let renderer = CreativeRenderer::bind(win);
        assert!(renderer.target().same_frame(&top));
        renderer
            .render(RenderParams {
                ad_id: "ad1".to_string(),
                publisher_url: "https://pub.example/page".to_string(),
                click_url: "https://pub.example/click".to_string(),
            })
            .unwrap();

        let posted = inbox.recv().await.unwrap();
        assert_eq!(posted.ports.len(), 1);
        match Envelope::from_wire(&posted.data).unwrap() {
            Envelope::Request { ad_id, options } => {
                assert_eq!(ad_id, "ad1");
                assert_eq!(options.click_url, "https://pub.example/click");
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[tokio::test]
    async fn mismatched_publisher_origin_is_never_delivered() {
        let top = FrameHandle::top("https://pub.example/page").unwrap();
        top.create_child(FrameAttrs {
            name: Some(LOCATOR_FRAME_NAME.to_string()),
            ..Default::default()
        });
        let win = top.create_child(FrameAttrs::default());
        let mut inbox = top.take_messages().unwrap();

        let renderer = CreativeRenderer::bind(win);
        renderer
            .render(RenderParams {
                ad_id: "ad1".to_string(),
                // Resolves to a different origin than the live target.
                publisher_url: "https://elsewhere.example/page".to_string(),
                click_url: "https://elsewhere.example/click".to_string(),
            })
            .unwrap();

        assert!(inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn relative_publisher_url_resolves_against_the_frame_location() {
        let top = FrameHandle::top("https://pub.example/section/page").unwrap();
        let win = top.create_child(FrameAttrs::default());
        let mut inbox = top.take_messages().unwrap();

        let renderer = CreativeRenderer::bind(win);
        renderer
            .render(RenderParams {
                ad_id: "ad-rel".to_string(),
                publisher_url: "/page".to_string(),
                click_url: "https://pub.example/click".to_string(),
            })
            .unwrap();

        // Delivered: "/page" resolves to the pub.example origin.
        assert!(inbox.recv().await.is_some());
    }

    #[test]
    fn invalid_publisher_url_is_an_error() {
        // A frame location that cannot base-resolve relative input.
        let win = FrameHandle::top("data:text/html,x").unwrap();
        let renderer = CreativeRenderer::bind(win);
        // No tokio runtime needed: the error path returns before spawning.
        let result = renderer.render(RenderParams {
            ad_id: "ad1".to_string(),
            publisher_url: "no-base".to_string(),
            click_url: "x".to_string(),
        });
        assert!(matches!(result, Err(RenderError::PublisherUrl(_))));
    }
}
