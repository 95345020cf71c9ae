//! Sandbox renderer - executes injected creative source in an isolated V8
//! runtime.
//!
//! The creative gets only what the protocol hands it:
//! - console.log/warn/error (captured, surfaced on the diagnostic channel)
//! - a callback bundle passed to the render entry point: sendMessage (relays
//!   event envelopes back through the transaction) and mkFrame (creates a
//!   hidden, zero-size child frame under the host)
//! - the render data and a by-value host descriptor
//! - No fs, net, env, module imports, or other system access
//!
//! Each sandbox runs on its own thread with its own current-thread event
//! loop, mirroring how a nested browsing context runs independently of its
//! parent. The injected source never evaluates in the caller's context.

use std::rc::Rc;

use anyhow::Error;
use deno_core::{op2, v8, JsRuntime, OpState, PollEventLoopOptions, RuntimeOptions};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::RenderError;
use crate::frame::{FrameAttrs, FrameHandle};
use crate::loader::InertLoader;
use crate::render::Messenger;
use crate::sanitize::sanitize_render_data;

/// Configuration for one creative sandbox.
///
/// There is deliberately no timeout: the protocol never bounds the
/// request/response or render stages, and a renderer that never resolves
/// leaves its transaction pending forever.
#[derive(Debug, Clone)]
pub struct SandboxOptions {
    /// Maximum heap size in bytes (default: 64MB, None = unlimited)
    pub max_heap_size: Option<usize>,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        Self {
            max_heap_size: Some(64 * 1024 * 1024),
        }
    }
}

/// How the injected render entry point finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The entry point's promise fulfilled.
    Completed,
    /// The promise was still pending after the sandbox event loop drained;
    /// the transaction stays open and no event is sent.
    Pending,
}

/// Captured console output from the sandboxed creative.
#[derive(Debug, Default, Clone)]
struct CreativeConsole {
    lines: Vec<(String, String)>,
}

/// Outbound message produced by the creative's `sendMessage` callback.
#[derive(Debug)]
pub(crate) struct BridgeMessage {
    pub kind: String,
    pub payload: Value,
}

struct SandboxBridge {
    tx: mpsc::UnboundedSender<BridgeMessage>,
}

/// The frame the sandbox hangs off; `mkFrame` children attach here.
struct HostFrame(FrameHandle);

#[op2(fast)]
fn op_console(state: &mut OpState, #[string] level: &str, #[string] msg: &str) {
    if let Some(console) = state.try_borrow_mut::<CreativeConsole>() {
        console.lines.push((level.to_string(), msg.to_string()));
    }
}

#[op2(fast)]
fn op_render_message(state: &mut OpState, #[string] kind: &str, #[string] payload: &str) {
    let payload = serde_json::from_str(payload).unwrap_or(Value::Null);
    if let Some(bridge) = state.try_borrow::<SandboxBridge>() {
        let _ = bridge.tx.send(BridgeMessage {
            kind: kind.to_string(),
            payload,
        });
    }
}

#[op2]
#[string]
fn op_make_frame(state: &mut OpState, #[string] name: &str) -> Result<String, Error> {
    let host = state
        .try_borrow::<HostFrame>()
        .ok_or_else(|| anyhow::anyhow!("sandbox host frame not installed"))?;
    let name = if name.is_empty() {
        format!("creative-frame-{}", host.0.child_count())
    } else {
        name.to_string()
    };
    host.0.create_child(FrameAttrs {
        name: Some(name.clone()),
        ..Default::default()
    });
    Ok(name)
}

deno_core::extension!(
    creative_runtime,
    ops = [op_console, op_render_message, op_make_frame],
);

/// Create an empty creative sandbox. The bridge and host-frame state are
/// installed by [`render_creative`] before anything executes.
fn create_sandbox(options: &SandboxOptions) -> Result<JsRuntime, Error> {
    let create_params = options
        .max_heap_size
        .map(|max_bytes| v8::Isolate::create_params().heap_limits(0, max_bytes));

    let mut runtime = JsRuntime::new(RuntimeOptions {
        module_loader: Some(Rc::new(InertLoader)),
        extensions: vec![creative_runtime::init_ops_and_esm()],
        create_params,
        ..Default::default()
    });

    if options.max_heap_size.is_some() {
        runtime.add_near_heap_limit_callback(|current, initial| {
            // Don't raise the limit - let V8 terminate the creative instead.
            tracing::warn!(
                current_mb = current / (1024 * 1024),
                initial_mb = initial / (1024 * 1024),
                "creative sandbox near heap limit"
            );
            current
        });
    }

    runtime
        .op_state()
        .borrow_mut()
        .put(CreativeConsole::default());

    Ok(runtime)
}

/// Execute a creative for one transaction.
///
/// Creates the single hidden sandbox frame under `win`, runs the injected
/// source in a fresh isolate on a dedicated thread, and forwards everything
/// the creative sends through `messenger` as it happens. The caller owns
/// turning the outcome into protocol events.
pub(crate) async fn render_creative(
    win: &FrameHandle,
    renderer: String,
    data: Value,
    messenger: Messenger,
    options: SandboxOptions,
) -> Result<RenderOutcome, RenderError> {
    let sandbox_frame = win.create_child(FrameAttrs::default());
    let host = serde_json::json!({
        "origin": win.origin(),
        "href": win.location().as_str(),
    });
    let data = sanitize_render_data(data);

    let (bridge_tx, mut bridge_rx) = mpsc::unbounded_channel::<BridgeMessage>();
    let forward_messenger = messenger.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(msg) = bridge_rx.recv().await {
            let _ = forward_messenger.send(&msg.kind, msg.payload);
        }
    });

    // V8 isolates are !Send; the sandbox gets a thread and event loop of its
    // own, like any other nested browsing context.
    let outcome = tokio::task::spawn_blocking(move || {
        let local = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| RenderError::Sandbox(format!("sandbox event loop: {e}")))?;
        local.block_on(run_isolate(renderer, data, host, sandbox_frame, bridge_tx, options))
    })
    .await
    .map_err(|e| RenderError::Sandbox(format!("sandbox thread: {e}")))?;

    // Drained once the isolate drops its sender; keeps creative-sent events
    // ahead of the completion event.
    let _ = forwarder.await;

    outcome
}

async fn run_isolate(
    renderer: String,
    data: Value,
    host: Value,
    sandbox_frame: FrameHandle,
    bridge_tx: mpsc::UnboundedSender<BridgeMessage>,
    options: SandboxOptions,
) -> Result<RenderOutcome, RenderError> {
    let mut runtime =
        create_sandbox(&options).map_err(|e| RenderError::Sandbox(e.to_string()))?;
    {
        let state = runtime.op_state();
        let mut state = state.borrow_mut();
        state.put(SandboxBridge { tx: bridge_tx });
        state.put(HostFrame(sandbox_frame));
    }

    // The callback surface must exist before the injected source runs.
    runtime
        .execute_script("creative:bootstrap", include_str!("bootstrap.js"))
        .map_err(|e| RenderError::Sandbox(format!("bootstrap: {e}")))?;

    // The injected source only ever evaluates here, never in the caller's
    // context. It is expected to define `globalThis.render`.
    runtime
        .execute_script("creative:srcdoc", renderer)
        .map_err(creative_fault)?;

    // Resolve with the sandbox's own Promise primitive; adopting a value
    // with another context's constructor is unreliable across engines. The
    // no-op catch marks a rejection handled so the event loop drains
    // normally and the state inspection below sees it; without it the
    // unhandled rejection aborts `run_event_loop` first.
    let call = format!(
        "(() => {{
            const callbacks = globalThis[Symbol.for('creative.callbacks')];
            const p = globalThis.Promise.resolve(globalThis.render({data}, callbacks, {host}));
            p.catch(() => {{}});
            return p;
        }})()"
    );
    let promise = runtime
        .execute_script("creative:render", call)
        .map_err(creative_fault)?;

    runtime
        .run_event_loop(PollEventLoopOptions::default())
        .await
        .map_err(creative_fault)?;

    let outcome = {
        let scope = &mut runtime.handle_scope();
        let local = v8::Local::new(scope, &promise);
        match v8::Local::<v8::Promise>::try_from(local) {
            Ok(promise) => match promise.state() {
                v8::PromiseState::Fulfilled => Ok(RenderOutcome::Completed),
                v8::PromiseState::Pending => Ok(RenderOutcome::Pending),
                v8::PromiseState::Rejected => {
                    let exception = promise.result(scope);
                    Err(rejection_fault(scope, exception))
                }
            },
            Err(_) => Err(RenderError::Sandbox(
                "render wrapper did not yield a promise".to_string(),
            )),
        }
    };

    let console = runtime
        .op_state()
        .borrow()
        .borrow::<CreativeConsole>()
        .clone();
    for (level, message) in &console.lines {
        tracing::debug!(target: "creative_sandbox::console", %level, "{message}");
    }

    outcome
}

/// A fault raised while evaluating or driving creative code.
fn creative_fault(err: Error) -> RenderError {
    let stack = err
        .downcast_ref::<deno_core::error::JsError>()
        .and_then(|js| js.stack.clone());
    RenderError::Creative {
        reason: None,
        message: err.to_string(),
        stack,
    }
}

/// Read `reason` / `message` / `stack` off a rejection value, falling back to
/// its string form when it is not an object.
fn rejection_fault(scope: &mut v8::HandleScope, value: v8::Local<v8::Value>) -> RenderError {
    let fallback = value.to_rust_string_lossy(scope);
    match v8::Local::<v8::Object>::try_from(value) {
        Ok(obj) => {
            let reason = get_string_prop(scope, obj, "reason");
            let message = get_string_prop(scope, obj, "message").unwrap_or(fallback);
            let stack = get_string_prop(scope, obj, "stack");
            RenderError::Creative {
                reason,
                message,
                stack,
            }
        }
        Err(_) => RenderError::Creative {
            reason: None,
            message: fallback,
            stack: None,
        },
    }
}

fn get_string_prop(
    scope: &mut v8::HandleScope,
    obj: v8::Local<v8::Object>,
    key: &str,
) -> Option<String> {
    let key = v8::String::new(scope, key)?;
    let value = obj.get(scope, key.into())?;
    if value.is_undefined() || value.is_null() {
        return None;
    }
    Some(value.to_rust_string_lossy(scope))
}
