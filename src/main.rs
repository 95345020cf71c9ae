//! Creative Sandbox demo CLI
//!
//! Runs one render transaction against a simulated publisher page:
//!
//!   creative-sandbox <renderer.js> [render-data-json]
//!
//! The renderer file must define `globalThis.render`; it executes inside the
//! creative sandbox, never in the host process's own context. The demo plays
//! the trusted intermediary itself: it answers the request envelope with the
//! renderer source and prints every event envelope it receives.

use anyhow::{anyhow, Result};
use creative_sandbox::{
    CreativeRenderer, Envelope, FrameAttrs, FrameHandle, RenderParams, EVENT_AD_RENDER_FAILED,
    EVENT_AD_RENDER_SUCCEEDED, LOCATOR_FRAME_NAME,
};
use serde_json::{Map, Value};

const PAGE_URL: &str = "https://pub.example/page";
const CLICK_URL: &str = "https://pub.example/click";

fn print_usage() {
    eprintln!("Creative Sandbox - sandboxed ad creative renderer");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  creative-sandbox <renderer.js> [render-data-json]");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  creative-sandbox ./demo/banner.js '{{\"ad\":\"<div>hi</div>\"}}'");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return Err(anyhow!("Missing required arguments"));
    }

    let source = std::fs::read_to_string(&args[1])
        .map_err(|e| anyhow!("Failed to read renderer '{}': {}", args[1], e))?;
    let render_data: Map<String, Value> = match args.get(2) {
        Some(json) => {
            match serde_json::from_str(json).map_err(|e| anyhow!("Invalid render data JSON: {}", e))?
            {
                Value::Object(map) => map,
                _ => return Err(anyhow!("Render data must be a JSON object")),
            }
        }
        None => Map::new(),
    };

    // Simulated hierarchy: publisher page exposing the locator marker, with
    // the creative's context nested inside it.
    let page = FrameHandle::top(PAGE_URL)?;
    page.create_child(FrameAttrs {
        name: Some(LOCATOR_FRAME_NAME.to_string()),
        ..Default::default()
    });
    let win = page.create_child(FrameAttrs::default());
    let mut inbox = page
        .take_messages()
        .ok_or_else(|| anyhow!("page inbox already taken"))?;

    let renderer = CreativeRenderer::bind(win);
    renderer.render(RenderParams {
        ad_id: "demo-ad".to_string(),
        publisher_url: PAGE_URL.to_string(),
        click_url: CLICK_URL.to_string(),
    })?;

    // Intermediary loop: answer the request, then report events until the
    // transaction terminates.
    while let Some(posted) = inbox.recv().await {
        let Some(envelope) = Envelope::from_wire(&posted.data) else {
            continue;
        };
        match envelope {
            Envelope::Request { ad_id, options } => {
                println!("request  adId={ad_id} clickUrl={}", options.click_url);
                let response = Envelope::Response {
                    ad_id,
                    renderer: source.clone(),
                    data: render_data.clone(),
                };
                match posted.ports.first() {
                    Some(port) => port.post(response.to_wire()?),
                    None => eprintln!("request carried no reply port"),
                }
            }
            Envelope::Event { ad_id, event, info } => {
                match info {
                    Some(info) => println!(
                        "event    adId={ad_id} {event} reason={} message={}",
                        info.reason,
                        info.message.as_deref().unwrap_or("-"),
                    ),
                    None => println!("event    adId={ad_id} {event}"),
                }
                if event == EVENT_AD_RENDER_SUCCEEDED || event == EVENT_AD_RENDER_FAILED {
                    break;
                }
            }
            Envelope::Response { ad_id, .. } => {
                eprintln!("unexpected response envelope for adId={ad_id}");
            }
        }
    }

    Ok(())
}
