//! Boundary types for the auction collaborator.
//!
//! The render core treats everything an adapter produces as opaque payload;
//! these shapes exist so host integrations and adapters agree on the seam.
//! Adapter business rules (endpoint formats, floor/consent enrichment,
//! currency configuration) live outside this crate.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One ad slot's bid request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRequest {
    pub bid_id: String,
    pub ad_unit_code: String,
    pub placement_id: String,
    pub sizes: Vec<AdSize>,
}

/// Context shared by every slot in one auction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionContext {
    pub auction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
}

/// The HTTP call an adapter wants made. Transport is the host's problem.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdSize {
    pub width: u32,
    pub height: u32,
}

/// What a winning bid renders with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaPayload {
    Banner {
        markup: String,
    },
    #[serde(rename_all = "camelCase")]
    Video {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vast_xml: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vast_url: Option<String>,
    },
}

/// A normalized bid result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub bid_id: String,
    pub price: f64,
    pub currency: String,
    pub size: AdSize,
    pub ttl_secs: u64,
    pub media: MediaPayload,
}

/// The auction-side collaborator: turns slot requests into one HTTP call and
/// a parsed server reply into normalized bids.
pub trait BidAdapter {
    fn build_request(&self, slots: &[SlotRequest], ctx: &AuctionContext) -> Result<HttpRequest>;
    fn interpret_response(&self, body: &Value) -> Result<Vec<Bid>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A minimal adapter standing in for a real one; exercises the seam.
    struct EchoAdapter;

    impl BidAdapter for EchoAdapter {
        fn build_request(&self, slots: &[SlotRequest], ctx: &AuctionContext) -> Result<HttpRequest> {
            Ok(HttpRequest {
                method: "POST".to_string(),
                url: "https://bid.example/auction".to_string(),
                body: serde_json::to_string(&json!({
                    "auctionId": ctx.auction_id,
                    "slots": slots,
                }))?,
            })
        }

        fn interpret_response(&self, body: &Value) -> Result<Vec<Bid>> {
            Ok(serde_json::from_value(body["bids"].clone())?)
        }
    }

    #[test]
    fn request_and_response_shapes_round_trip() {
        let adapter = EchoAdapter;
        let slots = vec![SlotRequest {
            bid_id: "b1".to_string(),
            ad_unit_code: "div-1".to_string(),
            placement_id: "42".to_string(),
            sizes: vec![AdSize {
                width: 300,
                height: 250,
            }],
        }];
        let ctx = AuctionContext {
            auction_id: "a1".to_string(),
            page_url: Some("https://pub.example/page".to_string()),
        };

        let request = adapter.build_request(&slots, &ctx).unwrap();
        assert_eq!(request.method, "POST");
        let body: Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(body["slots"][0]["placementId"], "42");

        let reply = json!({
            "bids": [{
                "bidId": "b1",
                "price": 1.25,
                "currency": "USD",
                "size": { "width": 300, "height": 250 },
                "ttlSecs": 300,
                "media": { "banner": { "markup": "<div></div>" } },
            }],
        });
        let bids = adapter.interpret_response(&reply).unwrap();
        assert_eq!(bids.len(), 1);
        assert_eq!(bids[0].price, 1.25);
        assert!(matches!(bids[0].media, MediaPayload::Banner { .. }));
    }
}
