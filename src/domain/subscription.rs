//! Subscription request: channel plus product set.
//!
//! Built once per successful connection and rendered into whichever
//! wire form the active transport speaks.

use serde::Serialize;

use super::error::FeedError;
use super::fix_message::{FixMessage, msg_type, tags};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    channel: String,
    product_ids: Vec<String>,
}

/// Coinbase-style subscribe envelope.
#[derive(Serialize)]
struct SubscribeMsg<'a> {
    #[serde(rename = "type")]
    msg_type: &'static str,
    channels: [ChannelSpec<'a>; 1],
}

#[derive(Serialize)]
struct ChannelSpec<'a> {
    name: &'a str,
    product_ids: &'a [String],
}

impl SubscriptionRequest {
    /// # Errors
    /// `InvalidSubscription` when the channel or product set is empty.
    pub fn new(channel: impl Into<String>, product_ids: Vec<String>) -> Result<Self, FeedError> {
        let channel = channel.into();
        if channel.trim().is_empty() {
            return Err(FeedError::InvalidSubscription(
                "channel must not be empty".to_string(),
            ));
        }
        if product_ids.is_empty() || product_ids.iter().any(|p| p.trim().is_empty()) {
            return Err(FeedError::InvalidSubscription(
                "at least one non-empty product id is required".to_string(),
            ));
        }
        Ok(Self {
            channel,
            product_ids,
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn product_ids(&self) -> &[String] {
        &self.product_ids
    }

    /// `{"type":"subscribe","channels":[{"name":..,"product_ids":[..]}]}`
    pub fn to_ws_text(&self) -> Result<String, FeedError> {
        let msg = SubscribeMsg {
            msg_type: "subscribe",
            channels: [ChannelSpec {
                name: &self.channel,
                product_ids: &self.product_ids,
            }],
        };
        Ok(serde_json::to_string(&msg)?)
    }

    /// MarketDataRequest (35=V): snapshot plus updates, full depth,
    /// bid/offer/trade entries for every product.
    pub fn to_fix(&self, md_req_id: &str) -> FixMessage {
        let mut msg = FixMessage::new(msg_type::MARKET_DATA_REQUEST);
        msg.set(tags::MD_REQ_ID, md_req_id);
        msg.set(tags::SUBSCRIPTION_REQUEST_TYPE, "1");
        msg.set(tags::MARKET_DEPTH, "0");
        msg.push(tags::NO_MD_ENTRY_TYPES, "3");
        for entry_type in ["0", "1", "2"] {
            msg.push(tags::MD_ENTRY_TYPE, entry_type);
        }
        msg.push(tags::NO_RELATED_SYM, self.product_ids.len().to_string());
        for product in &self.product_ids {
            msg.push(tags::SYMBOL, product.as_str());
        }
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker() -> SubscriptionRequest {
        SubscriptionRequest::new("ticker", vec!["BTC-USD".to_string()]).unwrap()
    }

    #[test]
    fn test_ws_subscribe_shape() {
        let text = ticker().to_ws_text().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "subscribe",
                "channels": [{"name": "ticker", "product_ids": ["BTC-USD"]}]
            })
        );
    }

    #[test]
    fn test_fix_market_data_request() {
        let msg = ticker().to_fix("ticker-1");
        assert_eq!(msg.msg_type(), "V");
        assert_eq!(msg.get(tags::MD_REQ_ID), Some("ticker-1"));
        assert_eq!(msg.get(tags::NO_RELATED_SYM), Some("1"));
        assert_eq!(msg.get(tags::SYMBOL), Some("BTC-USD"));
        let entry_types: Vec<&str> = msg
            .fields()
            .filter(|(t, _)| *t == tags::MD_ENTRY_TYPE)
            .map(|(_, v)| v)
            .collect();
        assert_eq!(entry_types, vec!["0", "1", "2"]);
    }

    #[test]
    fn test_rejects_empty_products() {
        assert!(SubscriptionRequest::new("ticker", vec![]).is_err());
        assert!(SubscriptionRequest::new("", vec!["BTC-USD".into()]).is_err());
    }
}
