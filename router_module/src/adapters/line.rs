//! LINE Messaging API adapter.
//!
//! - `LineInboundAdapter`: parses webhook payloads into `InboundEvent`s
//! - `verify_line_signature`: checks the `X-Line-Signature` header
//! - `LineMessagingClient`: reply and push calls

use std::fmt;

use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::channel::{InboundAdapter, InboundEvent, InboundMessage, OutboundMessage, ReplyToken};
use crate::error::{read_success_body, ExternalService, RouterError};

pub const LINE_SIGNATURE_HEADER: &str = "x-line-signature";

/// LINE accepts at most five messages per reply or push request.
pub const MAX_MESSAGES_PER_REQUEST: usize = 5;

/// Checks a base64 HMAC-SHA256 signature of the raw body keyed by the channel secret.
pub fn verify_line_signature(
    channel_secret: &str,
    signature: Option<&str>,
    body: &[u8],
) -> Result<(), RouterError> {
    let signature = signature
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(RouterError::SignatureInvalid("missing_signature"))?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(signature)
        .map_err(|_| RouterError::SignatureInvalid("malformed_signature"))?;

    let mut mac = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes())
        .map_err(|_| RouterError::SignatureInvalid("bad_secret"))?;
    mac.update(body);
    mac.verify_slice(&decoded)
        .map_err(|_| RouterError::SignatureInvalid("invalid_signature"))
}

/// Computes the signature LINE would send for `body`.
pub fn sign_line_body(channel_secret: &str, body: &[u8]) -> Result<String, RouterError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes())
        .map_err(|_| RouterError::SignatureInvalid("bad_secret"))?;
    mac.update(body);
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Adapter for parsing LINE webhook payloads.
#[derive(Debug, Clone, Default)]
pub struct LineInboundAdapter;

impl LineInboundAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl InboundAdapter for LineInboundAdapter {
    fn parse(&self, raw_payload: &[u8]) -> Result<Vec<InboundEvent>, RouterError> {
        let webhook: LineWebhook = serde_json::from_slice(raw_payload)
            .map_err(|err| RouterError::MalformedRequest(err.to_string()))?;
        Ok(webhook
            .events
            .into_iter()
            .map(LineEvent::into_inbound)
            .collect())
    }
}

impl LineEvent {
    /// Incomplete events are kept as `Other` so the rest of the batch still runs.
    fn into_inbound(self) -> InboundEvent {
        if self.event_type != "message" {
            return InboundEvent::Other {
                event_type: self.event_type,
            };
        }
        let Some(message) = self.message else {
            warn!("skipping message event without message body");
            return InboundEvent::Other {
                event_type: self.event_type,
            };
        };
        let reply_token = self
            .reply_token
            .filter(|token| !token.is_empty())
            .map(ReplyToken::new);
        if reply_token.is_none() {
            debug!("message event without replyToken, replies disabled");
        }
        InboundEvent::Message {
            reply_token,
            message: message.into_inbound(),
        }
    }
}

impl LineMessage {
    fn into_inbound(self) -> InboundMessage {
        match self.message_type.as_str() {
            "text" => match self.text {
                Some(text) => InboundMessage::Text { text },
                None => skipped(self.message_type, "text message without text"),
            },
            "sticker" => match (self.package_id, self.sticker_id) {
                (Some(package_id), Some(sticker_id)) => InboundMessage::Sticker {
                    package_id,
                    sticker_id,
                },
                _ => skipped(self.message_type, "sticker message without packageId/stickerId"),
            },
            _ => InboundMessage::Other {
                message_type: self.message_type,
            },
        }
    }
}

fn skipped(message_type: String, reason: &str) -> InboundMessage {
    warn!("skipping malformed message: {}", reason);
    InboundMessage::Other { message_type }
}

/// Sends replies and pushes through the LINE Messaging API.
#[derive(Clone)]
pub struct LineMessagingClient {
    client: Client,
    api_base_url: String,
    channel_access_token: String,
}

impl fmt::Debug for LineMessagingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineMessagingClient")
            .field("api_base_url", &self.api_base_url)
            .field("channel_access_token", &"***")
            .finish()
    }
}

impl LineMessagingClient {
    pub fn new(client: Client, api_base_url: &str, channel_access_token: &str) -> Self {
        Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            channel_access_token: channel_access_token.to_string(),
        }
    }

    /// Replies to an inbound event. The token is consumed whether or not delivery succeeds.
    pub async fn reply(
        &self,
        reply_token: ReplyToken,
        messages: Vec<OutboundMessage>,
    ) -> Result<(), RouterError> {
        check_batch(&messages)?;
        let request = LineReplyRequest {
            reply_token: reply_token.into_inner(),
            messages,
        };
        self.post("/v2/bot/message/reply", &request).await
    }

    pub async fn push(&self, to: &str, messages: Vec<OutboundMessage>) -> Result<(), RouterError> {
        if to.trim().is_empty() {
            return Err(RouterError::NotConfigured("line.pushTo"));
        }
        check_batch(&messages)?;
        let request = LinePushRequest {
            to: to.to_string(),
            messages,
        };
        self.post("/v2/bot/message/push", &request).await
    }

    async fn post<T: Serialize>(&self, path: &str, request: &T) -> Result<(), RouterError> {
        let url = format!("{}{}", self.api_base_url, path);
        debug!("calling LINE {}", url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.channel_access_token)
            .json(request)
            .send()
            .await
            .map_err(|err| RouterError::Delivery(err.to_string()))?;

        read_success_body(ExternalService::Line, response)
            .await
            .map(|_| ())
            .map_err(|err| RouterError::Delivery(err.to_string()))
    }
}

fn check_batch(messages: &[OutboundMessage]) -> Result<(), RouterError> {
    if messages.is_empty() || messages.len() > MAX_MESSAGES_PER_REQUEST {
        return Err(RouterError::Delivery(format!(
            "expected 1..={} messages, got {}",
            MAX_MESSAGES_PER_REQUEST,
            messages.len()
        )));
    }
    Ok(())
}

// ============================================================================
// LINE-specific types
// ============================================================================

/// Webhook body delivered by LINE.
#[derive(Debug, Clone, Deserialize)]
pub struct LineWebhook {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<LineEvent>,
}

/// One webhook event. Only the fields the router consumes are modelled.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub reply_token: Option<String>,
    pub message: Option<LineMessage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: Option<String>,
    pub package_id: Option<String>,
    pub sticker_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LineReplyRequest {
    reply_token: String,
    messages: Vec<OutboundMessage>,
}

#[derive(Debug, Serialize)]
struct LinePushRequest {
    to: String,
    messages: Vec<OutboundMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_text_and_sticker_events_in_order() {
        let payload = r#"{
            "destination": "Uabc",
            "events": [
                {
                    "type": "message",
                    "replyToken": "token-1",
                    "timestamp": 1462629479859,
                    "source": {"type": "user", "userId": "U1"},
                    "message": {"id": "1", "type": "text", "text": "encode card CardX"}
                },
                {
                    "type": "message",
                    "replyToken": "token-2",
                    "source": {"type": "group", "groupId": "G1"},
                    "message": {"id": "2", "type": "sticker", "packageId": "2000002", "stickerId": "48473"}
                }
            ]
        }"#;

        let events = LineInboundAdapter::new().parse(payload.as_bytes()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            InboundEvent::Message {
                reply_token: Some(ReplyToken::new("token-1")),
                message: InboundMessage::Text {
                    text: "encode card CardX".to_string()
                },
            }
        );
        assert_eq!(
            events[1],
            InboundEvent::Message {
                reply_token: Some(ReplyToken::new("token-2")),
                message: InboundMessage::Sticker {
                    package_id: "2000002".to_string(),
                    sticker_id: "48473".to_string()
                },
            }
        );
    }

    #[test]
    fn parse_non_message_and_unknown_message_types() {
        let payload = r#"{
            "events": [
                {"type": "follow", "replyToken": "token-f", "source": {"type": "user", "userId": "U1"}},
                {"type": "message", "replyToken": "token-i", "message": {"id": "3", "type": "image"}}
            ]
        }"#;

        let events = LineInboundAdapter::new().parse(payload.as_bytes()).unwrap();
        assert_eq!(
            events[0],
            InboundEvent::Other {
                event_type: "follow".to_string()
            }
        );
        assert_eq!(
            events[1],
            InboundEvent::Message {
                reply_token: Some(ReplyToken::new("token-i")),
                message: InboundMessage::Other {
                    message_type: "image".to_string()
                },
            }
        );
    }

    #[test]
    fn empty_event_list_is_valid() {
        let events = LineInboundAdapter::new()
            .parse(br#"{"destination": "Uabc", "events": []}"#)
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let result = LineInboundAdapter::new().parse(b"not json");
        assert!(matches!(result, Err(RouterError::MalformedRequest(_))));

    }

    #[test]
    fn incomplete_events_do_not_fail_the_batch() {
        let payload = r#"{
            "events": [
                {
                    "type": "message",
                    "replyToken": "t1",
                    "message": {"id": "1", "type": "sticker", "packageId": "2000002", "stickerId": "48473"}
                },
                {
                    "type": "message",
                    "mode": "standby",
                    "source": {"type": "group", "groupId": "G1"},
                    "message": {"id": "2", "type": "text", "text": "weather please"}
                },
                {"type": "message", "replyToken": "t3", "message": {"id": "3", "type": "sticker"}},
                {"type": "message", "replyToken": "t4", "message": {"id": "4", "type": "text"}},
                {"type": "message", "replyToken": "t5"}
            ]
        }"#;

        let events = LineInboundAdapter::new().parse(payload.as_bytes()).unwrap();
        assert_eq!(events.len(), 5);
        assert_eq!(
            events[0],
            InboundEvent::Message {
                reply_token: Some(ReplyToken::new("t1")),
                message: InboundMessage::Sticker {
                    package_id: "2000002".to_string(),
                    sticker_id: "48473".to_string()
                },
            }
        );
        assert_eq!(
            events[1],
            InboundEvent::Message {
                reply_token: None,
                message: InboundMessage::Text {
                    text: "weather please".to_string()
                },
            }
        );
        assert_eq!(
            events[2],
            InboundEvent::Message {
                reply_token: Some(ReplyToken::new("t3")),
                message: InboundMessage::Other {
                    message_type: "sticker".to_string()
                },
            }
        );
        assert_eq!(
            events[3],
            InboundEvent::Message {
                reply_token: Some(ReplyToken::new("t4")),
                message: InboundMessage::Other {
                    message_type: "text".to_string()
                },
            }
        );
        assert_eq!(
            events[4],
            InboundEvent::Other {
                event_type: "message".to_string()
            }
        );
    }

    #[test]
    fn signature_round_trip() {
        let body = br#"{"events":[]}"#;
        let signature = sign_line_body("channel-secret", body).unwrap();
        assert!(verify_line_signature("channel-secret", Some(&signature), body).is_ok());
    }

    #[test]
    fn signature_mismatch_and_missing_are_rejected() {
        let body = br#"{"events":[]}"#;
        let signature = sign_line_body("other-secret", body).unwrap();
        assert!(matches!(
            verify_line_signature("channel-secret", Some(&signature), body),
            Err(RouterError::SignatureInvalid("invalid_signature"))
        ));
        assert!(matches!(
            verify_line_signature("channel-secret", None, body),
            Err(RouterError::SignatureInvalid("missing_signature"))
        ));
        assert!(matches!(
            verify_line_signature("channel-secret", Some("%%%"), body),
            Err(RouterError::SignatureInvalid("malformed_signature"))
        ));
    }

    #[test]
    fn client_debug_hides_access_token() {
        let client = LineMessagingClient::new(Client::new(), "https://api.line.me/", "very-secret");
        let rendered = format!("{:?}", client);
        assert!(rendered.contains("https://api.line.me"));
        assert!(!rendered.contains("very-secret"));
    }

    #[test]
    fn reply_request_uses_camel_case_token() {
        let request = LineReplyRequest {
            reply_token: "abc".to_string(),
            messages: vec![OutboundMessage::text("hi")],
        };
        let value = serde_json::to_value(request).unwrap();
        assert_eq!(value["replyToken"], "abc");
        assert_eq!(value["messages"][0]["text"], "hi");
    }
}
