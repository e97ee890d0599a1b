//! Platform-neutral chat types shared by the adapters and the dispatcher.

use std::fmt;

use serde::Serialize;

use crate::error::RouterError;

/// One-time handle for replying to an inbound event.
///
/// Not `Clone`: sending a reply consumes the token, so each handle is used at most once.
#[derive(PartialEq, Eq)]
pub struct ReplyToken(String);

impl ReplyToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for ReplyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tokens are bearer credentials for a single reply; keep them out of logs.
        f.write_str("ReplyToken(***)")
    }
}

#[derive(Debug, PartialEq)]
pub enum InboundEvent {
    /// `reply_token` is absent when the platform does not allow a reply (e.g. standby mode).
    Message {
        reply_token: Option<ReplyToken>,
        message: InboundMessage,
    },
    Other {
        event_type: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Text {
        text: String,
    },
    Sticker {
        package_id: String,
        sticker_id: String,
    },
    Other {
        message_type: String,
    },
}

/// Parses a raw webhook body into events, preserving delivery order.
pub trait InboundAdapter {
    fn parse(&self, raw_payload: &[u8]) -> Result<Vec<InboundEvent>, RouterError>;
}

/// Outbound message in the messaging platform's JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    Text {
        text: String,
    },
    Template {
        #[serde(rename = "altText")]
        alt_text: String,
        template: Template,
    },
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        OutboundMessage::Text { text: text.into() }
    }

    pub fn carousel(alt_text: impl Into<String>, columns: Vec<CarouselColumn>) -> Self {
        OutboundMessage::Template {
            alt_text: alt_text.into(),
            template: Template::Carousel { columns },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Template {
    Carousel { columns: Vec<CarouselColumn> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarouselColumn {
    pub thumbnail_image_url: String,
    pub title: String,
    pub text: String,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Uri { label: String, uri: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_message_serializes_with_type_tag() {
        let value = serde_json::to_value(OutboundMessage::text("hello")).unwrap();
        assert_eq!(value, json!({"type": "text", "text": "hello"}));
    }

    #[test]
    fn carousel_serializes_nested_template() {
        let message = OutboundMessage::carousel(
            "Weather forecast",
            vec![CarouselColumn {
                thumbnail_image_url: "https://example.com/a.png".to_string(),
                title: "2024/01/01 09:00".to_string(),
                text: "clear sky".to_string(),
                actions: vec![Action::Uri {
                    label: "View detail".to_string(),
                    uri: "https://example.com/".to_string(),
                }],
            }],
        );
        let value = serde_json::to_value(message).unwrap();
        assert_eq!(value["type"], "template");
        assert_eq!(value["altText"], "Weather forecast");
        assert_eq!(value["template"]["type"], "carousel");
        let column = &value["template"]["columns"][0];
        assert_eq!(column["thumbnailImageUrl"], "https://example.com/a.png");
        assert_eq!(column["actions"][0]["type"], "uri");
        assert_eq!(column["actions"][0]["label"], "View detail");
    }

    #[test]
    fn reply_token_debug_is_redacted() {
        let token = ReplyToken::new("secret-token");
        assert_eq!(format!("{:?}", token), "ReplyToken(***)");
        assert_eq!(token.into_inner(), "secret-token");
    }
}
