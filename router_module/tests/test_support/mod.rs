#![allow(dead_code)]

use router_module::adapters::line::sign_line_body;
use router_module::channel::{InboundEvent, InboundMessage, ReplyToken};
use router_module::service::{build_router, build_state};
use router_module::{parse_router_config, RouterConfig};
use serde_json::{json, Value};

pub const CHANNEL_SECRET: &str = "test-channel-secret";
pub const ACCESS_TOKEN: &str = "test-access-token";
pub const PUSH_TO: &str = "G123";
pub const PUSH_TOKEN: &str = "push-secret";

/// Config JSON with every external service pointed at `base_url`.
pub fn config_json(base_url: &str) -> Value {
    json!({
        "port": "9090",
        "line": {
            "channelSecret": CHANNEL_SECRET,
            "channelAccessToken": ACCESS_TOKEN,
            "pushTo": PUSH_TO,
            "pushToken": PUSH_TOKEN,
            "apiBaseUrl": base_url
        },
        "dialogflow": {
            "auth": "Bearer df-token",
            "acceptScore": 0.7,
            "apiBaseUrl": base_url
        },
        "trello": {
            "apiKey": "trello-key",
            "token": "trello-token",
            "idList": "list-1",
            "apiBaseUrl": base_url
        },
        "weather": {
            "apiKey": "weather-key",
            "location": "Tokyo,jp",
            "detailUrl": "https://openweathermap.org/city/1850147",
            "apiBaseUrl": base_url
        },
        "replyMessageToStamp": {
            "ID_2000002_48473": "flog!",
            "ID_2000002_48436": "ribbit"
        }
    })
}

pub fn router_config(base_url: &str) -> RouterConfig {
    router_config_with(base_url, |_| {})
}

pub fn router_config_with(base_url: &str, edit: impl FnOnce(&mut Value)) -> RouterConfig {
    let mut value = config_json(base_url);
    edit(&mut value);
    parse_router_config(&value.to_string()).expect("test config should be valid")
}

pub fn text_event(token: &str, text: &str) -> InboundEvent {
    InboundEvent::Message {
        reply_token: Some(ReplyToken::new(token)),
        message: InboundMessage::Text {
            text: text.to_string(),
        },
    }
}

/// Text event delivered without a reply token (e.g. standby mode).
pub fn unreplyable_text_event(text: &str) -> InboundEvent {
    InboundEvent::Message {
        reply_token: None,
        message: InboundMessage::Text {
            text: text.to_string(),
        },
    }
}

pub fn sticker_event(token: &str, package_id: &str, sticker_id: &str) -> InboundEvent {
    InboundEvent::Message {
        reply_token: Some(ReplyToken::new(token)),
        message: InboundMessage::Sticker {
            package_id: package_id.to_string(),
            sticker_id: sticker_id.to_string(),
        },
    }
}

pub fn intent_body(score: f64, speech: &str, card: &str, weather: &str) -> String {
    json!({
        "id": "req-1",
        "result": {
            "score": score,
            "parameters": {"Card": card, "Weather": weather},
            "fulfillment": {"speech": speech}
        },
        "status": {"code": 200, "errorType": "success"}
    })
    .to_string()
}

/// Daily forecast body with `days` entries starting 2024-01-01 03:00 UTC.
pub fn forecast_body(days: usize) -> String {
    let list: Vec<Value> = (0..days)
        .map(|day| {
            json!({
                "dt": 1_704_078_000i64 + day as i64 * 86_400,
                "temp": {"day": 8.0, "min": 2.0, "max": 9.5},
                "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}]
            })
        })
        .collect();
    json!({"city": {"name": "Tokyo"}, "cnt": days, "list": list}).to_string()
}

pub fn webhook_body(events: Value) -> String {
    json!({"destination": "Ubot", "events": events}).to_string()
}

pub fn sign(body: &str) -> String {
    sign_line_body(CHANNEL_SECRET, body.as_bytes()).expect("signing should succeed")
}

/// Serves the router on an ephemeral local port and returns its base URL.
pub async fn spawn_app(config: RouterConfig) -> String {
    let app = build_router(build_state(config).expect("state should build"));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server should run");
    });
    format!("http://{}", addr)
}
