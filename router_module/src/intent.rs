//! Intent resolution through the Dialogflow v1 query API.
//!
//! Every query is sent with the same session id, so the agent sees all users as a
//! single continuous conversation. Contexts set by one user leak into another's turn.

use std::collections::HashMap;
use std::fmt;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::DialogflowConfig;
use crate::error::{read_success_body, ExternalService, RouterError};

/// Protocol version pinned by the v1 API.
const PROTOCOL_VERSION: &str = "20150910";

/// Shared session id for every query.
const SESSION_ID: &str = "12345";

/// Parameter naming the title of a card to create.
pub const CARD_PARAMETER: &str = "Card";

/// Parameter that, when set, requests a weather forecast push.
pub const WEATHER_PARAMETER: &str = "Weather";

/// Mapped answer for one utterance. Empty strings mean "not present".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntentResult {
    pub fulfillment: String,
    pub score: f64,
    pub parameters: HashMap<String, String>,
}

impl IntentResult {
    pub fn parameter(&self, name: &str) -> &str {
        self.parameters.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn card_title(&self) -> &str {
        self.parameter(CARD_PARAMETER)
    }

    pub fn weather_trigger(&self) -> &str {
        self.parameter(WEATHER_PARAMETER)
    }

    pub fn is_accepted(&self, accept_score: f64) -> bool {
        self.score >= accept_score
    }
}

#[derive(Clone)]
pub struct IntentClient {
    client: Client,
    api_base_url: String,
    authorization: String,
    lang: String,
}

impl fmt::Debug for IntentClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntentClient")
            .field("api_base_url", &self.api_base_url)
            .field("lang", &self.lang)
            .finish_non_exhaustive()
    }
}

impl IntentClient {
    pub fn new(client: Client, config: &DialogflowConfig) -> Self {
        Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            authorization: authorization_header(&config.auth),
            lang: config.lang.clone(),
        }
    }

    pub async fn resolve(&self, text: &str) -> Result<IntentResult, RouterError> {
        let url = format!("{}/v1/query", self.api_base_url);
        debug!("querying dialogflow: {}", url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.authorization.as_str())
            .query(&[
                ("v", PROTOCOL_VERSION),
                ("lang", self.lang.as_str()),
                ("query", text),
                ("sessionId", SESSION_ID),
            ])
            .send()
            .await
            .map_err(|err| RouterError::network(ExternalService::Dialogflow, err))?;

        let body = read_success_body(ExternalService::Dialogflow, response).await?;
        parse_intent_response(&body)
    }
}

/// Uses the configured value verbatim when it names a scheme, otherwise treats it as a bearer token.
fn authorization_header(auth: &str) -> String {
    let auth = auth.trim();
    if auth.contains(char::is_whitespace) {
        auth.to_string()
    } else {
        format!("Bearer {}", auth)
    }
}

pub fn parse_intent_response(body: &str) -> Result<IntentResult, RouterError> {
    let response: DialogflowResponse = serde_json::from_str(body)
        .map_err(|err| RouterError::parse(ExternalService::Dialogflow, err))?;
    let result = response.result;

    let parameters = result
        .parameters
        .into_iter()
        .filter_map(|(name, value)| {
            let value = match value {
                serde_json::Value::String(text) => text,
                serde_json::Value::Number(number) => number.to_string(),
                serde_json::Value::Bool(flag) => flag.to_string(),
                _ => return None,
            };
            Some((name, value))
        })
        .collect();

    Ok(IntentResult {
        fulfillment: result.fulfillment.speech.unwrap_or_default(),
        score: result.score.unwrap_or(0.0),
        parameters,
    })
}

// ============================================================================
// Dialogflow v1 API types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct DialogflowResponse {
    #[serde(default)]
    result: DialogflowResult,
}

#[derive(Debug, Default, Deserialize)]
struct DialogflowResult {
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    parameters: HashMap<String, serde_json::Value>,
    #[serde(default)]
    fulfillment: DialogflowFulfillment,
}

#[derive(Debug, Default, Deserialize)]
struct DialogflowFulfillment {
    #[serde(default)]
    speech: Option<String>,
}
