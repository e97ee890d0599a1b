use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::RouterError;

pub const DEFAULT_PORT: u16 = 9090;
pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_LINE_API_BASE_URL: &str = "https://api.line.me";
pub const DEFAULT_DIALOGFLOW_API_BASE_URL: &str = "https://api.dialogflow.com";
pub const DEFAULT_DIALOGFLOW_LANG: &str = "ja";
pub const DEFAULT_TRELLO_API_BASE_URL: &str = "https://trello.com";
pub const DEFAULT_WEATHER_API_BASE_URL: &str = "https://api.openweathermap.org";
pub const DEFAULT_WEATHER_LOCATION: &str = "Tokyo,jp";
pub const DEFAULT_WEATHER_DETAIL_URL: &str = "https://openweathermap.org/";

// ============================================================================
// On-disk shape
// ============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RouterConfigFile {
    port: Option<PortValue>,
    http_timeout_seconds: Option<u64>,
    #[serde(default)]
    line: LineConfigFile,
    #[serde(default)]
    dialogflow: DialogflowConfigFile,
    trello: Option<TrelloConfigFile>,
    weather: Option<WeatherConfigFile>,
    ssh_credential: Option<SshCredentialFile>,
    #[serde(default)]
    reply_message_to_stamp: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u16),
    Text(String),
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LineConfigFile {
    #[serde(default)]
    channel_secret: String,
    #[serde(default)]
    channel_access_token: String,
    #[serde(default)]
    push_to: String,
    push_token: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DialogflowConfigFile {
    #[serde(default)]
    auth: String,
    accept_score: Option<f64>,
    lang: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrelloConfigFile {
    #[serde(default)]
    api_key: String,
    #[serde(default)]
    token: String,
    #[serde(default)]
    id_list: String,
    api_base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeatherConfigFile {
    #[serde(default)]
    api_key: String,
    location: Option<String>,
    detail_url: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SshCredentialFile {
    #[serde(default)]
    full_chain_path: String,
    #[serde(default)]
    private_key_path: String,
}

// ============================================================================
// Validated configuration
// ============================================================================

/// Process-wide configuration. Built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub port: u16,
    pub http_timeout: Option<Duration>,
    pub line: LineConfig,
    pub dialogflow: DialogflowConfig,
    pub trello: Option<TrelloConfig>,
    pub weather: Option<WeatherConfig>,
    pub tls: Option<TlsConfig>,
    pub sticker_replies: StickerReplyTable,
}

#[derive(Debug, Clone)]
pub struct LineConfig {
    pub channel_secret: String,
    pub channel_access_token: String,
    /// Fixed recipient for pushes (user, group or room id).
    pub push_to: String,
    /// Shared secret required on the push endpoint; the endpoint is closed when unset.
    pub push_token: Option<String>,
    pub api_base_url: String,
}

#[derive(Debug, Clone)]
pub struct DialogflowConfig {
    pub auth: String,
    pub accept_score: f64,
    pub lang: String,
    pub api_base_url: String,
}

#[derive(Debug, Clone)]
pub struct TrelloConfig {
    pub api_key: String,
    pub token: String,
    pub id_list: String,
    pub api_base_url: String,
}

#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub api_key: String,
    pub location: String,
    pub detail_url: String,
    pub api_base_url: String,
}

#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub full_chain_path: PathBuf,
    pub private_key_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StickerKey {
    pub package_id: String,
    pub sticker_id: String,
}

/// Canned replies keyed by (package id, sticker id).
#[derive(Debug, Clone, Default)]
pub struct StickerReplyTable {
    replies: HashMap<StickerKey, String>,
}

impl StickerReplyTable {
    /// Builds the table from `ID_<packageId>_<stickerId>` keyed entries.
    pub fn from_entries<'a>(
        entries: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, RouterError> {
        let mut replies = HashMap::new();
        for (raw_key, reply) in entries {
            let key = parse_sticker_key(raw_key).ok_or_else(|| {
                RouterError::ConfigLoad(format!(
                    "invalid sticker key {:?} (expected ID_<packageId>_<stickerId>)",
                    raw_key
                ))
            })?;
            replies.insert(key, reply.to_string());
        }
        Ok(Self { replies })
    }

    pub fn lookup(&self, package_id: &str, sticker_id: &str) -> Option<&str> {
        let key = StickerKey {
            package_id: package_id.to_string(),
            sticker_id: sticker_id.to_string(),
        };
        self.replies.get(&key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.replies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }
}

fn parse_sticker_key(raw: &str) -> Option<StickerKey> {
    let rest = raw.trim().strip_prefix("ID_")?;
    let (package_id, sticker_id) = rest.split_once('_')?;
    if package_id.is_empty() || sticker_id.is_empty() || sticker_id.contains('_') {
        return None;
    }
    Some(StickerKey {
        package_id: package_id.to_string(),
        sticker_id: sticker_id.to_string(),
    })
}

// ============================================================================
// Loading
// ============================================================================

/// Config path: explicit argument, then `ROUTER_CONFIG_PATH`, then `config.json`.
pub fn resolve_router_config_path(arg: Option<String>) -> PathBuf {
    if let Some(path) = arg.filter(|value| !value.trim().is_empty()) {
        return PathBuf::from(path);
    }
    if let Ok(path) = env::var("ROUTER_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

pub fn load_router_config(path: &Path) -> Result<RouterConfig, RouterError> {
    let content = std::fs::read_to_string(path).map_err(|err| {
        RouterError::ConfigLoad(format!(
            "failed to read router config {}: {}",
            path.display(),
            err
        ))
    })?;
    parse_router_config(&content)
}

pub fn parse_router_config(content: &str) -> Result<RouterConfig, RouterError> {
    let file: RouterConfigFile = serde_json::from_str(content)
        .map_err(|err| RouterError::ConfigLoad(format!("failed to parse router config: {}", err)))?;
    RouterConfig::from_file(file)
}

impl RouterConfig {
    fn from_file(file: RouterConfigFile) -> Result<Self, RouterError> {
        let port = match file.port {
            None => DEFAULT_PORT,
            Some(PortValue::Number(port)) => port,
            Some(PortValue::Text(text)) if text.trim().is_empty() => DEFAULT_PORT,
            Some(PortValue::Text(text)) => text
                .trim()
                .parse::<u16>()
                .map_err(|_| RouterError::ConfigLoad(format!("invalid port {:?}", text)))?,
        };

        let line = LineConfig {
            channel_secret: required(file.line.channel_secret, "line.channelSecret")?,
            channel_access_token: required(
                file.line.channel_access_token,
                "line.channelAccessToken",
            )?,
            push_to: file.line.push_to.trim().to_string(),
            push_token: non_empty(file.line.push_token),
            api_base_url: base_url(file.line.api_base_url, DEFAULT_LINE_API_BASE_URL),
        };

        let accept_score = file.dialogflow.accept_score.unwrap_or(0.0);
        if !accept_score.is_finite() {
            return Err(RouterError::ConfigLoad(
                "dialogflow.acceptScore must be a finite number".to_string(),
            ));
        }
        let dialogflow = DialogflowConfig {
            auth: required(file.dialogflow.auth, "dialogflow.auth")?,
            accept_score,
            lang: non_empty(file.dialogflow.lang)
                .unwrap_or_else(|| DEFAULT_DIALOGFLOW_LANG.to_string()),
            api_base_url: base_url(file.dialogflow.api_base_url, DEFAULT_DIALOGFLOW_API_BASE_URL),
        };

        let trello = file
            .trello
            .map(|trello| -> Result<TrelloConfig, RouterError> {
                Ok(TrelloConfig {
                    api_key: required(trello.api_key, "trello.apiKey")?,
                    token: required(trello.token, "trello.token")?,
                    id_list: required(trello.id_list, "trello.idList")?,
                    api_base_url: base_url(trello.api_base_url, DEFAULT_TRELLO_API_BASE_URL),
                })
            })
            .transpose()?;

        let weather = file
            .weather
            .map(|weather| -> Result<WeatherConfig, RouterError> {
                Ok(WeatherConfig {
                    api_key: required(weather.api_key, "weather.apiKey")?,
                    location: non_empty(weather.location)
                        .unwrap_or_else(|| DEFAULT_WEATHER_LOCATION.to_string()),
                    detail_url: non_empty(weather.detail_url)
                        .unwrap_or_else(|| DEFAULT_WEATHER_DETAIL_URL.to_string()),
                    api_base_url: base_url(weather.api_base_url, DEFAULT_WEATHER_API_BASE_URL),
                })
            })
            .transpose()?;

        let tls = match file.ssh_credential {
            Some(credential) => Some(TlsConfig {
                full_chain_path: existing_file(
                    credential.full_chain_path,
                    "sshCredential.fullChainPath",
                )?,
                private_key_path: existing_file(
                    credential.private_key_path,
                    "sshCredential.privateKeyPath",
                )?,
            }),
            None => None,
        };

        let sticker_replies = StickerReplyTable::from_entries(
            file.reply_message_to_stamp
                .iter()
                .map(|(key, reply)| (key.as_str(), reply.as_str())),
        )?;

        Ok(RouterConfig {
            port,
            http_timeout: file
                .http_timeout_seconds
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            line,
            dialogflow,
            trello,
            weather,
            tls,
            sticker_replies,
        })
    }
}

fn required(value: String, field: &str) -> Result<String, RouterError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RouterError::ConfigLoad(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn base_url(value: Option<String>, default: &str) -> String {
    non_empty(value)
        .unwrap_or_else(|| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

fn existing_file(value: String, field: &str) -> Result<PathBuf, RouterError> {
    let path = PathBuf::from(required(value, field)?);
    if !path.is_file() {
        return Err(RouterError::ConfigLoad(format!(
            "{} does not exist: {}",
            field,
            path.display()
        )));
    }
    Ok(path)
}
