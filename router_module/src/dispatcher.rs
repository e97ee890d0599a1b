//! Routes inbound chat events to intent resolution, side effects and replies.
//!
//! Events in a batch are handled one at a time in delivery order. A failure while
//! handling one event is logged and recorded in its `EventOutcome`; it never stops
//! the remaining events and never unwinds side effects that already happened.

use reqwest::Client;
use tracing::{error, info, warn};

use crate::adapters::line::LineMessagingClient;
use crate::channel::{InboundEvent, InboundMessage, OutboundMessage, ReplyToken};
use crate::config::{RouterConfig, StickerReplyTable};
use crate::error::RouterError;
use crate::forecast::{build_forecast_carousel, ForecastClient};
use crate::intent::IntentClient;
use crate::task_board::TaskBoardClient;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ReplyOutcome {
    /// No reply was warranted.
    #[default]
    Silent,
    Sent(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SideEffectOutcome {
    #[default]
    NotTriggered,
    Done,
    /// Triggered, but the service is not configured.
    Skipped,
    Failed(String),
}

/// What happened while handling one event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventOutcome {
    pub reply: ReplyOutcome,
    pub card: SideEffectOutcome,
    pub weather: SideEffectOutcome,
    pub intent_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EventDispatcher {
    line: LineMessagingClient,
    intents: IntentClient,
    task_board: Option<TaskBoardClient>,
    forecast: Option<ForecastClient>,
    accept_score: f64,
    push_to: String,
    sticker_replies: StickerReplyTable,
}

impl EventDispatcher {
    pub fn new(config: &RouterConfig, client: Client) -> Self {
        Self {
            line: LineMessagingClient::new(
                client.clone(),
                &config.line.api_base_url,
                &config.line.channel_access_token,
            ),
            intents: IntentClient::new(client.clone(), &config.dialogflow),
            task_board: config
                .trello
                .clone()
                .map(|trello| TaskBoardClient::new(client.clone(), trello)),
            forecast: config
                .weather
                .clone()
                .map(|weather| ForecastClient::new(client.clone(), weather)),
            accept_score: config.dialogflow.accept_score,
            push_to: config.line.push_to.clone(),
            sticker_replies: config.sticker_replies.clone(),
        }
    }

    pub fn line(&self) -> &LineMessagingClient {
        &self.line
    }

    pub fn push_to(&self) -> &str {
        &self.push_to
    }

    pub async fn dispatch(&self, events: Vec<InboundEvent>) -> Vec<EventOutcome> {
        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            outcomes.push(self.handle_event(event).await);
        }
        outcomes
    }

    async fn handle_event(&self, event: InboundEvent) -> EventOutcome {
        let mut outcome = EventOutcome::default();
        let (reply_token, message) = match event {
            InboundEvent::Message {
                reply_token,
                message,
            } => (reply_token, message),
            InboundEvent::Other { event_type } => {
                info!("ignoring {} event", event_type);
                return outcome;
            }
        };

        let reply = match message {
            InboundMessage::Text { text } => {
                info!("[user][text] {}", text);
                self.handle_text(&text, &mut outcome).await
            }
            InboundMessage::Sticker {
                package_id,
                sticker_id,
            } => {
                info!("[user][sticker] {} {}", package_id, sticker_id);
                self.sticker_replies
                    .lookup(&package_id, &sticker_id)
                    .map(str::to_string)
            }
            InboundMessage::Other { message_type } => {
                info!("ignoring {} message", message_type);
                None
            }
        };

        let Some(text) = reply.filter(|text| !text.is_empty()) else {
            return outcome;
        };
        match reply_token {
            Some(reply_token) => outcome.reply = self.send_reply(reply_token, text).await,
            None => info!("no reply token, dropping reply {:?}", text),
        }
        outcome
    }

    /// Resolves the intent, fires side effects and returns the candidate reply.
    async fn handle_text(&self, text: &str, outcome: &mut EventOutcome) -> Option<String> {
        let intent = match self.intents.resolve(text).await {
            Ok(intent) => intent,
            Err(err) => {
                warn!("intent resolution failed: {}", err);
                outcome.intent_error = Some(err.to_string());
                return None;
            }
        };

        let reply = if intent.is_accepted(self.accept_score) {
            Some(intent.fulfillment.clone())
        } else {
            info!(
                "intent score {} below threshold {}, staying silent",
                intent.score, self.accept_score
            );
            None
        };

        let card_title = intent.card_title();
        if !card_title.is_empty() {
            outcome.card = self.create_card(card_title).await;
        }
        if !intent.weather_trigger().is_empty() {
            outcome.weather = self.push_weather().await;
        }

        reply
    }

    async fn send_reply(&self, reply_token: ReplyToken, text: String) -> ReplyOutcome {
        info!("[bot][text] {}", text);
        match self
            .line
            .reply(reply_token, vec![OutboundMessage::text(text.clone())])
            .await
        {
            Ok(()) => ReplyOutcome::Sent(text),
            Err(err) => {
                error!("reply failed: {}", err);
                ReplyOutcome::Failed(err.to_string())
            }
        }
    }

    pub async fn create_card(&self, title: &str) -> SideEffectOutcome {
        let Some(board) = &self.task_board else {
            warn!("card {:?} requested but trello is not configured", title);
            return SideEffectOutcome::Skipped;
        };
        match board.create_card(title).await {
            Ok(card) => {
                info!("created card {:?} id={:?}", title, card.id);
                SideEffectOutcome::Done
            }
            Err(err) => {
                error!("failed to create card {:?}: {}", title, err);
                SideEffectOutcome::Failed(err.to_string())
            }
        }
    }

    pub async fn push_weather(&self) -> SideEffectOutcome {
        let Some(forecast) = &self.forecast else {
            warn!("weather push requested but weather is not configured");
            return SideEffectOutcome::Skipped;
        };
        match self.fetch_and_push_weather(forecast).await {
            Ok(()) => {
                info!("pushed weather forecast to {}", self.push_to);
                SideEffectOutcome::Done
            }
            Err(err) => {
                error!("weather push failed: {}", err);
                SideEffectOutcome::Failed(err.to_string())
            }
        }
    }

    async fn fetch_and_push_weather(&self, forecast: &ForecastClient) -> Result<(), RouterError> {
        let entries = forecast.fetch_daily().await?;
        let message = build_forecast_carousel(&entries, forecast.detail_url())?;
        self.line.push(&self.push_to, vec![message]).await
    }
}
