use std::fmt;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::TrelloConfig;
use crate::error::{read_success_body, ExternalService, RouterError};

/// Creates cards on a fixed Trello list.
#[derive(Clone)]
pub struct TaskBoardClient {
    client: Client,
    config: TrelloConfig,
}

impl fmt::Debug for TaskBoardClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskBoardClient")
            .field("api_base_url", &self.config.api_base_url)
            .field("id_list", &self.config.id_list)
            .finish_non_exhaustive()
    }
}

/// Card returned by the board. The id is absent when the response is not JSON.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CreatedCard {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "shortUrl")]
    pub short_url: Option<String>,
}

impl TaskBoardClient {
    pub fn new(client: Client, config: TrelloConfig) -> Self {
        Self { client, config }
    }

    pub async fn create_card(&self, title: &str) -> Result<CreatedCard, RouterError> {
        if title.trim().is_empty() {
            return Err(RouterError::MalformedRequest("card title is empty".to_string()));
        }

        let url = format!("{}/1/cards", self.config.api_base_url);
        debug!("creating trello card on list {}", self.config.id_list);

        let response = self
            .client
            .post(&url)
            .form(&[
                ("key", self.config.api_key.as_str()),
                ("token", self.config.token.as_str()),
                ("idList", self.config.id_list.as_str()),
                ("name", title),
            ])
            .send()
            .await
            .map_err(|err| RouterError::network(ExternalService::Trello, err))?;

        let body = read_success_body(ExternalService::Trello, response).await?;
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }
}
