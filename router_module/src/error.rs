use std::fmt;

/// External HTTP services the router talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalService {
    Line,
    Dialogflow,
    Trello,
    Weather,
}

impl fmt::Display for ExternalService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExternalService::Line => "line",
            ExternalService::Dialogflow => "dialogflow",
            ExternalService::Trello => "trello",
            ExternalService::Weather => "weather",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("invalid webhook signature: {0}")]
    SignatureInvalid(&'static str),
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("{service} request failed: {message}")]
    Network {
        service: ExternalService,
        message: String,
    },
    #[error("{service} returned {status}: {body}")]
    Status {
        service: ExternalService,
        status: u16,
        body: String,
    },
    #[error("failed to parse {service} response: {message}")]
    Parse {
        service: ExternalService,
        message: String,
    },
    #[error("forecast has {actual} entries, expected at least {expected}")]
    ForecastIncomplete { expected: usize, actual: usize },
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("config error: {0}")]
    ConfigLoad(String),
    #[error("message delivery failed: {0}")]
    Delivery(String),
}

impl RouterError {
    pub(crate) fn network(service: ExternalService, err: reqwest::Error) -> Self {
        RouterError::Network {
            service,
            message: err.to_string(),
        }
    }

    pub(crate) fn parse(service: ExternalService, err: impl fmt::Display) -> Self {
        RouterError::Parse {
            service,
            message: err.to_string(),
        }
    }
}

/// Reads the body of a response, turning non-2xx statuses into `RouterError::Status`.
pub(crate) async fn read_success_body(
    service: ExternalService,
    response: reqwest::Response,
) -> Result<String, RouterError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| RouterError::network(service, err))?;
    if !status.is_success() {
        return Err(RouterError::Status {
            service,
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}
