use serde_json::Value;
use std::time::Duration;

use model::{LinkError, Result};

const USER_AGENT: &str = concat!("entity-linker/", env!("CARGO_PKG_VERSION"), " (knowledge-base resolution)");

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| LinkError::Config(format!("HTTP client: {}", e)))
}

/// GET `url` and parse the body as JSON, classifying failures for the cascade.
pub(crate) async fn get_json(
    client: &reqwest::Client,
    url: &str,
    params: &[(&str, &str)],
    what: &str,
) -> Result<Value> {
    let response = client
        .get(url)
        .query(params)
        .send()
        .await
        .map_err(|e| classify(e, what))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LinkError::Transport(format!("{} returned {}", what, status)));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| LinkError::Parse(format!("{}: {}", what, e)))
}

fn classify(e: reqwest::Error, what: &str) -> LinkError {
    if e.is_timeout() {
        LinkError::Timeout(format!("{}: {}", what, e))
    } else {
        LinkError::Transport(format!("{}: {}", what, e))
    }
}

/// Substitute `{lang}` in an endpoint template.
pub(crate) fn endpoint_for(template: &str, language: &str) -> String {
    template.replace("{lang}", language)
}
