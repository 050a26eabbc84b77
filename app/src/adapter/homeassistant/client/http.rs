use anyhow::Context;
use infrastructure::HttpClientConfig;
use reqwest_middleware::ClientWithMiddleware;

use crate::adapter::homeassistant::StateEntry;

#[derive(Debug, Clone)]
pub struct HaHttpClient {
    client: ClientWithMiddleware,
    base_url: String,
}

impl HaHttpClient {
    pub fn new(url: &str, token: &str) -> anyhow::Result<Self> {
        let client = HttpClientConfig::new(Some(token.to_owned())).new_tracing_client()?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_owned(),
        })
    }
}

impl HaHttpClient {
    #[tracing::instrument(skip(self))]
    pub async fn get_current_states(&self) -> anyhow::Result<Vec<StateEntry>> {
        let response = self
            .client
            .get(format!("{}/api/states", self.base_url))
            .send()
            .await
            .context("Error requesting current states")?
            .error_for_status()
            .context("Home Assistant rejected states request")?;

        response
            .json::<Vec<StateEntry>>()
            .await
            .context("Error parsing current states")
    }
}
