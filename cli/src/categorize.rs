use anyhow::{Context, Result};

use vitacheck_core::categorize::{CategorizeRequest, CategorizeResponse};
use vitacheck_core::service::CategorizationProvider;

pub struct CategorizeClient {
    client: reqwest::Client,
    url: String,
    rt: tokio::runtime::Handle,
}

impl CategorizeClient {
    /// Client bound to the current tokio runtime.
    pub fn new(url: &str) -> Result<Self> {
        let rt = tokio::runtime::Handle::try_current()
            .context("Categorization client needs a tokio runtime")?;
        Self::with_handle(url, rt)
    }

    pub fn with_handle(url: &str, rt: tokio::runtime::Handle) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "vitacheck-cli/{} (supplement tracker)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
            rt,
        })
    }

    pub async fn categorize_async(&self, supplement_name: &str) -> Result<CategorizeResponse> {
        let resp = self
            .client
            .post(&self.url)
            .json(&CategorizeRequest { supplement_name })
            .send()
            .await
            .context("Failed to reach the categorization service")?
            .error_for_status()
            .context("Categorization service returned an error")?;

        resp.json()
            .await
            .context("Failed to parse categorization response")
    }
}

impl CategorizationProvider for CategorizeClient {
    fn categorize(&self, supplement_name: &str) -> Result<CategorizeResponse> {
        self.rt.block_on(self.categorize_async(supplement_name))
    }
}
