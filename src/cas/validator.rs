use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error};

use super::protocol::ValidationOutcome;
use super::redirect::RedirectBuilder;
use crate::config::GatewayConfig;
use crate::error::{CasError, CasResult};

/// Exchanges a service ticket for an identity. One call, one outcome; implementations
/// never retry.
pub trait TicketValidator: Send + Sync {
    fn validate(&self, ticket: &str, service: &str) -> impl Future<Output = ValidationOutcome> + Send;
}

/// Validates tickets against the CAS server over HTTP(S).
#[derive(Clone)]
pub struct HttpTicketValidator {
    config: Arc<GatewayConfig>,
    urls: RedirectBuilder,
    client: reqwest::Client,
}

impl HttpTicketValidator {
    pub fn new(config: Arc<GatewayConfig>) -> CasResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.validation_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| CasError::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: Arc<GatewayConfig>, client: reqwest::Client) -> Self {
        let urls = RedirectBuilder::new(config.clone());
        Self { config, urls, client }
    }

    async fn fetch(&self, ticket: &str, service: &str) -> CasResult<String> {
        let url = self.urls.validation_url(ticket, service);
        let resp = self.client.get(url).send().await
            .map_err(|e| CasError::transport(e.to_string()))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| CasError::transport(e.to_string()))?;
        debug!(target: "casgate::validate", "CAS responded status={} bytes={}", status, body.len());
        Ok(body)
    }
}

impl TicketValidator for HttpTicketValidator {
    async fn validate(&self, ticket: &str, service: &str) -> ValidationOutcome {
        match self.fetch(ticket, service).await {
            Ok(body) => self.config.version().parse(&body),
            Err(e) => {
                error!(target: "casgate::validate", "ticket validation against {} failed: {}", self.config.cas_url(), e);
                ValidationOutcome::Failure(e)
            }
        }
    }
}
