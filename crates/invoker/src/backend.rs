//! The invoke-side seam to the compute backend.

use async_trait::async_trait;
use fanout_core::{BackendConfig, Error, Payload, Result};

/// One remote compute backend reachable by the invoker.
///
/// `fire` is event-style: the backend acknowledges receipt and executes
/// asynchronously. `call` waits for the invocation to be accepted and
/// acknowledged synchronously; warm-up traffic uses it so capacity is
/// provisioned before the constructor returns.
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn fire(&self, payload: &Payload) -> Result<()>;

    async fn call(&self, payload: &Payload) -> Result<()>;

    fn describe(&self) -> BackendConfig;
}

/// HTTP backend client: POSTs the JSON payload to a trigger endpoint.
pub struct HttpBackend {
    client: reqwest::Client,
    function_name: String,
    endpoint: String,
}

impl HttpBackend {
    pub fn new(function_name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            function_name: function_name.into(),
            endpoint: endpoint.into(),
        }
    }

    async fn post(&self, payload: &Payload, invocation_type: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-invocation-type", invocation_type)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::dispatch(&self.endpoint, e.to_string()))?;

        if let Err(e) = response.error_for_status() {
            return Err(Error::dispatch(&self.endpoint, e.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BackendClient for HttpBackend {
    async fn fire(&self, payload: &Payload) -> Result<()> {
        self.post(payload, "event").await
    }

    async fn call(&self, payload: &Payload) -> Result<()> {
        self.post(payload, "request-response").await
    }

    fn describe(&self) -> BackendConfig {
        BackendConfig {
            function_name: self.function_name.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}
