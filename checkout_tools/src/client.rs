use std::time::Duration;

use anyhow::{anyhow, Result};
use log::trace;
use payment_reconciler::status_objects::StatusQuery;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use storefront_server::data_objects::PaymentStatusResponse;
use url::Url;

use crate::poller::{StatusCheck, StatusCheckError};

pub struct CheckoutClient {
    client: Client,
    server: Url,
}

impl CheckoutClient {
    pub fn new(server: Url, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .user_agent("Storefront Checkout Tools")
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client. {e}"))?;
        Ok(Self { client, server })
    }

    pub fn server(&self) -> &str {
        self.server.as_str()
    }

    pub fn url(&self, path: &str) -> Result<Url> {
        self.server.join(path).map_err(|e| anyhow!("Failed to join URL: {}", e))
    }

    pub async fn health(&self) -> Result<String> {
        let url = self.url("/health")?;
        let res = self.client.get(url).send().await?;
        let response = res.text().await?;
        Ok(response)
    }

    /// Asks the payment server for the status of a payment, by processor reference or by order id.
    pub async fn payment_status(&self, query: &StatusQuery) -> Result<PaymentStatusResponse, StatusCheckError> {
        let mut url = self.url("/api/payment_status").map_err(|e| StatusCheckError::Transport(e.to_string()))?;
        match query {
            StatusQuery::Reference(reference) => {
                url.query_pairs_mut().append_pair("reference", reference);
            },
            StatusQuery::OrderId(order_id) => {
                url.query_pairs_mut().append_pair("order_id", order_id.as_str());
            },
        }
        trace!("⏱️ GET {url}");
        let res = self.client.get(url).send().await.map_err(|e| StatusCheckError::Transport(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            let message = res.text().await.unwrap_or_default();
            return Err(StatusCheckError::Server { status: status.as_u16(), message });
        }
        res.json::<PaymentStatusResponse>().await.map_err(|e| StatusCheckError::InvalidResponse(e.to_string()))
    }
}

impl StatusCheck for CheckoutClient {
    async fn check(&self, query: &StatusQuery) -> Result<PaymentStatusResponse, StatusCheckError> {
        self.payment_status(query).await
    }
}
