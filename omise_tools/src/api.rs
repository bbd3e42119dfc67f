use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::de::DeserializeOwned;

use crate::{Charge, ChargeList, OmiseApiError, OmiseConfig};

#[derive(Clone)]
pub struct OmiseApi {
    config: OmiseConfig,
    client: Arc<Client>,
}

impl OmiseApi {
    pub fn new(config: OmiseConfig) -> Result<Self, OmiseApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| OmiseApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &OmiseConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url.trim_end_matches('/'))
    }

    /// Omise authenticates with HTTP basic auth: the secret key is the user name and the password is empty.
    pub async fn rest_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, OmiseApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req =
            self.client.request(method, url).basic_auth(self.config.secret_key.reveal().as_str(), Option::<&str>::None);
        if !params.is_empty() {
            req = req.query(params);
        }
        let response = req.send().await?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| OmiseApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await?;
            Err(OmiseApiError::QueryError { status, message })
        }
    }

    /// The most recent `limit` charges, newest first.
    pub async fn list_recent_charges(&self, limit: usize) -> Result<Vec<Charge>, OmiseApiError> {
        let limit = limit.to_string();
        let params = [("limit", limit.as_str()), ("order", "reverse_chronological")];
        debug!("Fetching the {limit} most recent charges");
        let result = self.rest_query::<ChargeList>(Method::GET, "/charges", &params).await?;
        debug!("Fetched {} charges (of {})", result.data.len(), result.total);
        Ok(result.data)
    }

    pub async fn get_charge(&self, charge_id: &str) -> Result<Charge, OmiseApiError> {
        let path = format!("/charges/{charge_id}");
        debug!("Fetching charge {charge_id}");
        let charge = self.rest_query::<Charge>(Method::GET, &path, &[]).await?;
        debug!("Fetched charge {charge_id}. Status: {:?}", charge.status);
        Ok(charge)
    }
}
