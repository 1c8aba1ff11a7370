//! HTTP-backed capability implementations, configured by URL in
//! `config/assistant.ron` (services section).

use async_trait::async_trait;
use reqwest::Client;

use super::{LocationCapability, WeatherCapability};
use crate::errors::ResolverError;
use crate::models::Address;

/// Geocode service client. `GET {base}/v1/address` returns the detected
/// address as JSON.
pub struct HttpLocationService {
    client: Client,
    base_url: String,
}

impl HttpLocationService {
    pub fn new(base_url: String) -> Self {
        HttpLocationService {
            client: Client::new(),
            base_url,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl LocationCapability for HttpLocationService {
    async fn detect_current_address(&self) -> Result<Address, ResolverError> {
        let address: Address = self
            .client
            .get(self.endpoint("v1/address"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if address.is_empty() {
            return Err(ResolverError::NotAvailable);
        }
        Ok(address)
    }
}

/// Weather service client. `POST {base}/v1/refresh` with the address as JSON
/// body; only the status matters.
pub struct HttpWeatherService {
    client: Client,
    base_url: String,
}

impl HttpWeatherService {
    pub fn new(base_url: String) -> Self {
        HttpWeatherService {
            client: Client::new(),
            base_url,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl WeatherCapability for HttpWeatherService {
    async fn refresh(&self, address: &Address) -> Result<(), ResolverError> {
        self.client
            .post(self.endpoint("v1/refresh"))
            .json(address)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
