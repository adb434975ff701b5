//! Public IP lookup for the `ip` command

use crate::error::RtdlError;
use reqwest::Client;
use rtdl_types::IpInfo;
use serde::Deserialize;
use std::time::Duration;
use tracing::error;

pub const DEFAULT_IP_API_URL: &str = "http://ip-api.com/json/";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    query: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    region_name: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    isp: String,
}

impl TryFrom<IpApiResponse> for IpInfo {
    type Error = RtdlError;

    fn try_from(resp: IpApiResponse) -> Result<Self, Self::Error> {
        if resp.status == "fail" {
            return Err(RtdlError::Network(
                resp.message.unwrap_or_else(|| "IP API request failed".to_string()),
            ));
        }
        Ok(IpInfo {
            query: resp.query,
            country: resp.country,
            region_name: resp.region_name,
            city: resp.city,
            isp: resp.isp,
        })
    }
}

/// Client for an ip-api.com compatible endpoint
#[derive(Debug, Clone)]
pub struct IpLookup {
    client: Client,
    url: String,
}

impl IpLookup {
    pub fn new(url: impl Into<String>) -> Result<Self, RtdlError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RtdlError::Config(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub async fn lookup(&self) -> Result<IpInfo, RtdlError> {
        let response: IpApiResponse = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                error!("Failed to fetch IP data: {}", e);
                RtdlError::Network(e.to_string())
            })?
            .json()
            .await
            .map_err(|e| RtdlError::Network(e.to_string()))?;

        response.try_into()
    }
}
