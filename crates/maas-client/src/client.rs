//! MAAS API client
//!
//! Implements the MAAS REST API client for machine lifecycle operations.
//! Based on the MAAS API structure: /MAAS/api/2.0/machines/ with POST
//! operations selected through the `op` query parameter.

use crate::error::MaasError;
use crate::maas_trait::MaasClientTrait;
use crate::models::*;
use reqwest::Client;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// MAAS API key, as issued by `maas apikey`: `consumer:token:secret`
#[derive(Debug, Clone)]
struct ApiKey {
    consumer_key: String,
    token_key: String,
    token_secret: String,
}

impl ApiKey {
    fn parse(raw: &str) -> Result<Self, MaasError> {
        let mut parts = raw.split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(consumer), Some(token), Some(secret), None) => Ok(Self {
                consumer_key: consumer.to_string(),
                token_key: token.to_string(),
                token_secret: secret.to_string(),
            }),
            _ => Err(MaasError::Authentication(
                "API key must have the form consumer:token:secret".to_string(),
            )),
        }
    }
}

/// MAAS API client
pub struct MaasClient {
    client: Client,
    base_url: String,
    api_version: String,
    key: ApiKey,
}

impl MaasClient {
    /// Create a new MAAS client
    ///
    /// # Arguments
    /// * `base_url` - MAAS base URL (e.g., "http://maas:5240/MAAS")
    /// * `api_version` - API version segment, normally "2.0"
    /// * `api_key` - API key in `consumer:token:secret` form
    pub fn new(base_url: String, api_version: String, api_key: &str) -> Result<Self, MaasError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(MaasError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version,
            key: ApiKey::parse(api_key)?,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}/{}", self.base_url, self.api_version, path)
    }

    /// Build the OAuth 1.0 PLAINTEXT authorization header MAAS expects.
    ///
    /// MAAS does not require HMAC signing; the token secret travels in the
    /// signature field over the (externally secured) transport.
    fn auth_header(&self) -> String {
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let timestamp = epoch.as_secs();
        let nonce = epoch.as_nanos();
        format!(
            "OAuth oauth_version=\"1.0\", oauth_signature_method=\"PLAINTEXT\", \
             oauth_consumer_key=\"{}\", oauth_token=\"{}\", oauth_signature=\"&{}\", \
             oauth_nonce=\"{}\", oauth_timestamp=\"{}\"",
            urlencoding::encode(&self.key.consumer_key),
            urlencoding::encode(&self.key.token_key),
            urlencoding::encode(&self.key.token_secret),
            nonce,
            timestamp,
        )
    }
}

#[async_trait::async_trait]
impl MaasClientTrait for MaasClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check connectivity and credentials against the version endpoint.
    ///
    /// Lightweight probe used at startup and by `maasctl` before any
    /// machine operation is attempted.
    async fn version(&self) -> Result<MaasVersion, MaasError> {
        let url = self.api_url("version/");
        debug!("Fetching MAAS version from {}", url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(MaasError::Http)?;

        let status = response.status();
        if status == 401 || status == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(MaasError::Authentication(format!(
                "Invalid API key: {} - {}",
                status, body
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MaasError::Api(format!(
                "Failed to get version: {} - {}",
                status, body
            )));
        }

        let version: MaasVersion = response.json().await?;
        Ok(version)
    }

    /// Allocate one free machine matching the given constraints.
    ///
    /// The machine leaves the free pool on success. MAAS answers 409 when
    /// no machine satisfies the constraints.
    async fn allocate(&self, args: &AllocateArgs) -> Result<Machine, MaasError> {
        let url = format!("{}?op=allocate", self.api_url("machines/"));
        debug!("Allocating machine with tags {:?}", args.tags);

        let mut form: Vec<(&str, String)> = args
            .tags
            .iter()
            .map(|tag| ("tags", tag.clone()))
            .collect();
        if let Some(hostname) = &args.hostname {
            form.push(("name", hostname.clone()));
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(MaasError::Http)?;

        let status = response.status();
        if status == 409 {
            let body = response.text().await.unwrap_or_default();
            return Err(MaasError::Api(format!(
                "No machine matching constraints: {}",
                body
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MaasError::Api(format!(
                "Failed to allocate machine: {} - {}",
                status, body
            )));
        }

        let machine: Machine = response.json().await?;
        debug!("Allocated machine {}", machine.system_id);
        Ok(machine)
    }

    /// Deploy an allocated machine with the given image arguments.
    ///
    /// Returns the machine record as MAAS reports it after the deploy call,
    /// so the caller can read back assigned addresses. The outcome on error
    /// is ambiguous; the machine may already be mid-boot.
    async fn deploy(&self, system_id: &str, args: &DeployArgs) -> Result<Machine, MaasError> {
        let url = format!("{}?op=deploy", self.api_url(&format!("machines/{}/", system_id)));
        debug!("Deploying machine {}", system_id);

        let mut form: Vec<(&str, String)> = Vec::new();
        if let Some(series) = &args.distro_series {
            form.push(("distro_series", series.clone()));
        }
        if let Some(user_data) = &args.user_data {
            form.push(("user_data", user_data.clone()));
        }
        if let Some(kernel) = &args.hwe_kernel {
            form.push(("hwe_kernel", kernel.clone()));
        }
        if let Some(comment) = &args.comment {
            form.push(("comment", comment.clone()));
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(MaasError::Http)?;

        let status = response.status();
        if status == 404 {
            return Err(MaasError::NotFound(format!(
                "Machine {} not found",
                system_id
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MaasError::Api(format!(
                "Failed to deploy machine {}: {} - {}",
                system_id, status, body
            )));
        }

        let machine: Machine = response.json().await?;
        Ok(machine)
    }

    /// Return one or more machines to the free pool.
    ///
    /// Releasing a machine that is already free answers 409; that case maps
    /// to success since the caller's goal is already met.
    async fn release(&self, system_ids: &[String]) -> Result<(), MaasError> {
        if system_ids.is_empty() {
            return Err(MaasError::InvalidRequest(
                "No system IDs given to release".to_string(),
            ));
        }

        let url = format!("{}?op=release", self.api_url("machines/"));
        debug!("Releasing machines {:?}", system_ids);

        let form: Vec<(&str, String)> = system_ids
            .iter()
            .map(|id| ("machines", id.clone()))
            .collect();

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(MaasError::Http)?;

        let status = response.status();
        if status == 409 {
            debug!("Machines {:?} already released", system_ids);
            return Ok(());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MaasError::Api(format!(
                "Failed to release machines {:?}: {} - {}",
                system_ids, status, body
            )));
        }

        Ok(())
    }

    /// List machines by system ID.
    ///
    /// Returns zero or more full machine records; unknown IDs simply do not
    /// appear in the result.
    async fn machines(&self, system_ids: &[String]) -> Result<Vec<Machine>, MaasError> {
        let query: Vec<(&str, &str)> = system_ids
            .iter()
            .map(|id| ("id", id.as_str()))
            .collect();

        let url = self.api_url("machines/");
        debug!("Listing machines {:?}", system_ids);

        let response = self
            .client
            .get(&url)
            .query(&query)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(MaasError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MaasError::Api(format!(
                "Failed to list machines {:?}: {} - {}",
                system_ids, status, body
            )));
        }

        // The machines endpoint returns a plain JSON array, not a page.
        let response_text = response.text().await?;
        let machines: Vec<Machine> = serde_json::from_str(&response_text).map_err(|e| {
            MaasError::Api(format!(
                "error decoding response body: {} - Response (first 500 chars): {}",
                e,
                response_text.chars().take(500).collect::<String>()
            ))
        })?;
        Ok(machines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_parses_three_parts() {
        let key = ApiKey::parse("consumer:token:secret").unwrap();
        assert_eq!(key.consumer_key, "consumer");
        assert_eq!(key.token_key, "token");
        assert_eq!(key.token_secret, "secret");
    }

    #[test]
    fn api_key_rejects_wrong_shape() {
        assert!(matches!(
            ApiKey::parse("just-a-token"),
            Err(MaasError::Authentication(_))
        ));
        assert!(matches!(
            ApiKey::parse("a:b:c:d"),
            Err(MaasError::Authentication(_))
        ));
    }

    #[test]
    fn auth_header_carries_plaintext_signature() {
        let client = MaasClient::new(
            "http://maas:5240/MAAS/".to_string(),
            "2.0".to_string(),
            "ck:tk:ts",
        )
        .unwrap();
        let header = client.auth_header();
        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_signature_method=\"PLAINTEXT\""));
        assert!(header.contains("oauth_consumer_key=\"ck\""));
        assert!(header.contains("oauth_signature=\"&ts\""));
        // Trailing slash on the base URL is trimmed
        assert_eq!(client.base_url(), "http://maas:5240/MAAS");
    }
}
