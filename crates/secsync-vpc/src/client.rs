//! VPC REST API client
//!
//! Every response is wrapped in a `{success, result, errors}` envelope.
//! Authentication is a Bearer token.

use crate::config::VpcConfig;
use crate::error::{Result, VpcError};
use reqwest::{Method, RequestBuilder, StatusCode};
use secsync::{NewProviderRule, NewSecurityGroup, ProviderRule, SecurityGroupSnapshot};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};

const REGION_HEADER: &str = "X-Region";

/// Client for the security group endpoints of a VPC API
pub struct VpcClient {
    client: reqwest::Client,
    config: VpcConfig,
}

impl VpcClient {
    pub fn new(config: VpcConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(VpcConfig::from_env()?)
    }

    pub fn config(&self) -> &VpcConfig {
        &self.config
    }

    /// Fetch a security group, `None` if it does not exist
    pub async fn get_security_group(
        &self,
        group_id: &str,
    ) -> Result<Option<SecurityGroupSnapshot>> {
        let path = format!("security-groups/{}", group_id);
        match self.execute(self.request(Method::GET, &path)).await {
            Ok(group) => Ok(group),
            Err(VpcError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create_security_group(
        &self,
        group: &NewSecurityGroup,
    ) -> Result<SecurityGroupSnapshot> {
        let request = self.request(Method::POST, "security-groups").json(group);
        self.execute(request).await?.ok_or_else(|| {
            VpcError::ApiError("create security group returned no group".to_string())
        })
    }

    pub async fn list_rules(&self, group_id: &str) -> Result<Vec<ProviderRule>> {
        let path = format!("security-groups/{}/rules", group_id);
        let rules: Vec<ProviderRule> = match self.execute(self.request(Method::GET, &path)).await {
            Ok(rules) => rules.unwrap_or_default(),
            Err(VpcError::NotFound(_)) => return Err(VpcError::GroupNotFound(group_id.into())),
            Err(e) => return Err(e),
        };

        Ok(rules
            .into_iter()
            .map(|mut rule| {
                if rule.group_id.is_empty() {
                    rule.group_id = group_id.to_string();
                }
                rule
            })
            .collect())
    }

    pub async fn create_rules(&self, group_id: &str, rules: &[NewProviderRule]) -> Result<()> {
        let path = format!("security-groups/{}/rules", group_id);
        let request = self
            .request(Method::POST, &path)
            .json(&CreateRulesRequest { rules });
        match self.execute::<IgnoredAny>(request).await {
            Ok(_) => Ok(()),
            Err(VpcError::NotFound(_)) => Err(VpcError::GroupNotFound(group_id.into())),
            Err(e) => Err(e),
        }
    }

    pub async fn delete_rules(&self, rule_ids: &[String]) -> Result<()> {
        let request = self
            .request(Method::POST, "security-group-rules/batch-delete")
            .json(&BatchDeleteRequest { rule_ids });
        self.execute::<IgnoredAny>(request).await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.config.url(path);
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.config.api_token);
        if let Some(region) = &self.config.region {
            request = request.header(REGION_HEADER, region);
        }
        request
    }

    /// Send a request and unwrap the response envelope
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().to_string();

        if status == StatusCode::NOT_FOUND {
            return Err(VpcError::NotFound(url));
        }

        let body = response.text().await?;
        let envelope: ApiResponse<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(VpcError::ApiError(format!("HTTP {} from {}", status, url)));
            }
            Err(e) => return Err(e.into()),
        };

        if !status.is_success() || !envelope.success {
            return Err(VpcError::ApiError(envelope.error_message(status)));
        }
        Ok(envelope.result)
    }
}

// ============ API Types ============

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    result: Option<T>,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

impl<T> ApiResponse<T> {
    fn error_message(&self, status: StatusCode) -> String {
        self.errors
            .first()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| format!("Unknown error (HTTP {})", status))
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[allow(dead_code)]
    #[serde(default)]
    code: i32,
    message: String,
}

#[derive(Debug, Serialize)]
struct CreateRulesRequest<'a> {
    rules: &'a [NewProviderRule],
}

#[derive(Debug, Serialize)]
struct BatchDeleteRequest<'a> {
    rule_ids: &'a [String],
}
