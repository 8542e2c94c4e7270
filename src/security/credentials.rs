//! CredentialProvisioner: assumes a role before terraform runs
//!
//! The exchange is an STS `AssumeRole` call made in-process through the AWS
//! SDK, using whatever base credentials the default provider chain finds.
//! The resulting session credentials are recorded in the `EnvironmentContext`
//! and inherited by every later step.

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_sts::error::DisplayErrorContext;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::environment::EnvironmentContext;
use crate::core::error::PluginError;

/// Session name attached to every assumed-role session
pub const SESSION_NAME: &str = "drone";

/// Lifetime requested for the session credentials, in seconds
pub const SESSION_DURATION_SECS: i32 = 60 * 60;

/// STS region used when neither the environment nor the profile names one
pub const FALLBACK_REGION: &str = "us-east-1";

pub const ACCESS_KEY_ID_VAR: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_ACCESS_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";
pub const SESSION_TOKEN_VAR: &str = "AWS_SESSION_TOKEN";

/// Short-lived credentials for an assumed role
pub struct SessionCredentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: SecretString,
    pub expiration: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

impl SessionCredentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: &str,
        session_token: &str,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::new(secret_access_key.into()),
            session_token: SecretString::new(session_token.into()),
            expiration: None,
        }
    }

    fn from_sts(credentials: &aws_sdk_sts::types::Credentials) -> Self {
        let expiration = credentials.expiration();

        Self {
            expiration: DateTime::from_timestamp(expiration.secs(), expiration.subsec_nanos()),
            ..Self::new(
                credentials.access_key_id(),
                credentials.secret_access_key(),
                credentials.session_token(),
            )
        }
    }

    /// Record the three AWS variables in the run's environment
    pub fn export(&self, ctx: &mut EnvironmentContext) {
        ctx.set(ACCESS_KEY_ID_VAR, self.access_key_id.as_str());
        ctx.set(SECRET_ACCESS_KEY_VAR, self.secret_access_key.expose_secret());
        ctx.set(SESSION_TOKEN_VAR, self.session_token.expose_secret());
    }
}

/// Exchanges a role ARN for session credentials
#[async_trait]
pub trait RoleAssumer: Send + Sync {
    async fn assume_role(&self, role_arn: &str) -> anyhow::Result<SessionCredentials>;
}

/// Assumes roles through AWS STS
#[derive(Debug, Default, Clone, Copy)]
pub struct StsRoleAssumer;

#[async_trait]
impl RoleAssumer for StsRoleAssumer {
    async fn assume_role(&self, role_arn: &str) -> anyhow::Result<SessionCredentials> {
        let region = RegionProviderChain::default_provider().or_else(FALLBACK_REGION);
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .load()
            .await;
        debug!(region = ?config.region(), "loaded AWS configuration");

        let response = aws_sdk_sts::Client::new(&config)
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(SESSION_NAME)
            .duration_seconds(SESSION_DURATION_SECS)
            .send()
            .await
            .map_err(|e| anyhow!("{}", DisplayErrorContext(&e)))?;

        let credentials = response
            .credentials()
            .context("response carried no credentials")?;

        Ok(SessionCredentials::from_sts(credentials))
    }
}

/// Obtains session credentials for a role
pub struct CredentialProvisioner {
    assumer: Arc<dyn RoleAssumer>,
}

impl CredentialProvisioner {
    pub fn new(assumer: Arc<dyn RoleAssumer>) -> Self {
        Self { assumer }
    }

    /// Assume `role_arn` and export the credentials into `ctx`
    ///
    /// An empty or missing role skips the exchange and returns `Ok(false)`.
    pub async fn provision(
        &self,
        role_arn: Option<&str>,
        ctx: &mut EnvironmentContext,
    ) -> Result<bool, PluginError> {
        let Some(role_arn) = role_arn.filter(|r| !r.is_empty()) else {
            return Ok(false);
        };

        let credentials = self
            .assumer
            .assume_role(role_arn)
            .await
            .map_err(|e| PluginError::CredentialExchange {
                role: role_arn.to_string(),
                message: format!("{:#}", e),
            })?;

        credentials.export(ctx);

        match credentials.expiration {
            Some(expiration) => info!(role = role_arn, %expiration, "assumed role"),
            None => info!(role = role_arn, "assumed role"),
        }

        Ok(true)
    }
}
