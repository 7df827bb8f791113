use std::env;
use std::string::String;

use aws_sdk_secretsmanager::operation::get_secret_value::GetSecretValueError;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use tracing::info;

use crate::auth::ServiceAccountKey;

const DEFAULT_REGION: &str = "us";
const DEFAULT_BATCH_MAX_SIZE: usize = 950_000;
const DEFAULT_REQUEST_TIMEOUT: u64 = 30;
const SECRETS_MANAGER_ARN_PREFIX: &str = "arn:aws:secretsmanager:";

pub struct Config {
    pub data_type: String,
    pub customer_id: String,
    pub service_account: String,
    pub secret_version: Option<String>,
    pub region: String,
    pub endpoint: String,
    pub namespace: Option<String>,
    pub batch_max_size: usize,
    pub request_timeout: u64,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{var} not set")]
    Missing { var: &'static str },
    #[error("invalid value for {var} - {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error(transparent)]
    Secret(#[from] KeySourceError),
}

impl Config {
    pub fn load_from_env() -> Result<Config, ConfigError> {
        let region = env::var("CHRONICLE_REGION")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_REGION.to_string());

        let conf = Config {
            data_type: required("CHRONICLE_DATA_TYPE")?,
            customer_id: required("CHRONICLE_CUSTOMER_ID")?,
            service_account: required("CHRONICLE_SERVICE_ACCOUNT")?,
            secret_version: env::var("SECRET_VERSION").ok().filter(|s| !s.trim().is_empty()),
            endpoint: env::var("CHRONICLE_ENDPOINT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| endpoint_for_region(&region)),
            region,
            namespace: env::var("CHRONICLE_NAMESPACE").ok().filter(|s| !s.trim().is_empty()),
            batch_max_size: env::var("BATCH_MAX_SIZE")
                .unwrap_or(DEFAULT_BATCH_MAX_SIZE.to_string())
                .parse::<usize>()
                .map_err(|e| ConfigError::Invalid {
                    var: "BATCH_MAX_SIZE",
                    reason: format!("error parsing to usize - {}", e),
                })?,
            request_timeout: env::var("REQUEST_TIMEOUT")
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT.to_string())
                .parse::<u64>()
                .map_err(|e| ConfigError::Invalid {
                    var: "REQUEST_TIMEOUT",
                    reason: format!("error parsing to u64 - {}", e),
                })?,
        };

        if conf.batch_max_size == 0 {
            return Err(ConfigError::Invalid {
                var: "BATCH_MAX_SIZE",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(conf)
    }

    /// Whether the service account setting points at Secrets Manager rather than
    /// holding the key JSON inline.
    pub fn service_account_is_secret_arn(&self) -> bool {
        self.service_account.starts_with(SECRETS_MANAGER_ARN_PREFIX)
    }

    /// Replaces a Secrets Manager ARN in `service_account` with the secret's
    /// value. Inline key JSON is left untouched.
    pub async fn resolve_service_account(
        &mut self,
        secretsmanager: &SecretsManagerClient,
    ) -> Result<(), ConfigError> {
        if !self.service_account_is_secret_arn() {
            return Ok(());
        }

        info!("Fetching service account from Secrets Manager");
        self.service_account = get_service_account_from_secrets_manager(
            secretsmanager,
            self.service_account.clone(),
            self.secret_version.clone(),
        )
        .await?;
        Ok(())
    }

    pub fn service_account_key(&self) -> Result<ServiceAccountKey, ConfigError> {
        ServiceAccountKey::from_json(&self.service_account).map_err(|e| ConfigError::Invalid {
            var: "CHRONICLE_SERVICE_ACCOUNT",
            reason: e.to_string(),
        })
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    env::var(var)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .ok_or(ConfigError::Missing { var })
}

pub fn endpoint_for_region(region: &str) -> String {
    if region == DEFAULT_REGION {
        "https://malachiteingestion-pa.googleapis.com".to_string()
    } else {
        format!("https://{}-malachiteingestion-pa.googleapis.com", region)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum KeySourceError {
    #[error("Failed to access AWS Secrets Manager. Please make sure the lambda function has permissions to access the {secret_id} secret. Error: {error:?}")]
    FailedToAccessSecretsManager {
        secret_id: String,
        error: GetSecretValueError,
    },
    #[error("Didn't find the {secret_id} secret in AWS secretsmanager")]
    MissingSecret { secret_id: String },
}

pub async fn get_service_account_from_secrets_manager(
    secretsmanager: &SecretsManagerClient,
    secret_id: String,
    version_id: Option<String>,
) -> Result<String, KeySourceError> {
    let response = secretsmanager
        .get_secret_value()
        .set_secret_id(Some(secret_id.clone()))
        .set_version_id(version_id)
        .send()
        .await
        .map_err(|error| KeySourceError::FailedToAccessSecretsManager {
            secret_id: secret_id.clone(),
            error: error.into_service_error(),
        })?;
    response
        .secret_string
        .ok_or(KeySourceError::MissingSecret { secret_id })
}
