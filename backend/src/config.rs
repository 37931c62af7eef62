use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, PipelineResult, SheetsError, SheetsResult};
use crate::models::{JoinPolicy, SheetNames};
use crate::sheets::{Credentials, ServiceAccountKey, SheetsClient};
use crate::transform::pipeline::PipelineOptions;

const DEFAULT_CACHE_TTL_SECONDS: u64 = 60;
const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
const DEFAULT_SERVER_PORT: u16 = 3000;

#[derive(Clone)]
pub struct Config {
    pub sheet_id: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub access_token: Option<String>,
    pub api_key: Option<String>,
    pub sheet_names: SheetNames,
    pub cache_ttl: Duration,
    pub server_host: String,
    pub server_port: u16,
    pub include_month_order: bool,
    pub join_policy: JoinPolicy,
    pub allow_writes: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = SheetNames::default();

        Ok(Config {
            sheet_id: get("SHEET_ID"),
            credentials_file: get("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
            access_token: get("SHEETS_ACCESS_TOKEN"),
            api_key: get("SHEETS_API_KEY"),
            sheet_names: SheetNames {
                members: get("MEMBERS_SHEET").unwrap_or(defaults.members),
                monthly_collection: get("MONTHLY_COLLECTION_SHEET")
                    .unwrap_or(defaults.monthly_collection),
                disbursement: get("DISBURSEMENT_SHEET").unwrap_or(defaults.disbursement),
                admin_costs: get("ADMIN_COSTS_SHEET").unwrap_or(defaults.admin_costs),
            },
            cache_ttl: Duration::from_secs(parse_or(
                "CACHE_TTL_SECONDS",
                get("CACHE_TTL_SECONDS"),
                DEFAULT_CACHE_TTL_SECONDS,
            )?),
            server_host: get("SERVER_HOST").unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string()),
            server_port: parse_or("SERVER_PORT", get("SERVER_PORT"), DEFAULT_SERVER_PORT)?,
            include_month_order: bool_or("INCLUDE_MONTH_ORDER", get("INCLUDE_MONTH_ORDER"), true)?,
            join_policy: match get("JOIN_POLICY") {
                Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                    key: "JOIN_POLICY".to_string(),
                    value,
                })?,
                None => JoinPolicy::default(),
            },
            allow_writes: bool_or("SHEETS_ALLOW_WRITES", get("SHEETS_ALLOW_WRITES"), false)?,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            include_month_order: self.include_month_order,
            join_policy: self.join_policy,
        }
    }

    /// Credentials in priority order: key file, access token, API key.
    pub fn credentials(&self) -> SheetsResult<Credentials> {
        if let Some(path) = &self.credentials_file {
            return Ok(Credentials::ServiceAccount(ServiceAccountKey::from_file(path)?));
        }
        if let Some(token) = &self.access_token {
            return Ok(Credentials::AccessToken(token.clone()));
        }
        if let Some(key) = &self.api_key {
            return Ok(Credentials::ApiKey(key.clone()));
        }
        Err(SheetsError::MissingCredentials(
            "set GOOGLE_APPLICATION_CREDENTIALS, SHEETS_ACCESS_TOKEN or SHEETS_API_KEY".to_string(),
        ))
    }

    /// Sheets client for the configured spreadsheet.
    pub fn sheets_client(&self) -> PipelineResult<SheetsClient> {
        let sheet_id = self
            .sheet_id
            .clone()
            .ok_or_else(|| ConfigError::Missing("SHEET_ID".to_string()))?;
        let credentials = self.credentials()?;
        tracing::info!(credentials = credentials.kind(), writes = self.allow_writes, "Sheets client configured");
        Ok(SheetsClient::new(sheet_id, credentials).with_writes(self.allow_writes))
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Config")
            .field("sheet_id", &self.sheet_id)
            .field("credentials_file", &self.credentials_file)
            .field("access_token", &redacted(&self.access_token))
            .field("api_key", &redacted(&self.api_key))
            .field("sheet_names", &self.sheet_names)
            .field("cache_ttl", &self.cache_ttl)
            .field("server_addr", &self.server_addr())
            .field("include_month_order", &self.include_month_order)
            .field("join_policy", &self.join_policy)
            .field("allow_writes", &self.allow_writes)
            .finish()
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

fn bool_or(key: &str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key: key.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.sheet_names, SheetNames::default());
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.server_addr(), "0.0.0.0:3000");
        assert!(config.include_month_order);
        assert_eq!(config.join_policy, JoinPolicy::Drop);
        assert!(!config.allow_writes);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("MEMBERS_SHEET", "Roster"),
            ("CACHE_TTL_SECONDS", "300"),
            ("SERVER_PORT", "8080"),
            ("INCLUDE_MONTH_ORDER", "false"),
            ("JOIN_POLICY", "fail"),
            ("SHEETS_ALLOW_WRITES", "yes"),
        ])
        .unwrap();
        assert_eq!(config.sheet_names.members, "Roster");
        assert_eq!(config.sheet_names.disbursement, "03_Disbursement");
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.server_port, 8080);
        assert!(!config.include_month_order);
        assert_eq!(config.join_policy, JoinPolicy::Fail);
        assert!(config.allow_writes);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let err = config(&[("SERVER_PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "SERVER_PORT"));

        let err = config(&[("JOIN_POLICY", "ignore")]).unwrap_err();
        assert!(err.to_string().contains("ignore"));

        assert!(config(&[("SHEETS_ALLOW_WRITES", "maybe")]).is_err());
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let config = config(&[("SHEET_ID", "  "), ("SERVER_PORT", "")]).unwrap();
        assert_eq!(config.sheet_id, None);
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn test_credentials_priority() {
        let cfg = config(&[("SHEETS_API_KEY", "key"), ("SHEETS_ACCESS_TOKEN", "tok")]).unwrap();
        assert!(matches!(cfg.credentials().unwrap(), Credentials::AccessToken(t) if t == "tok"));

        let cfg = config(&[("SHEETS_API_KEY", "key")]).unwrap();
        assert!(matches!(cfg.credentials().unwrap(), Credentials::ApiKey(_)));

        let cfg = config(&[]).unwrap();
        assert!(matches!(cfg.credentials(), Err(SheetsError::MissingCredentials(_))));
    }

    #[test]
    fn test_sheets_client_requires_sheet_id() {
        let cfg = config(&[("SHEETS_API_KEY", "key")]).unwrap();
        assert!(cfg.sheets_client().is_err());

        let cfg = config(&[("SHEETS_API_KEY", "key"), ("SHEET_ID", "abc")]).unwrap();
        assert_eq!(cfg.sheets_client().unwrap().spreadsheet_id(), "abc");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let cfg = config(&[("SHEETS_ACCESS_TOKEN", "ya29.secret")]).unwrap();
        assert!(!format!("{:?}", cfg).contains("ya29"));
    }
}
