//! Configuration management for spoint.
//!
//! This module handles loading configuration from environment variables,
//! with validation to ensure required values are present. Every client is
//! built from its own [`Config`] value; nothing here is process-global.

use std::env;
use std::time::Duration;

use crate::error::SpError;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default interval between background digest refreshes (19 minutes).
pub const DEFAULT_DIGEST_REFRESH_MS: u64 = 19 * 60 * 1000;

/// Artificial delay applied to stubbed profile lookups in development mode.
pub const DEFAULT_DEV_LOAD_DELAY_MS: u64 = 1000;

/// Configuration for a SharePoint client.
///
/// Cookie and access token values are stored but never logged or exposed in
/// error messages.
#[derive(Clone)]
pub struct Config {
    /// URL of the site the client acts for (e.g.
    /// `https://contoso.sharepoint.com/sites/Team/SitePages/Home.aspx`).
    /// Matched against `production_hosts` to pick the environment.
    pub site_url: String,

    /// Explicit API root. Inferred from `site_url` when absent.
    pub base_url: Option<String>,

    /// Host names that mark `site_url` as production.
    pub production_hosts: Vec<String>,

    /// Raw `Cookie` header value sent with credentialed requests.
    cookie: Option<String>,

    /// Bearer token sent with credentialed requests.
    access_token: Option<String>,

    /// Default `$select` for people profile lookups.
    pub profile_default_select: String,

    /// Default `$select` for the current user's profile.
    pub my_profile_default_select: String,

    /// Path prefix of the list collection, relative to the base URL.
    pub list_path: String,

    /// Endpoint prefix for the current user's properties.
    pub current_user_properties_prefix: String,

    /// Endpoint prefix for profile lookups by account name.
    pub people_manager_url: String,

    /// Endpoint prefix for site user lookups by login name.
    pub site_user_prefix: String,

    /// Path of the ensure-user endpoint, relative to the base URL.
    pub ensure_user_path: String,

    /// Prefix that turns an email address into a claims account name.
    pub account_name_prefix: String,

    /// Path of the send-email endpoint, relative to the base URL.
    pub send_email_path: String,

    /// Interval between background digest refreshes.
    pub digest_refresh_interval: Duration,

    /// Delay applied to stubbed profile lookups in development mode.
    pub dev_load_delay: Duration,

    /// Log development-mode activity at info level instead of debug.
    pub log_dev_activity: bool,

    /// HTTP request timeout.
    pub timeout: Duration,
}

impl Config {
    /// Creates a configuration for `site_url` with every other setting at
    /// its default. No production hosts are configured, so the client runs
    /// in development mode until some are added.
    pub fn new(site_url: impl Into<String>) -> Self {
        Config {
            site_url: site_url.into(),
            base_url: None,
            production_hosts: Vec::new(),
            cookie: None,
            access_token: None,
            profile_default_select:
                "AccountName,DisplayName,Email,PictureUrl,PersonalUrl,Title,UserProfileProperties"
                    .to_string(),
            my_profile_default_select: "DisplayName,AccountName,Email,PictureUrl,PersonalUrl,Title"
                .to_string(),
            list_path: "_api/Web/Lists/".to_string(),
            current_user_properties_prefix:
                "/_api/sp.userprofiles.peoplemanager/getmyproperties/?$select=".to_string(),
            people_manager_url:
                "/_api/sp.userprofiles.peoplemanager/GetPropertiesFor(accountName=@v)?@v="
                    .to_string(),
            site_user_prefix: "_api/web/siteusers(@v)?@v='".to_string(),
            ensure_user_path: "_api/web/ensureuser".to_string(),
            account_name_prefix: "i:0#.f|membership|".to_string(),
            send_email_path: "_api/SP.Utilities.Utility.SendEmail".to_string(),
            digest_refresh_interval: Duration::from_millis(DEFAULT_DIGEST_REFRESH_MS),
            dev_load_delay: Duration::from_millis(DEFAULT_DEV_LOAD_DELAY_MS),
            log_dev_activity: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Sets an explicit base URL (absolute, or site-relative like `/sites/Team/`).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Adds a host name that marks the site as production.
    pub fn with_production_host(mut self, host: impl Into<String>) -> Self {
        self.production_hosts.push(host.into());
        self
    }

    /// Sets the `Cookie` header sent with credentialed requests.
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    /// Sets the bearer token sent with credentialed requests.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets the development-mode profile stub delay.
    pub fn with_dev_load_delay(mut self, delay: Duration) -> Self {
        self.dev_load_delay = delay;
        self
    }

    /// Returns the configured cookie header, if any.
    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    /// Returns the configured bearer token, if any.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Returns every configured secret, for error message sanitization only.
    pub fn secrets(&self) -> Vec<String> {
        self.cookie
            .iter()
            .chain(self.access_token.iter())
            .cloned()
            .collect()
    }

    /// Loads configuration from environment variables.
    ///
    /// # Required Environment Variables
    ///
    /// - `SP_SITE_URL`: URL of the SharePoint site
    ///
    /// Every other `SP_*` variable is optional and overrides one default.
    ///
    /// # Errors
    ///
    /// Returns `SpError::Config` if a required variable is missing or a value
    /// fails validation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// dotenvy::dotenv().ok();
    /// let config = Config::from_env()?;
    /// ```
    pub fn from_env() -> Result<Self, SpError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    fn from_lookup<F>(lookup: F) -> Result<Self, SpError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let site_url = get("SP_SITE_URL").ok_or_else(|| SpError::missing_env("SP_SITE_URL"))?;
        let mut config = Config::new(Self::validate_site_url(site_url)?);

        config.base_url = get("SP_BASE_URL");
        if let Some(hosts) = get("SP_PRODUCTION_HOSTS") {
            config.production_hosts = Self::parse_hosts(&hosts);
        }

        if let Some(cookie) = get("SP_COOKIE") {
            Self::validate_secret("SP_COOKIE", &cookie)?;
            config.cookie = Some(cookie);
        }
        if let Some(token) = get("SP_ACCESS_TOKEN") {
            Self::validate_secret("SP_ACCESS_TOKEN", &token)?;
            config.access_token = Some(token);
        }

        let overrides: [(&str, &mut String); 9] = [
            ("SP_PROFILE_SELECT", &mut config.profile_default_select),
            ("SP_MY_PROFILE_SELECT", &mut config.my_profile_default_select),
            ("SP_LIST_PATH", &mut config.list_path),
            (
                "SP_CURRENT_USER_PROPERTIES_PREFIX",
                &mut config.current_user_properties_prefix,
            ),
            ("SP_PEOPLE_MANAGER_URL", &mut config.people_manager_url),
            ("SP_SITE_USER_PREFIX", &mut config.site_user_prefix),
            ("SP_ENSURE_USER_PATH", &mut config.ensure_user_path),
            ("SP_ACCOUNT_NAME_PREFIX", &mut config.account_name_prefix),
            ("SP_SEND_EMAIL_PATH", &mut config.send_email_path),
        ];
        for (name, slot) in overrides {
            if let Some(value) = get(name) {
                *slot = value;
            }
        }

        if let Some(ms) = get("SP_DIGEST_REFRESH_MS") {
            let ms = Self::parse_u64("SP_DIGEST_REFRESH_MS", &ms)?;
            if ms == 0 {
                return Err(SpError::invalid_config(
                    "SP_DIGEST_REFRESH_MS must be greater than zero",
                ));
            }
            config.digest_refresh_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = get("SP_DEV_LOAD_DELAY_MS") {
            config.dev_load_delay = Duration::from_millis(Self::parse_u64("SP_DEV_LOAD_DELAY_MS", &ms)?);
        }
        if let Some(secs) = get("SP_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(Self::parse_u64("SP_TIMEOUT_SECS", &secs)?);
        }
        if let Some(flag) = get("SP_LOG_DEV_ACTIVITY") {
            config.log_dev_activity = Self::parse_bool("SP_LOG_DEV_ACTIVITY", &flag)?;
        }

        Ok(config)
    }

    /// Validates the site URL scheme.
    fn validate_site_url(url: String) -> Result<String, SpError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(SpError::invalid_config(
                "SP_SITE_URL must start with http:// or https://",
            ));
        }
        Ok(url)
    }

    /// Splits a comma-separated host list, dropping blanks.
    fn parse_hosts(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn parse_u64(name: &str, value: &str) -> Result<u64, SpError> {
        value
            .parse::<u64>()
            .map_err(|_| SpError::invalid_config(format!("{} must be a whole number", name)))
    }

    fn parse_bool(name: &str, value: &str) -> Result<bool, SpError> {
        match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(SpError::invalid_config(format!(
                "{} must be true or false",
                name
            ))),
        }
    }

    /// Rejects placeholder credential values.
    fn validate_secret(name: &str, value: &str) -> Result<(), SpError> {
        let lower = value.to_lowercase();
        let placeholder_patterns = ["your_cookie", "your_token", "placeholder", "xxx", "changeme"];

        for pattern in placeholder_patterns {
            if lower.contains(pattern) {
                return Err(SpError::invalid_config(format!(
                    "{} appears to be a placeholder value",
                    name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_from_lookup_requires_site_url() {
        let result = Config::from_lookup(lookup(&[]));
        assert!(matches!(result, Err(SpError::Config(msg)) if msg.contains("SP_SITE_URL")));
    }

    #[test]
    fn test_from_lookup_requires_scheme() {
        let result = Config::from_lookup(lookup(&[("SP_SITE_URL", "contoso.sharepoint.com")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config =
            Config::from_lookup(lookup(&[("SP_SITE_URL", "https://contoso.sharepoint.com/sites/a/")]))
                .unwrap();
        assert!(config.production_hosts.is_empty());
        assert_eq!(config.list_path, "_api/Web/Lists/");
        assert_eq!(config.account_name_prefix, "i:0#.f|membership|");
        assert_eq!(
            config.digest_refresh_interval,
            Duration::from_millis(19 * 60 * 1000)
        );
        assert!(config.log_dev_activity);
        assert!(config.secrets().is_empty());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("SP_SITE_URL", "https://contoso.sharepoint.com/"),
            ("SP_PRODUCTION_HOSTS", " contoso.sharepoint.com, ,fabrikam.com "),
            ("SP_LIST_PATH", "_api/web/lists/"),
            ("SP_DIGEST_REFRESH_MS", "60000"),
            ("SP_LOG_DEV_ACTIVITY", "false"),
            ("SP_COOKIE", "FedAuth=abc"),
        ]))
        .unwrap();
        assert_eq!(
            config.production_hosts,
            vec!["contoso.sharepoint.com", "fabrikam.com"]
        );
        assert_eq!(config.list_path, "_api/web/lists/");
        assert_eq!(config.digest_refresh_interval, Duration::from_secs(60));
        assert!(!config.log_dev_activity);
        assert_eq!(config.cookie(), Some("FedAuth=abc"));
        assert_eq!(config.secrets(), vec!["FedAuth=abc".to_string()]);
    }

    #[test]
    fn test_from_lookup_rejects_zero_refresh() {
        let result = Config::from_lookup(lookup(&[
            ("SP_SITE_URL", "https://contoso.sharepoint.com/"),
            ("SP_DIGEST_REFRESH_MS", "0"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_lookup_rejects_bad_number() {
        let result = Config::from_lookup(lookup(&[
            ("SP_SITE_URL", "https://contoso.sharepoint.com/"),
            ("SP_TIMEOUT_SECS", "soon"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_rejects_placeholder() {
        assert!(Config::validate_secret("SP_ACCESS_TOKEN", "your_token_here").is_err());
        assert!(Config::validate_secret("SP_ACCESS_TOKEN", "eyJ0eXAiOiJKV1Qi").is_ok());
    }
}
