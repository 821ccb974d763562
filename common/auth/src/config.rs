use std::env;
use std::time::Duration;

use reqwest::Url;

use crate::error::{AuthError, AuthResult};

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.windows.net";
pub const DEFAULT_ISSUER_HOST: &str = "https://sts.windows.net";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Process-level settings for Azure AD token verification.
#[derive(Debug, Clone)]
pub struct AadConfig {
    /// Host serving tenant OpenID metadata (`{host}/{tid}/.well-known/openid-configuration`).
    pub authority_host: String,
    /// Host prefix of the expected issuer claim (`{host}/{tid}/`).
    pub issuer_host: String,
    /// Default timeout applied to each discovery request.
    pub http_timeout: Duration,
    /// Allowable clock skew in seconds when validating exp/nbf.
    pub leeway_seconds: u64,
}

impl Default for AadConfig {
    fn default() -> Self {
        Self {
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            issuer_host: DEFAULT_ISSUER_HOST.to_string(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            leeway_seconds: 0,
        }
    }
}

impl AadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point discovery at another authority, e.g. a sovereign cloud or a test server.
    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = trim_host(host.into());
        self
    }

    pub fn with_issuer_host(mut self, host: impl Into<String>) -> Self {
        self.issuer_host = trim_host(host.into());
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    /// Issuer Azure AD stamps on v1 access tokens for `tenant_id`.
    pub fn expected_issuer(&self, tenant_id: &str) -> String {
        format!("{}/{}/", self.issuer_host, tenant_id)
    }

    /// Load overrides from `AAD_*` environment variables on top of the defaults.
    pub fn from_env() -> AuthResult<Self> {
        let mut config = Self::default();

        if let Some(host) = non_empty_env("AAD_AUTHORITY_HOST") {
            config.authority_host = parse_host("AAD_AUTHORITY_HOST", &host)?;
        }
        if let Some(host) = non_empty_env("AAD_ISSUER_HOST") {
            config.issuer_host = parse_host("AAD_ISSUER_HOST", &host)?;
        }
        if let Some(value) = non_empty_env("AAD_HTTP_TIMEOUT_SECS") {
            let seconds = parse_seconds("AAD_HTTP_TIMEOUT_SECS", &value)?;
            if seconds == 0 {
                return Err(AuthError::Config(
                    "AAD_HTTP_TIMEOUT_SECS must be greater than zero".to_string(),
                ));
            }
            config.http_timeout = Duration::from_secs(seconds);
        }
        if let Some(value) = non_empty_env("AAD_CLOCK_LEEWAY_SECS") {
            config.leeway_seconds = parse_seconds("AAD_CLOCK_LEEWAY_SECS", &value)?;
        }

        Ok(config)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_host(key: &str, value: &str) -> AuthResult<String> {
    let url = Url::parse(value)
        .map_err(|err| AuthError::Config(format!("{key} '{value}' is not a URL: {err}")))?;
    if !matches!(url.scheme(), "https" | "http") {
        return Err(AuthError::Config(format!(
            "{key} '{value}' must use http or https"
        )));
    }
    Ok(trim_host(value.to_string()))
}

fn parse_seconds(key: &str, value: &str) -> AuthResult<u64> {
    value
        .parse::<u64>()
        .map_err(|err| AuthError::Config(format!("{key} '{value}' is not a number: {err}")))
}

fn trim_host(host: String) -> String {
    host.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_issuer_uses_sts_host() {
        let config = AadConfig::new();
        assert_eq!(
            config.expected_issuer("11111111-1111-1111-1111-111111111111"),
            "https://sts.windows.net/11111111-1111-1111-1111-111111111111/"
        );
    }

    #[test]
    fn builder_trims_trailing_slashes() {
        let config = AadConfig::new()
            .with_authority_host("http://127.0.0.1:8080/")
            .with_issuer_host("https://issuer.example//");
        assert_eq!(config.authority_host, "http://127.0.0.1:8080");
        assert_eq!(config.expected_issuer("t"), "https://issuer.example/t/");
    }

    #[test]
    fn parse_host_rejects_non_http_schemes() {
        assert!(parse_host("KEY", "https://login.microsoftonline.us").is_ok());
        assert!(matches!(
            parse_host("KEY", "ftp://login.example"),
            Err(AuthError::Config(_))
        ));
        assert!(matches!(
            parse_host("KEY", "login.example"),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn parse_seconds_reports_key() {
        assert_eq!(parse_seconds("KEY", "30").expect("parse"), 30);
        let err = parse_seconds("AAD_CLOCK_LEEWAY_SECS", "soon").expect_err("should fail");
        assert!(err.to_string().contains("AAD_CLOCK_LEEWAY_SECS"));
    }

    #[test]
    fn from_env_reads_overrides() {
        std::env::set_var("AAD_AUTHORITY_HOST", "http://localhost:9999/");
        std::env::set_var("AAD_CLOCK_LEEWAY_SECS", "45");
        let config = AadConfig::from_env().expect("config");
        std::env::remove_var("AAD_AUTHORITY_HOST");
        std::env::remove_var("AAD_CLOCK_LEEWAY_SECS");

        assert_eq!(config.authority_host, "http://localhost:9999");
        assert_eq!(config.leeway_seconds, 45);
        assert_eq!(config.issuer_host, DEFAULT_ISSUER_HOST);
        assert_eq!(config.http_timeout, DEFAULT_HTTP_TIMEOUT);
    }
}
