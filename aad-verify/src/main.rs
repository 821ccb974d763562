use std::io::{self, Read};
use std::process::ExitCode;
use std::time::Duration;

use aad_auth::{AadConfig, TokenVerifier, VerificationOptions};
use anyhow::{bail, Context, Result};
use structopt::StructOpt;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "aad-verify",
    about = "Verify an Azure AD access token against its tenant's published signing keys"
)]
struct Cli {
    /// Token to verify; read from stdin when omitted. A leading "Bearer " is ignored.
    #[structopt(long)]
    token: Option<String>,
    /// Only try keys published under this key id
    #[structopt(long)]
    kid: Option<String>,
    /// Accepted audience (repeatable); audience is not checked when absent
    #[structopt(long = "audience")]
    audiences: Vec<String>,
    /// Timeout in seconds for each discovery request
    #[structopt(long)]
    timeout_secs: Option<u64>,
}

impl Cli {
    fn options(&self) -> VerificationOptions {
        let mut options = VerificationOptions::new();
        if let Some(kid) = &self.kid {
            options = options.with_kid(kid.clone());
        }
        for audience in &self.audiences {
            options = options.with_audience(audience.clone());
        }
        if let Some(seconds) = self.timeout_secs {
            options = options.with_timeout(Duration::from_secs(seconds));
        }
        options
    }
}

fn bare_token(input: &str) -> Result<String> {
    let trimmed = input.trim();
    let token = match trimmed.strip_prefix("Bearer") {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim(),
        _ => trimmed,
    };
    if token.is_empty() {
        bail!("no token supplied");
    }
    Ok(token.to_string())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::from_args();
    let raw = match &cli.token {
        Some(token) => token.clone(),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read token from stdin")?;
            buffer
        }
    };
    let token = bare_token(&raw)?;

    let config = AadConfig::from_env().context("Failed to load AAD_* configuration")?;
    let verifier = TokenVerifier::new(config).context("Failed to build token verifier")?;

    match verifier.verify(&token, Some(&cli.options())).await {
        Ok(claims) => {
            info!(tenant = claims.tenant_id().unwrap_or_default(), "token verified");
            println!("{}", serde_json::to_string_pretty(&claims)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) if err.is_discovery_failure() => {
            error!(error = %err, "could not reach Azure AD to fetch signing keys");
            Ok(ExitCode::from(2))
        }
        Err(err) => {
            warn!(error = %err, "token rejected");
            Ok(ExitCode::from(1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_token_strips_scheme_and_whitespace() {
        assert_eq!(bare_token("  Bearer a.b.c\n").expect("token"), "a.b.c");
        assert_eq!(bare_token("a.b.c").expect("token"), "a.b.c");
    }

    #[test]
    fn bare_token_rejects_empty_input() {
        assert!(bare_token("").is_err());
        assert!(bare_token("Bearer   \n").is_err());
    }

    #[test]
    fn cli_flags_become_verification_options() {
        let cli = Cli::from_iter(vec![
            "aad-verify",
            "--token",
            "a.b.c",
            "--kid",
            "abc",
            "--audience",
            "api://one",
            "--audience",
            "api://two",
            "--timeout-secs",
            "3",
        ]);
        let options = cli.options();
        assert_eq!(options.kid.as_deref(), Some("abc"));
        assert_eq!(options.audience, vec!["api://one", "api://two"]);
        assert_eq!(options.timeout, Some(Duration::from_secs(3)));
        assert_eq!(options.leeway_seconds, None);
    }
}
