//! Command line client for Stellar web authentication.
//!
//! Authenticates an account or a contract against an authentication server
//! and prints the bearer token with its claims as JSON on stdout. Logs go to
//! stderr.
//!
//! Secret seeds are never taken on the command line: each signer names an
//! environment variable that holds an `S…` seed.
//!
//! ```text
//! STELLAR_SECRET=S... stellar-web-auth account --domain testanchor.stellar.org
//! stellar-web-auth contract --config web-auth.toml --address C... --signer-env SIGNER_A
//! ```

mod observability;

use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use observability::{LogFormat, init_observability};
use serde_json::json;
use stellar_web_auth::{
    AuthOptions, BearerToken, ContractWebAuth, WebAuth, WebAuthConfig, WebAuthError,
    error::Result,
    exchange::BodyEncoding,
    keys::Keypair,
    network::Network,
    transport::HttpConfig,
};
use tracing::error;

#[derive(Debug, Parser)]
#[command(name = "stellar-web-auth", version)]
#[command(about = "Authenticate a Stellar address and print the bearer token")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Authenticate a `G…` or `M…` account.
    Account {
        #[command(flatten)]
        common: CommonArgs,

        /// Account to authenticate. Defaults to the first signer's account.
        #[arg(long)]
        address: Option<String>,

        /// Memo id for a shared account.
        #[arg(long)]
        memo: Option<u64>,
    },
    /// Authenticate a `C…` contract.
    Contract {
        #[command(flatten)]
        common: CommonArgs,

        /// Contract to authenticate.
        #[arg(long)]
        address: String,

        /// Signature expiration ledger. Defaults to the RPC server's latest
        /// ledger plus a margin, or the server's value without an RPC server.
        #[arg(long)]
        expiration_ledger: Option<u32>,
    },
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// Home domain whose `stellar.toml` describes the service.
    #[arg(long, conflicts_with = "config", required_unless_present = "config")]
    domain: Option<String>,

    /// TOML configuration file, instead of discovery.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Network: `public`, `testnet`, `futurenet` or a passphrase.
    #[arg(long, env = "STELLAR_NETWORK", default_value = "testnet")]
    network: String,

    /// Environment variables holding the signers' secret seeds.
    #[arg(long = "signer-env", default_value = "STELLAR_SECRET")]
    signer_env: Vec<String>,

    /// Home domain to request, when the server serves several.
    #[arg(long)]
    home_domain: Option<String>,

    /// Client domain asked to attest the client.
    #[arg(long)]
    client_domain: Option<String>,

    /// Signing account of the client domain, if not discovered.
    #[arg(long, requires = "client_domain")]
    client_domain_account: Option<String>,

    /// Environment variable holding the client domain's secret seed.
    #[arg(long, requires = "client_domain")]
    client_domain_secret_env: Option<String>,

    /// Submit the signed challenge as a form instead of JSON.
    #[arg(long)]
    form: bool,

    /// Permit plain-HTTP endpoints, for local servers.
    #[arg(long)]
    allow_http: bool,

    /// Extra request header as `Name: value`.
    #[arg(long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,
}

impl CommonArgs {
    fn http(&self) -> HttpConfig {
        HttpConfig { allow_http: self.allow_http, ..HttpConfig::default() }
    }

    fn network(&self) -> Network {
        match self.network.as_str() {
            "public" => Network::public(),
            "testnet" => Network::testnet(),
            "futurenet" => Network::futurenet(),
            passphrase => Network::new(passphrase),
        }
    }

    fn config(&self) -> Result<Option<WebAuthConfig>> {
        let Some(path) = &self.config else {
            return Ok(None);
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| WebAuthError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config = WebAuthConfig::from_toml(&text)?;
        config.http.allow_http |= self.allow_http;
        Ok(Some(config))
    }

    fn signers(&self) -> Result<Vec<Keypair>> {
        self.signer_env.iter().map(|name| secret_from_env(name)).collect()
    }

    fn options(&self) -> Result<AuthOptions> {
        let client_domain_key =
            self.client_domain_secret_env.as_deref().map(secret_from_env).transpose()?;
        Ok(AuthOptions {
            home_domain: self.home_domain.clone(),
            client_domain: self.client_domain.clone(),
            client_domain_account: self.client_domain_account.clone(),
            client_domain_key,
            headers: self.headers.clone(),
            body_encoding: self.form.then_some(BodyEncoding::Form),
            ..AuthOptions::default()
        })
    }
}

fn parse_header(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, value) =
        raw.split_once(':').ok_or_else(|| format!("expected 'Name: value', got '{raw}'"))?;
    Ok((name.trim().to_owned(), value.trim().to_owned()))
}

fn secret_from_env(name: &str) -> Result<Keypair> {
    let seed = std::env::var(name)
        .map_err(|_| WebAuthError::Config(format!("environment variable {name} is not set")))?;
    Keypair::from_secret_seed(seed.trim())
}

async fn run(command: Command) -> Result<BearerToken> {
    match command {
        Command::Account { common, address, memo } => {
            let signers = common.signers()?;
            let auth = match common.config()? {
                Some(config) => WebAuth::new(&config)?,
                None => {
                    let domain = common.domain.as_deref().unwrap_or_default();
                    WebAuth::from_domain(domain, &common.network(), common.http()).await?
                }
            };
            let client = match address {
                Some(address) => address,
                None => signers
                    .first()
                    .map(|s| s.account_id().to_owned())
                    .ok_or(WebAuthError::EmptySigners)?,
            };
            let options = AuthOptions { memo, ..common.options()? };
            auth.authenticate(&client, &signers, &options).await
        }
        Command::Contract { common, address, expiration_ledger } => {
            let signers = common.signers()?;
            let auth = match common.config()? {
                Some(config) => ContractWebAuth::new(&config)?,
                None => {
                    let domain = common.domain.as_deref().unwrap_or_default();
                    ContractWebAuth::from_domain(domain, &common.network(), common.http()).await?
                }
            };
            let options = AuthOptions {
                signature_expiration_ledger: expiration_ledger,
                ..common.options()?
            };
            auth.authenticate(&address, &signers, &options).await
        }
    }
}

fn render(token: &BearerToken) -> String {
    let claims = token.claims();
    let output = json!({
        "token": token.as_str(),
        "account": claims.account,
        "issuer": claims.issuer,
        "issued_at": claims.issued_at,
        "expires_at": claims.expires_at,
        "client_domain": claims.client_domain,
    });
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| output.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_observability(LogFormat::from_env());
    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(token) => {
            println!("{}", render(&token));
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, stratum = ?e.stratum(), "authentication failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
