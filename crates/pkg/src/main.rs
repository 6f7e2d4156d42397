//! PKG server binary.
//!
//! Terminates plain HTTP; the mutually-authenticated TLS transport in front
//! of it forwards the verified peer certificate per the auth adapter's
//! contract.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sotto_pkg::{Config, RegTokenHandler, Server, SmtpRelay};

#[derive(Parser)]
#[command(name = "sotto-pkg")]
#[command(about = "Private key generator for the sotto identity layer")]
struct Cli {
    /// Path to the user database.
    #[arg(long, default_value = "./pkg-data/db")]
    db_path: PathBuf,

    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8053")]
    listen: SocketAddr,

    /// Path to the PKG's signing-key seed (hex). Generated if missing.
    #[arg(long, default_value = "./pkg-data/signing.key")]
    signing_key: PathBuf,

    /// Coordinator public key (hex), authorized to run rounds.
    #[arg(long)]
    coordinator_key: String,

    /// Registrar public key (hex), authorized to preregister users.
    #[arg(long)]
    registrar_key: String,

    /// SMTP relay address for verification emails.
    #[arg(long, default_value = "127.0.0.1:587")]
    smtp_addr: String,

    /// Sender address on verification emails.
    #[arg(long, default_value = "pkg@localhost")]
    smtp_from: String,

    /// Skip SMTP peer-certificate verification (trusted relay).
    #[arg(long)]
    smtp_skip_verify: bool,

    /// How registration tokens are checked.
    #[arg(long, value_enum, default_value_t = TokenMode::Email)]
    reg_token: TokenMode,
}

#[derive(Clone, Copy, ValueEnum)]
enum TokenMode {
    /// Verify against the token delivered by email.
    Email,
    /// Accept any token (testing only).
    Noop,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let signing_key = load_or_generate_key(&cli.signing_key)?;
    let coordinator_key = parse_key(&cli.coordinator_key).context("bad --coordinator-key")?;
    let registrar_key = parse_key(&cli.registrar_key).context("bad --registrar-key")?;

    let mailer = SmtpRelay::new(&cli.smtp_addr, &cli.smtp_from, cli.smtp_skip_verify)
        .context("configuring SMTP relay")?;
    let token_handler = match cli.reg_token {
        TokenMode::Email => RegTokenHandler::EmailVerified,
        TokenMode::Noop => RegTokenHandler::NoopForTesting,
    };

    let server = Server::new(Config {
        db_path: cli.db_path,
        signing_key,
        coordinator_key,
        registrar_key,
        mailer: Arc::new(mailer),
        token_handler,
    })?;

    info!(
        listen = %cli.listen,
        public_key = %hex::encode(server.public_key()),
        "starting PKG server"
    );

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    axum::serve(listener, Arc::new(server).router()).await?;
    Ok(())
}

fn parse_key(hex_key: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(hex_key)?;
    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("expected 32 bytes of hex"))
}

fn load_or_generate_key(path: &Path) -> Result<SigningKey> {
    if path.exists() {
        let hex_seed = std::fs::read_to_string(path)?;
        let seed = parse_key(hex_seed.trim()).context("bad signing key file")?;
        return Ok(SigningKey::from_bytes(&seed));
    }

    let key = SigningKey::generate(&mut OsRng);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, hex::encode(key.to_bytes()))?;
    info!(path = %path.display(), "generated new signing key");
    Ok(key)
}
