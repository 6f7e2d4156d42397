//! Test fixtures: an in-process PKG and a channel-backed mailer.

use std::sync::Arc;

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use tokio::sync::mpsc;

use sotto_pkg::{Config, Mailer, RegTokenHandler, Server};
use sotto_types::token::{verification_email_body, RegToken};
use sotto_types::PublicServerConfig;

/// A verification email captured by the test mailer.
#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub body: String,
}

/// Delivers verification emails onto a channel instead of over SMTP.
pub struct ChannelMailer(mpsc::UnboundedSender<Email>);

#[async_trait]
impl Mailer for ChannelMailer {
    async fn send_verification(
        &self,
        username: &str,
        token: &RegToken,
        pkg_index: u32,
        num_pkgs: u32,
    ) -> anyhow::Result<()> {
        let email = Email {
            to: username.to_string(),
            body: verification_email_body(username, token, pkg_index, num_pkgs),
        };
        self.0.send(email).map_err(|e| anyhow::anyhow!("{e}"))?;
        Ok(())
    }
}

/// A PKG serving real HTTP on an ephemeral localhost port.
pub struct TestPkg {
    pub server: Arc<Server>,
    pub config: PublicServerConfig,
    pub emails: mpsc::UnboundedReceiver<Email>,
    // Dropping the directory tears the store down with the test.
    _db_dir: tempfile::TempDir,
}

/// Boot a PKG authorizing `coordinator_key` for rounds and `registrar_key`
/// for preregistration.
pub async fn launch_pkg(
    coordinator_key: [u8; 32],
    registrar_key: [u8; 32],
    token_handler: RegTokenHandler,
) -> TestPkg {
    let db_dir = tempfile::tempdir().expect("tempdir");
    let (tx, rx) = mpsc::unbounded_channel();

    let server = Arc::new(
        Server::new(Config {
            db_path: db_dir.path().to_path_buf(),
            signing_key: SigningKey::generate(&mut rand::rngs::OsRng),
            coordinator_key,
            registrar_key,
            mailer: Arc::new(ChannelMailer(tx)),
            token_handler,
        })
        .expect("server"),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let router = server.clone().router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });

    let config = PublicServerConfig {
        key: server.public_key(),
        address: format!("http://{addr}"),
    };

    TestPkg {
        server,
        config,
        emails: rx,
        _db_dir: db_dir,
    }
}
