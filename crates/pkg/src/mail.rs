//! The SMTP relay that delivers verification emails.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use sotto_types::token::{verification_email_body, RegToken};

/// Anything that can deliver a verification token to a username.
///
/// The production implementation is [`SmtpRelay`]; tests observe deliveries
/// through a channel-backed implementation instead of running an SMTP
/// server.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(
        &self,
        username: &str,
        token: &RegToken,
        pkg_index: u32,
        num_pkgs: u32,
    ) -> anyhow::Result<()>;
}

/// An SMTP relay, assumed colocated or otherwise trusted.
pub struct SmtpRelay {
    from: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpRelay {
    /// Connect settings for a relay at `addr` (`host:port`).
    ///
    /// `skip_verify` disables peer-certificate verification; the relay is
    /// typically addressed by IP on a trusted network where its certificate
    /// cannot match.
    pub fn new(addr: &str, from: &str, skip_verify: bool) -> anyhow::Result<Self> {
        let (host, port) = match addr.rsplit_once(':') {
            Some((host, port)) => (host.to_string(), port.parse::<u16>()?),
            // Default to the mail submission port.
            None => (addr.to_string(), 587),
        };

        let tls = TlsParameters::builder(host.clone())
            .dangerous_accept_invalid_certs(skip_verify)
            .build()?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .tls(Tls::Required(tls))
            .build();

        Ok(Self {
            from: from.to_string(),
            transport,
        })
    }
}

#[async_trait]
impl Mailer for SmtpRelay {
    async fn send_verification(
        &self,
        username: &str,
        token: &RegToken,
        pkg_index: u32,
        num_pkgs: u32,
    ) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.from.parse()?)
            .to(username.parse()?)
            .subject("Verify your address")
            .header(ContentType::TEXT_PLAIN)
            .body(verification_email_body(username, token, pkg_index, num_pkgs))?;

        self.transport.send(email).await?;
        info!(username, "sent verification email");
        Ok(())
    }
}
