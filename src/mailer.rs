use crate::settings::Settings;
use crate::types::{DigestError, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::AsyncSmtpTransport;
use lettre::{Address, AsyncTransport, Tokio1Executor};
use tracing::info;

/// Sends the rendered digest through the configured SMTP-over-TLS relay.
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn new(settings: &Settings) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)
            .map_err(|err| {
                DigestError::Config(format!("invalid SMTP host {}: {err}", settings.smtp_host))
            })?
            .port(settings.smtp_port)
            .credentials(Credentials::new(
                settings.smtp_user.clone(),
                settings.smtp_pass.clone(),
            ))
            .build();

        let address: Address = settings.sender_address.parse().map_err(|err| {
            DigestError::Config(format!(
                "invalid sender address {}: {err}",
                settings.sender_address
            ))
        })?;
        let from = Mailbox::new(Some(settings.sender_name.clone()), address);

        Ok(Self { transport, from })
    }

    /// Send one HTML message to every recipient in a single session. Any
    /// transport failure is wrapped into a `Delivery` error; there is no
    /// partial retry.
    pub async fn send(&self, html_body: &str, subject: &str, recipients: &[String]) -> Result<usize> {
        if recipients.is_empty() {
            return Err(DigestError::Delivery("recipient list is empty".into()));
        }

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(subject)
            .header(header::ContentType::TEXT_HTML);
        for recipient in recipients {
            let mailbox: Mailbox = recipient.parse().map_err(|err| {
                DigestError::Delivery(format!("invalid recipient {recipient}: {err}"))
            })?;
            builder = builder.to(mailbox);
        }

        let message = builder
            .body(html_body.to_string())
            .map_err(|err| DigestError::Delivery(format!("failed to build message: {err}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|err| DigestError::Delivery(err.to_string()))?;

        info!("delivered digest to {} recipients", recipients.len());
        Ok(recipients.len())
    }
}
