use failure::Error;
use lettre::{
    sendmail::SendmailTransport,
    smtp::{
        ClientSecurity,
        SmtpClient,
        authentication::Credentials,
        client::net::ClientTlsParameters,
    },
};
use lettre_email::{EmailBuilder, Mailbox};
use native_tls::TlsConnector;

use super::config::{Config, SmtpConfig, Transports, UseTls};

pub fn from_config(config: &Config) -> Result<Box<dyn Transport>, Error> {
    Ok(match config.transport {
        Transports::Log => Box::new(Logger),
        Transports::Sendmail => Box::new(
            Lettre::new(config, SendmailTransport::new())),
        Transports::Smtp(ref smtp) => Box::new(
            Lettre::new(config, smtp_client(smtp)?.transport())),
    })
}

fn smtp_client(config: &SmtpConfig) -> Result<SmtpClient, Error> {
    let security = match config.use_tls {
        UseTls::No => ClientSecurity::None,
        UseTls::Yes => ClientSecurity::Opportunistic(tls_parameters(config)?),
        UseTls::Strict => ClientSecurity::Required(tls_parameters(config)?),
    };

    let mut client = SmtpClient::new(
        (config.host.as_str(), config.port()), security)?;

    if let (Some(user), Some(password)) = (&config.username, &config.password) {
        client = client.credentials(
            Credentials::new(user.clone(), password.clone()));
    }

    Ok(client)
}

fn tls_parameters(config: &SmtpConfig) -> Result<ClientTlsParameters, Error> {
    let connector = TlsConnector::new()?;
    Ok(ClientTlsParameters::new(config.host.clone(), connector))
}

pub struct Message {
    pub to: Mailbox,
    /// Address to which replies should go, if not the sender.
    pub reply_to: Option<Mailbox>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// An object-safe version of [`lettre::Transport`].
pub trait Transport {
    fn send(&mut self, message: Message) -> Result<(), Error>;
}

impl Message {
    pub fn into_lettre(self) -> EmailBuilder {
        let builder = EmailBuilder::new()
            .to(self.to)
            .subject(self.subject)
            .alternative(self.html, self.text);

        match self.reply_to {
            Some(reply_to) => builder.reply_to(reply_to),
            None => builder,
        }
    }
}

/// Mail transport which does nothing except logging sent messages.
struct Logger;

impl Transport for Logger {
    fn send(&mut self, message: Message) -> Result<(), Error> {
        info!("Message:\nTo: {}\nSubject: {}\n\n{}",
            message.to, message.subject, message.text);
        Ok(())
    }
}

/// Type implementing [`Transport`] for a wrapped [`lettre::Transport`].
struct Lettre<T> {
    sender: Mailbox,
    transport: T,
}

impl<T> Lettre<T> {
    fn new(config: &Config, inner: T) -> Self {
        Self {
            sender: config.sender.clone(),
            transport: inner,
        }
    }
}

impl<T, R, E> Transport for Lettre<T>
where
    T: for<'a> lettre::Transport<'a, Result = Result<R, E>>,
    Error: From<E>,
{
    fn send(&mut self, message: Message) -> Result<(), Error> {
        let mail = message.into_lettre()
            .from(self.sender.clone())
            .build()?
            .into();

        self.transport.send(mail)?;
        Ok(())
    }
}

/// Transport used when no other can be configured.
pub fn fallback() -> Box<dyn Transport> {
    Box::new(Logger)
}
