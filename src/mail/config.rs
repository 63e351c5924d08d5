use lettre_email::Mailbox;
use serde::{Deserialize, Deserializer, de};
use std::fmt;

/// Port used for SMTP submission unless configured otherwise.
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Mail system configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Email address to send messages as.
    #[serde(default = "default_sender", deserialize_with = "de_mailbox")]
    pub sender: Mailbox,
    /// Transport method to use, and its configuration.
    #[serde(flatten)]
    pub transport: Transports,
}

impl Config {
    /// Override configuration with `EMAIL_*` variables.
    ///
    /// `EMAIL_BACKEND` selects the transport. Both short names (`console`,
    /// `smtp`, `sendmail`) and Django-style backend paths are understood.
    pub fn apply_env(&mut self, var: &dyn Fn(&str) -> Option<String>) {
        if let Some(backend) = var("EMAIL_BACKEND") {
            let backend = backend.to_lowercase();

            if backend.contains("smtp") {
                if let Transports::Log | Transports::Sendmail = self.transport {
                    self.transport = Transports::Smtp(SmtpConfig::default());
                }
            } else if backend.contains("sendmail") {
                self.transport = Transports::Sendmail;
            } else if backend.contains("console") || backend == "log" {
                self.transport = Transports::Log;
            } else {
                warn!("Unknown EMAIL_BACKEND {:?}, keeping configured transport",
                    backend);
            }
        }

        if let Transports::Smtp(ref mut smtp) = self.transport {
            if let Some(host) = var("EMAIL_HOST") {
                smtp.host = host;
            }
            if let Some(user) = var("EMAIL_HOST_USER") {
                smtp.username = Some(user);
            }
            if let Some(password) = var("EMAIL_HOST_PASSWORD") {
                smtp.password = Some(password);
            }
        }
    }

    /// Validate configuration correctness.
    pub fn validate(&self) -> Result<(), failure::Error> {
        if let Transports::Smtp(ref smtp) = self.transport {
            if smtp.host.is_empty() {
                return Err(format_err!("EMAIL_HOST must be set when using SMTP"));
            }
            if smtp.username.is_some() != smtp.password.is_some() {
                return Err(format_err!(
                    "EMAIL_HOST_USER and EMAIL_HOST_PASSWORD must be set together"));
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sender: default_sender(),
            transport: Transports::Log,
        }
    }
}

/// Mail transport configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum Transports {
    /// Log messages instead of sending them.
    Log,
    /// Use the `sendmail(1)` command.
    Sendmail,
    /// Use SMTP.
    Smtp(SmtpConfig),
}

/// SMTP configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SmtpConfig {
    /// The host name to connect to.
    pub host: String,
    /// The port to connect to.
    #[serde(default)]
    pub port: Option<u16>,
    /// Should we force TLS?
    #[serde(default)]
    pub use_tls: UseTls,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl SmtpConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_SMTP_PORT)
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        SmtpConfig {
            host: "localhost".to_string(),
            port: None,
            use_tls: UseTls::Yes,
            username: None,
            password: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UseTls {
    /// Do not use TLS.
    No,
    /// Try to use TLS (STARTTLS) and fall back to unencrypted if TLS is
    /// not supported.
    Yes,
    /// Always use TLS.
    Strict,
}

impl Default for UseTls {
    fn default() -> Self {
        UseTls::Yes
    }
}

impl<'de> Deserialize<'de> for UseTls {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        de.deserialize_any(UseTlsVisitor)
    }
}

struct UseTlsVisitor;

impl<'de> de::Visitor<'de> for UseTlsVisitor {
    type Value = UseTls;

    fn expecting(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "true, false, or strict")
    }

    fn visit_bool<E>(self, v: bool) -> Result<UseTls, E> {
        Ok(if v { UseTls::Yes } else { UseTls::No })
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<UseTls, E> {
        match v {
            "strict" | "always" => Ok(UseTls::Strict),
            _ => Err(E::invalid_value(
                de::Unexpected::Str(v), &"true, false, or strict")),
        }
    }
}

fn default_sender() -> Mailbox {
    Mailbox::new("webmaster@localhost".to_string())
}

fn de_mailbox<'de, D>(d: D) -> std::result::Result<Mailbox, D::Error>
where
    D: Deserializer<'de>,
{
    d.deserialize_str(MailboxVisitor)
}

struct MailboxVisitor;

impl<'de> de::Visitor<'de> for MailboxVisitor {
    type Value = Mailbox;

    fn expecting(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "an email address")
    }

    fn visit_str<E>(self, v: &str) -> std::result::Result<Mailbox, E>
    where
        E: de::Error,
    {
        v.parse()
            .map_err(|_| E::invalid_value(
                de::Unexpected::Str(v), &"an email address"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars<'a>(pairs: &'a [(&'a str, &'a str)])
    -> impl Fn(&str) -> Option<String> + 'a {
        move |name| pairs.iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }

    #[test]
    fn console_backend_by_default() {
        let mut config = Config::default();
        config.apply_env(&vars(&[]));
        match config.transport {
            Transports::Log => (),
            ref other => panic!("expected log transport, got {:?}", other),
        }
    }

    #[test]
    fn smtp_from_environment() {
        let mut config = Config::default();
        config.apply_env(&vars(&[
            ("EMAIL_BACKEND", "django.core.mail.backends.smtp.EmailBackend"),
            ("EMAIL_HOST", "smtp.example.com"),
            ("EMAIL_HOST_USER", "mailer"),
            ("EMAIL_HOST_PASSWORD", "hunter22"),
        ]));

        match config.transport {
            Transports::Smtp(ref smtp) => {
                assert_eq!(smtp.host, "smtp.example.com");
                assert_eq!(smtp.port(), 587);
                assert_eq!(smtp.use_tls, UseTls::Yes);
                assert_eq!(smtp.username.as_ref().map(String::as_str), Some("mailer"));
            }
            ref other => panic!("expected SMTP transport, got {:?}", other),
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn smtp_credentials_must_be_complete() {
        let mut config = Config::default();
        config.apply_env(&vars(&[
            ("EMAIL_BACKEND", "smtp"),
            ("EMAIL_HOST_USER", "mailer"),
        ]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_from_toml() {
        let config: Config = toml::from_str(r#"
            sender = "training@gci.example"
            transport = "smtp"
            host = "mail.gci.example"
            use-tls = "strict"
        "#).unwrap();

        match config.transport {
            Transports::Smtp(ref smtp) => {
                assert_eq!(smtp.host, "mail.gci.example");
                assert_eq!(smtp.use_tls, UseTls::Strict);
            }
            ref other => panic!("expected SMTP transport, got {:?}", other),
        }
    }
}
