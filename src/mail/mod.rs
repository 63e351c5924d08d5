//! Outgoing mail.

mod config;
mod service;
mod transport;

pub use self::{
    config::{Config, SmtpConfig, Transports, UseTls},
    service::Mailer,
    transport::Message,
};

pub use lettre_email::Mailbox;
