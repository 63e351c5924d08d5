use actix::{Actor, Context, Handler, Supervised, SystemService};
use lettre_email::Mailbox;
use serde::Serialize;

use crate::{Result, templates::MAILS};
use super::transport::{self, Message, Transport};

pub struct Mailer {
    transport: Box<dyn Transport>,
}

impl Mailer {
    /// Try to send an email message.
    ///
    /// Errors will be logged, but otherwise ignored.
    pub fn send<C>(
        to: Mailbox,
        reply_to: Option<Mailbox>,
        template: &str,
        subject: &str,
        context: &C,
    )
    where
        C: Serialize,
    {
        let message = match format_message(to, reply_to, template, subject, context) {
            Ok(message) => message,
            Err(err) => {
                error!("Could not format message: {}", err);
                return;
            }
        };

        if let Err(err) = Mailer::from_registry().try_send(message) {
            error!("Could not send mail: {}", err);
        }
    }
}

fn format_message<C>(
    to: Mailbox,
    reply_to: Option<Mailbox>,
    template: &str,
    subject: &str,
    context: &C,
) -> Result<Message>
where
    C: Serialize,
{
    let html = MAILS.render(&format!("{}.html", template), context)
        .map_err(|e| format_err!("{}", e))?;
    let text = MAILS.render(&format!("{}.txt", template), context)
        .map_err(|e| format_err!("{}", e))?;

    Ok(Message {
        to,
        reply_to,
        subject: subject.to_string(),
        html,
        text,
    })
}

impl Default for Mailer {
    fn default() -> Self {
        let transport = crate::config::load()
            .and_then(|config| transport::from_config(&config.mail))
            .unwrap_or_else(|err| {
                error!("Could not configure mail transport, messages will \
                    only be logged: {}", err);
                transport::fallback()
            });

        Self { transport }
    }
}

impl Actor for Mailer {
    type Context = Context<Self>;
}

impl Supervised for Mailer {
}

impl SystemService for Mailer {
}

impl actix::Message for Message {
    type Result = ();
}

impl Handler<Message> for Mailer {
    type Result = ();

    fn handle(&mut self, msg: Message, _: &mut Self::Context) {
        if let Err(err) = self.transport.send(msg) {
            error!("Could not send email: {}", err);
        }
    }
}
