use tera::Tera;

lazy_static! {
    pub static ref PAGES: Tera = compile_templates!("templates/pages/**/*");

    pub static ref MAILS: Tera = compile_templates!("templates/mail/**/*");
}

/// Arguments for `mail/contact`.
#[derive(Serialize)]
pub struct ContactMailArgs<'a> {
    /// Name of the person who sent the message.
    pub name: &'a str,
    /// Their email address.
    pub email: &'a str,
    pub subject: &'a str,
    pub message: &'a str,
    /// Address of the site the message was sent from.
    pub url: &'a str,
}
