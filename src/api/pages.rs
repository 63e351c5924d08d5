//! Public HTML pages.

use actix_web::{
    App,
    Form,
    HttpRequest,
    HttpResponse,
    Query,
    http::StatusCode,
};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    Config,
    layout::{self, Asset, AuthMode, Composition, Options, Page},
    mail::{Mailbox, Mailer},
    models::{
        User,
        contact::{EmailAddress, email},
        password,
        user::{self, CreateUserError, NewUser, UserAuthenticateError},
    },
    registry::{AuthPage, Registries},
    site::SiteInfo,
    templates::{ContactMailArgs, PAGES},
};
use super::{
    Error,
    RouteExt,
    State,
    dashboard,
    flash::{self, FlashMiddleware, Level},
    session::Session,
    util::{local_path, redirect, wants_json},
};

type Result<T, E=Error> = std::result::Result<T, E>;

pub fn app(state: State) -> App<State> {
    let flashes = FlashMiddleware::new(state.config.server.secret.clone());
    let prefix = state.config.apps.url_prefix();

    super::base_app(state)
        .middleware(flashes)
        .resource("/", |r| {
            r.get().api_with(landing);
        })
        .resource("/signin/", |r| {
            r.get().api_with(signin);
            r.post().api_with(do_signin);
        })
        .resource("/signup/", |r| {
            r.get().api_with(signup);
            r.post().api_with(do_signup);
        })
        .resource("/signout/", |r| {
            r.post().api_with(signout);
        })
        .resource("/contact/", |r| {
            r.post().api_with(contact);
        })
        .resource("/manifest.json", |r| {
            r.get().api_with(manifest);
        })
        .configure(|app| dashboard::routes(app, &prefix))
}

#[derive(Serialize)]
struct Unavailable {
    error: String,
}

/// Block requests for an authentication page which is disabled.
///
/// API clients get a `403 Forbidden`, browsers are sent to the home page
/// with an explanation.
fn gate(req: &HttpRequest<State>, page: AuthPage) -> Option<HttpResponse> {
    if req.state().registries.auth.is_enabled(page) {
        return None;
    }

    if wants_json(req) {
        return Some(HttpResponse::Forbidden().json(Unavailable {
            error: format!("{} is currently unavailable.", page.key()),
        }));
    }

    flash::add(req, Level::Warning, page.unavailable_message(),
        Some("auth_page_required"));

    Some(redirect(req.state().registries.home.get_or_root()))
}

/// Empty serializable structure to serve as empty context.
#[derive(Serialize)]
struct Empty {
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct NextQuery {
    next: Option<String>,
    back: Option<String>,
}

/// Render the landing page.
///
/// ## Method
///
/// ```text
/// GET /
/// ```
pub fn landing(req: HttpRequest<State>, session: Option<Session>)
-> Result<HttpResponse> {
    let mut page = Page::landing();
    page.options.hero_btn_1.url = req.state().config.apps.url_prefix();

    render(&req, session.as_ref().map(Session::user), &page, "index.html", &Empty {})
}

#[derive(Debug, Serialize)]
struct SigninTemplate<'a> {
    next: Option<&'a str>,
    back: Option<&'a str>,
    username: &'a str,
}

/// Render a sign-in form.
///
/// ## Method
///
/// ```text
/// GET /signin/
/// ```
pub fn signin(
    req: HttpRequest<State>,
    session: Option<Session>,
    query: Query<NextQuery>,
) -> Result<HttpResponse> {
    if let Some(rsp) = gate(&req, AuthPage::Signin) {
        return Ok(rsp);
    }

    if session.is_some() {
        return Ok(redirect(req.state().registries.home.get_or_root()));
    }

    render(&req, None, &Page::auth(AuthMode::Signin), "index.html", &SigninTemplate {
        next: query.next.as_ref().map(String::as_str),
        back: query.back.as_ref().map(String::as_str),
        username: "",
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct SigninForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    next: Option<String>,
    back: Option<String>,
}

/// Sign in.
///
/// ## Method
///
/// ```text
/// POST /signin/
/// ```
pub fn do_signin(
    req: HttpRequest<State>,
    session: Option<Session>,
    form: Option<Form<SigninForm>>,
) -> Result<HttpResponse> {
    if let Some(rsp) = gate(&req, AuthPage::Signin) {
        return Ok(rsp);
    }

    let home = req.state().registries.home.get_or_root().to_string();

    if session.is_some() {
        return Ok(redirect(&home));
    }

    let form = form.map_or_else(SigninForm::default, Form::into_inner);

    let db = req.state().db.get()?;

    match User::authenticate(&*db, form.username.trim(), &form.password) {
        Ok(user) => {
            // NOTE: This will automatically remove any session that may still
            // exist, we don't have to do it manually here.
            Session::create(&req, &user);

            let next = local_path(form.next.as_ref().map(String::as_str));
            Ok(redirect(next.unwrap_or(&home)))
        }
        Err(UserAuthenticateError::Internal(err)) => Err(err.into()),
        Err(err) => {
            debug!("Failed sign-in as {:?}: {}", form.username, err);

            flash::add(&req, Level::Error, "Invalid username or password.",
                Some("signin"));

            render(&req, None, &Page::auth(AuthMode::Signin), "index.html",
                &SigninTemplate {
                    next: form.next.as_ref().map(String::as_str),
                    back: form.back.as_ref().map(String::as_str),
                    username: &form.username,
                })
        }
    }
}

#[derive(Debug, Serialize)]
struct SignupTemplate<'a> {
    next: Option<&'a str>,
    back: Option<&'a str>,
    username: &'a str,
    email: &'a str,
    errors: Vec<String>,
}

/// Render a sign-up form.
///
/// ## Method
///
/// ```text
/// GET /signup/
/// ```
pub fn signup(
    req: HttpRequest<State>,
    session: Option<Session>,
    query: Query<NextQuery>,
) -> Result<HttpResponse> {
    if let Some(rsp) = gate(&req, AuthPage::Signup) {
        return Ok(rsp);
    }

    if session.is_some() {
        return Ok(redirect(req.state().registries.home.get_or_root()));
    }

    render(&req, None, &Page::auth(AuthMode::Signup), "index.html", &SignupTemplate {
        next: query.next.as_ref().map(String::as_str),
        back: query.back.as_ref().map(String::as_str),
        username: "",
        email: "",
        errors: Vec::new(),
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password1: String,
    #[serde(default)]
    password2: String,
    next: Option<String>,
    back: Option<String>,
}

impl SignupForm {
    /// Check everything that can be checked without a database.
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let username = self.username.trim();

        if let Err(err) = user::validate_username(username) {
            errors.push(err.to_string());
        }

        if !self.email.trim().is_empty() {
            if let Err(err) = email::validate(self.email.trim()) {
                errors.push(err.to_string());
            }
        }

        if let Err(errs) = password::validate(username, &self.password1, &self.password2) {
            errors.extend(errs.iter().map(ToString::to_string));
        }

        errors
    }
}

/// Register a new account and sign in with it.
///
/// ## Method
///
/// ```text
/// POST /signup/
/// ```
pub fn do_signup(
    req: HttpRequest<State>,
    session: Option<Session>,
    form: Option<Form<SignupForm>>,
) -> Result<HttpResponse> {
    if let Some(rsp) = gate(&req, AuthPage::Signup) {
        return Ok(rsp);
    }

    if session.is_some() {
        return Ok(redirect(req.state().registries.home.get_or_root()));
    }

    let form = form.map_or_else(SignupForm::default, Form::into_inner);

    let mut errors = form.validate();

    if errors.is_empty() {
        let db = req.state().db.get()?;

        let result = User::create(&*db, NewUser {
            username: form.username.trim(),
            email: form.email.trim(),
            first_name: "",
            last_name: "",
            password: &form.password1,
            is_superuser: false,
        });

        match result {
            Ok(user) => {
                info!("New account {}", user.username);
                Session::create(&req, &user);

                let next = local_path(form.next.as_ref().map(String::as_str));
                return Ok(redirect(next.unwrap_or("/signin/")));
            }
            Err(err @ CreateUserError::Internal(_))
            | Err(err @ CreateUserError::Hash(_)) => return Err(err.into()),
            Err(err) => errors.push(err.to_string()),
        }
    }

    flash::add(&req, Level::Error,
        "There was an error with your submission. Please check the form.",
        Some("signup"));

    render(&req, None, &Page::auth(AuthMode::Signup), "index.html", &SignupTemplate {
        next: form.next.as_ref().map(String::as_str),
        back: form.back.as_ref().map(String::as_str),
        username: &form.username,
        email: &form.email,
        errors,
    })
}

/// Sign out and return to the home page.
///
/// ## Method
///
/// ```text
/// POST /signout/
/// ```
pub fn signout(req: HttpRequest<State>, session: Option<Session>)
-> Result<HttpResponse> {
    if let Some(session) = session {
        Session::destroy(&req, session);
    }

    flash::add(&req, Level::Success, "You have been successfully logged out.", None);

    Ok(redirect(req.state().registries.home.get_or_root()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContactForm {
    name: String,
    email: String,
    subject: String,
    message: String,
}

/// Longest accepted name and subject.
const CONTACT_FIELD_LENGTH: usize = 200;

impl ContactForm {
    /// Validate the form, returning errors for each invalid field.
    fn validate(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut errors = BTreeMap::new();
        let mut error = |field, message: &str| errors.entry(field)
            .or_insert_with(Vec::new)
            .push(message.to_string());

        for &(field, value) in &[("name", &self.name), ("subject", &self.subject)] {
            if value.trim().is_empty() {
                error(field, "This field is required.");
            } else if value.chars().count() > CONTACT_FIELD_LENGTH {
                error(field, "Ensure this value has at most 200 characters.");
            }
        }

        if self.email.trim().is_empty() {
            error("email", "This field is required.");
        } else if email::validate(self.email.trim()).is_err() {
            error("email", "Enter a valid email address.");
        }

        if self.message.trim().is_empty() {
            error("message", "This field is required.");
        }

        errors
    }
}

#[derive(Debug, Serialize)]
struct ContactResponse {
    success: bool,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<BTreeMap<&'static str, Vec<String>>>,
}

impl ContactResponse {
    fn new(success: bool, message: &'static str) -> ContactResponse {
        ContactResponse { success, message, errors: None }
    }
}

/// Send the contact form to the organisation's primary email address.
///
/// ## Method
///
/// ```text
/// POST /contact/
/// ```
pub fn contact(req: HttpRequest<State>, body: String) -> Result<HttpResponse> {
    let form = match serde_json::from_str::<ContactForm>(&body) {
        Ok(form) => form,
        Err(_) => return Ok(HttpResponse::BadRequest()
            .json(ContactResponse::new(false, "Invalid JSON data."))),
    };

    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(HttpResponse::BadRequest().json(ContactResponse {
            errors: Some(errors),
            .. ContactResponse::new(false, "Please correct the errors below.")
        }));
    }

    let db = req.state().db.get()?;

    let recipient = match EmailAddress::primary(&*db)? {
        Some(address) => address.email.clone(),
        None => {
            error!("Contact form submitted, but there is no primary email \
                address to send it to");
            return Ok(HttpResponse::InternalServerError().json(
                ContactResponse::new(false, "There was an error sending your \
                    message. Please try again later.")));
        }
    };

    let info = req.connection_info();
    let url = format!("{}://{}{}", info.scheme(), info.host(),
        req.state().registries.home.get_or_root());

    Mailer::send(
        Mailbox::new(recipient),
        Some(Mailbox::new_with_name(form.name.trim().to_string(),
            form.email.trim().to_string())),
        "contact",
        form.subject.trim(),
        &ContactMailArgs {
            name: form.name.trim(),
            email: form.email.trim(),
            subject: form.subject.trim(),
            message: &form.message,
            url: &url,
        },
    );

    Ok(HttpResponse::Ok().json(ContactResponse::new(true,
        "Thank you for your message! We will get back to you soon.")))
}

/// Web application manifest.
///
/// ## Method
///
/// ```text
/// GET /manifest.json
/// ```
pub fn manifest(state: actix_web::State<State>) -> Result<HttpResponse> {
    let db = state.db.get()?;
    let site = state.site.get(&*db)?;

    Ok(HttpResponse::Ok()
        .content_type("application/manifest+json")
        .json(site.manifest()))
}

/// Context shared by every page, with template-specific values in `extra`.
#[derive(Serialize)]
pub struct PageContext<'a, T> {
    /// Full document title.
    title: String,
    page_title: Option<&'a str>,
    site: &'a SiteInfo,
    layout: Composition,
    options: &'a Options,
    auth_mode: Option<&'static str>,
    auth: AuthContext<'a>,
    assets: Vec<Asset>,
    navigation: Vec<NavLink>,
    home_url: &'a str,
    static_url: &'static str,
    user: Option<user::PublicData>,
    messages: Vec<flash::Message>,
    debug: bool,
    #[serde(flatten)]
    extra: &'a T,
}

#[derive(Serialize)]
struct AuthContext<'a> {
    /// URLs of enabled pages, by page name.
    urls: BTreeMap<&'static str, &'static str>,
    username_label: &'a str,
    username_placeholder: &'a str,
}

#[derive(Serialize)]
struct NavLink {
    name: String,
    href: String,
    #[serde(rename = "type")]
    kind: String,
}

impl<'a, T> PageContext<'a, T> {
    pub fn new(
        config: &Config,
        registries: &'a Registries,
        site: &'a SiteInfo,
        page: &'a Page,
        user: Option<user::PublicData>,
        messages: Vec<flash::Message>,
        extra: &'a T,
    ) -> PageContext<'a, T> {
        let page_title = page.title.as_ref().map(String::as_str);

        PageContext {
            title: site.title(page_title),
            page_title,
            site,
            layout: page.compose(&registries.auth),
            options: &page.options,
            auth_mode: page.auth_mode().map(AuthMode::key),
            auth: AuthContext {
                urls: registries.auth.urls(),
                username_label: registries.auth.username_label(),
                username_placeholder: registries.auth.username_placeholder(),
            },
            assets: layout::vendor_assets(config.server.environment),
            navigation: registries.navigation.items()
                .into_iter()
                .map(|item| NavLink {
                    href: item.href(),
                    name: item.name,
                    kind: item.kind,
                })
                .collect(),
            home_url: registries.home.get_or_root(),
            static_url: layout::STATIC_URL,
            user,
            messages,
            debug: config.is_debug(),
            extra,
        }
    }
}

/// Render a page composed of regions described by `page`.
///
/// `template` extends `base.html`. Values in `extra` are available to it
/// alongside the common page context.
pub(super) fn render<T>(
    req: &HttpRequest<State>,
    user: Option<&User>,
    page: &Page,
    template: &str,
    extra: &T,
) -> Result<HttpResponse>
where
    T: Serialize,
{
    render_code(req, StatusCode::OK, user, page, template, extra)
}

/// Render a page with a given status code.
pub(super) fn render_code<T>(
    req: &HttpRequest<State>,
    code: StatusCode,
    user: Option<&User>,
    page: &Page,
    template: &str,
    extra: &T,
) -> Result<HttpResponse>
where
    T: Serialize,
{
    let state = req.state();
    let db = state.db.get()?;
    let site = state.site.get(&*db)?;
    let registries = &*state.registries;

    let user = match user {
        Some(user) => Some(user.get_public(user.role(&*db)?.as_ref())),
        None => None,
    };

    let context = PageContext::new(
        &state.config, registries, &*site, page, user, flash::take(req), extra);

    let body = PAGES.render(template, &context)?;

    Ok(HttpResponse::build(code)
        .content_type("text/html; charset=utf-8")
        .body(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, email: &str, subject: &str, message: &str) -> ContactForm {
        ContactForm {
            name: name.to_string(),
            email: email.to_string(),
            subject: subject.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn valid_contact_form() {
        let form = form("Grace", "grace@example.com", "Enrollment", "When?");
        assert!(form.validate().is_empty());
    }

    #[test]
    fn contact_form_reports_each_field() {
        let errors = form("", "not an email", "", " ").validate();
        assert_eq!(errors.keys().cloned().collect::<Vec<_>>(),
            vec!["email", "message", "name", "subject"]);
        assert_eq!(errors["email"], vec!["Enter a valid email address."]);
        assert_eq!(errors["name"], vec!["This field is required."]);
    }

    #[test]
    fn contact_form_fields_are_optional_in_json() {
        let form: ContactForm = serde_json::from_str(r#"{"name": "Grace"}"#).unwrap();
        let errors = form.validate();
        assert!(!errors.contains_key("name"));
        assert!(errors.contains_key("email"));
    }

    #[test]
    fn signup_form_collects_errors() {
        let form = SignupForm {
            username: "john".to_string(),
            email: String::new(),
            password1: "1234".to_string(),
            password2: "12345".to_string(),
            next: None,
            back: None,
        };
        let errors = form.validate();
        assert!(errors.contains(&"The two password fields didn't match.".to_string()));
        assert!(errors.contains(&"This password is entirely numeric.".to_string()));
        assert_eq!(errors.len(), 3);
    }
}
