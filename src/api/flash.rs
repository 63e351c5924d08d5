//! One-time messages shown on the next rendered page.

use actix_web::{
    HttpRequest,
    HttpResponse,
    middleware::{Middleware, Started, Response},
    error::{ErrorInternalServerError, Result},
    http::Cookie,
};
use chrono::Duration;

use crate::utils;

/// Name of the cookie carrying pending messages.
const COOKIE: &str = "flash";

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Message {
    pub level: Level,
    pub text: String,
    /// Where on the page this message belongs, for example `signin`.
    pub tags: Option<String>,
}

/// Carries messages between requests in a sealed cookie.
pub struct FlashMiddleware {
    secret: Vec<u8>,
}

#[derive(Debug, Default)]
struct Flashes {
    /// Messages which arrived with this request.
    incoming: Vec<Message>,
    /// Whether `incoming` messages were shown.
    consumed: bool,
    /// Messages added while handling this request.
    outgoing: Vec<Message>,
}

impl FlashMiddleware {
    pub fn new(secret: Vec<u8>) -> FlashMiddleware {
        FlashMiddleware { secret }
    }

    fn decode(&self, value: &str) -> Option<Vec<Message>> {
        let mut data = base64::decode(value).ok()?;
        utils::unseal(&self.secret, &mut data).ok()
    }
}

impl<S> Middleware<S> for FlashMiddleware {
    fn start(&self, req: &HttpRequest<S>) -> Result<Started> {
        let incoming = req.cookie(COOKIE)
            .and_then(|cookie| self.decode(cookie.value()))
            .unwrap_or_default();

        req.extensions_mut().insert(Flashes {
            incoming,
            .. Flashes::default()
        });

        Ok(Started::Done)
    }

    fn response(&self, req: &HttpRequest<S>, mut rsp: HttpResponse) -> Result<Response> {
        let mut flashes = match req.extensions_mut().remove::<Flashes>() {
            Some(flashes) => flashes,
            None => return Ok(Response::Done(rsp)),
        };

        let mut pending = if flashes.consumed {
            Vec::new()
        } else {
            std::mem::replace(&mut flashes.incoming, Vec::new())
        };
        pending.append(&mut flashes.outgoing);

        if !pending.is_empty() {
            let value = utils::seal(&self.secret, &pending)
                .map_err(|e| ErrorInternalServerError(e.to_string()))?;
            let cookie = Cookie::build(COOKIE, base64::encode(&value))
                .path("/")
                .http_only(true)
                .finish();
            rsp.add_cookie(&cookie)?;
        } else if !flashes.incoming.is_empty() {
            let cookie = Cookie::build(COOKIE, "")
                .path("/")
                .max_age(Duration::zero())
                .finish();
            rsp.add_cookie(&cookie)?;
        }

        Ok(Response::Done(rsp))
    }
}

/// Queue a message to be shown on the next rendered page.
pub fn add<S, T>(req: &HttpRequest<S>, level: Level, text: T, tags: Option<&str>)
where
    T: Into<String>,
{
    let message = Message {
        level,
        text: text.into(),
        tags: tags.map(String::from),
    };

    let mut extensions = req.extensions_mut();
    match extensions.get_mut::<Flashes>() {
        Some(flashes) => flashes.outgoing.push(message),
        None => warn!("Flash message {:?} dropped, no flash middleware", message),
    }
}

/// Take all messages which should be shown on the page being rendered.
///
/// Messages added during this request and not yet displayed are included.
pub fn take<S>(req: &HttpRequest<S>) -> Vec<Message> {
    let mut extensions = req.extensions_mut();
    let flashes = match extensions.get_mut::<Flashes>() {
        Some(flashes) => flashes,
        None => return Vec::new(),
    };

    flashes.consumed = true;

    let mut messages = flashes.incoming.clone();
    messages.append(&mut flashes.outgoing);
    messages
}
