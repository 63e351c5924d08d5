use actix_web::{
    Either,
    Form,
    FromRequest,
    HttpRequest,
    HttpResponse,
    Json,
    Responder,
    http::{
        HttpTryFrom,
        StatusCode,
        header::{CONTENT_TYPE, LOCATION, HeaderValue},
    },
};
use futures::Future;

pub struct FormOrJson<T>(Either<Form<T>, Json<T>>);

impl<T> FormOrJson<T> {
    pub fn into_inner(self) -> T {
        match self.0 {
            Either::A(a) => a.into_inner(),
            Either::B(b) => b.into_inner(),
        }
    }
}

impl<T> std::ops::Deref for FormOrJson<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.0 {
            Either::A(ref a) => &*a,
            Either::B(ref b) => &*b,
        }
    }
}

impl<S, T> FromRequest<S> for FormOrJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: 'static,
{
    type Config = <Either<Form<T>, Json<T>> as FromRequest<S>>::Config;
    type Result = Box<dyn Future<Item = Self, Error = actix_web::Error>>;

    fn from_request(req: &HttpRequest<S>, config: &Self::Config) -> Self::Result {
        Box::new(Either::from_request(req, config).map(FormOrJson))
    }
}

pub struct WithStatus<T>(pub StatusCode, pub T);

impl<T: Responder + 'static> Responder for WithStatus<T> {
    type Item = Box<dyn Future<Item = HttpResponse, Error = actix_web::Error>>;
    type Error = <T as Responder>::Error;

    fn respond_to<S: 'static>(self, req: &HttpRequest<S>)
    -> Result<Self::Item, Self::Error> {
        let WithStatus(code, responder) = self;

        Ok(Box::new(responder.respond_to(req)?.into().map(move |mut rsp| {
            *rsp.status_mut() = code;
            rsp
        })))
    }
}

pub struct Created<L, T>(pub L, pub T);

impl<L, T> Responder for Created<L, T>
where
    T: Responder + 'static,
    L: 'static,
    HeaderValue: HttpTryFrom<L>,
    <HeaderValue as HttpTryFrom<L>>::Error: actix_web::ResponseError,
{
    type Item = Box<dyn Future<Item = HttpResponse, Error = actix_web::Error>>;
    type Error = <T as Responder>::Error;

    fn respond_to<S: 'static>(self, req: &HttpRequest<S>)
    -> Result<Self::Item, Self::Error> {
        let Created(location, responder) = self;

        Ok(Box::new(responder.respond_to(req)?.into().and_then(move |mut rsp| {
            *rsp.status_mut() = StatusCode::CREATED;
            rsp.headers_mut().insert(LOCATION, <HeaderValue as HttpTryFrom<L>>::try_from(location)?);
            Ok(rsp)
        })))
    }
}

/// Respond with `303 See Other` redirecting to `location`.
pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .header(LOCATION, location)
        .finish()
}

/// Does this request expect a JSON response?
///
/// That is the case for requests with a JSON body, and for requests made
/// with `XMLHttpRequest`.
pub fn wants_json<S>(req: &HttpRequest<S>) -> bool {
    let headers = req.headers();

    headers.get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v.split(';').next() == Some("application/json"))
    || headers.get("X-Requested-With")
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v == "XMLHttpRequest")
}

/// Accept `next` only if it points to a path on this site.
pub fn local_path(next: Option<&str>) -> Option<&str> {
    let next = next?.trim();

    if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
        Some(next)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_path_rejects_other_sites() {
        assert_eq!(local_path(Some("/dashboard/")), Some("/dashboard/"));
        assert_eq!(local_path(Some("  /signin/?next=/ ")), Some("/signin/?next=/"));
        assert_eq!(local_path(Some("//evil.example/")), None);
        assert_eq!(local_path(Some("https://evil.example/")), None);
        assert_eq!(local_path(Some("/\\evil.example")), None);
        assert_eq!(local_path(Some("")), None);
        assert_eq!(local_path(None), None);
    }
}
