use actix_web::{App, HttpResponse, Json, Path};

use crate::{
    db::types::OrgDetailKind,
    models::org,
    permissions::ChangeOrg,
};
use super::{Error, RouteExt, State, session::Session};

/// Configure routes.
pub fn routes(app: App<State>) -> App<State> {
    app
        .resource("/site", |r| {
            r.get().api_with(get_site);
        })
        .resource("/site/details/{kind}", |r| {
            r.put().api_with(set_detail);
        })
}

type Result<T, E=Error> = std::result::Result<T, E>;

/// Get information about the organisation running this site.
///
/// ## Method
///
/// ```text
/// GET /site
/// ```
pub fn get_site(state: actix_web::State<State>) -> Result<HttpResponse> {
    let db = state.db.get()?;
    let info = state.site.get(&*db)?;

    Ok(HttpResponse::Ok().json(&*info))
}

#[derive(Debug, Deserialize)]
pub struct DetailChange {
    value: String,
}

/// Change one of the organisation's details.
///
/// Author details can only be changed by superusers.
///
/// ## Method
///
/// ```text
/// PUT /site/details/:kind
/// ```
pub fn set_detail(
    state: actix_web::State<State>,
    session: Session<ChangeOrg>,
    kind: Path<String>,
    change: Json<DetailChange>,
) -> Result<HttpResponse> {
    let kind = OrgDetailKind::from_key(&kind)
        .ok_or_else(|| DetailError::NoSuchDetail(kind.into_inner()))?;

    if kind.is_superuser_only() && !session.user().is_superuser {
        return Err(DetailError::SuperuserOnly.into());
    }

    let db = state.db.get()?;

    org::set_detail(&*db, kind, change.value.trim())?;
    state.site.invalidate();

    Ok(HttpResponse::NoContent().finish())
}

#[derive(ApiError, Debug, Fail)]
pub enum DetailError {
    #[fail(display = "No such detail: {}", _0)]
    #[api(code = "site:detail:not-found", status = "NOT_FOUND")]
    NoSuchDetail(String),
    #[fail(display = "Only superusers can change this detail")]
    #[api(code = "site:detail:superuser-only", status = "FORBIDDEN")]
    SuperuserOnly,
}
