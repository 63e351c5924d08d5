use actix_web::{App, HttpResponse, Json, Path};

use crate::{
    db::models::SchoolChange,
    models::{
        module::PublicData as ModuleData,
        school::{School, PublicData as SchoolData},
    },
    permissions::{AddSchool, ChangeSchool, DeleteSchool, ViewModule, ViewSchool},
};
use super::{Error, RouteExt, State, session::Session, util::Created};

/// Configure routes.
pub fn routes(app: App<State>) -> App<State> {
    app
        .resource("/schools", |r| {
            r.get().api_with(list_schools);
            r.post().api_with(create_school);
        })
        .resource("/schools/{id}", |r| {
            r.get().api_with(get_school);
            r.put().api_with(update_school);
            r.delete().api_with(delete_school);
        })
        .resource("/schools/{id}/modules", |r| {
            r.get().api_with(list_school_modules);
        })
}

type Result<T, E=Error> = std::result::Result<T, E>;

/// Get list of all schools, ordered by name.
///
/// ## Method
///
/// ```text
/// GET /schools
/// ```
pub fn list_schools(
    state: actix_web::State<State>,
    _session: Session<ViewSchool>,
) -> Result<Json<Vec<SchoolData>>> {
    let db = state.db.get()?;

    School::all(&*db)
        .map(|v| v.iter().map(School::get_public).collect())
        .map(Json)
        .map_err(Into::into)
}

#[derive(Debug, Deserialize)]
pub struct NewSchool {
    name: String,
    #[serde(default)]
    description: String,
}

/// Create a new school.
///
/// ## Method
///
/// ```text
/// POST /schools
/// ```
pub fn create_school(
    state: actix_web::State<State>,
    _session: Session<AddSchool>,
    data: Json<NewSchool>,
) -> Result<Created<String, Json<SchoolData>>> {
    let db = state.db.get()?;
    let school = School::create(&*db, &data.name, &data.description)?;

    let location = format!("/api/v1/schools/{}", school.id);

    Ok(Created(location, Json(school.get_public())))
}

/// Get a school by ID.
///
/// ## Method
///
/// ```text
/// GET /schools/:id
/// ```
pub fn get_school(
    state: actix_web::State<State>,
    _session: Session<ViewSchool>,
    id: Path<i32>,
) -> Result<Json<SchoolData>> {
    let db = state.db.get()?;
    let school = School::by_id(&*db, id.into_inner())?;

    Ok(Json(school.get_public()))
}

#[derive(Debug, Deserialize)]
pub struct SchoolUpdate {
    name: Option<String>,
    description: Option<String>,
}

/// Update a school.
///
/// ## Method
///
/// ```text
/// PUT /schools/:id
/// ```
pub fn update_school(
    state: actix_web::State<State>,
    _session: Session<ChangeSchool>,
    id: Path<i32>,
    update: Json<SchoolUpdate>,
) -> Result<Json<SchoolData>> {
    let db = state.db.get()?;
    let mut school = School::by_id(&*db, id.into_inner())?;

    school.update(&*db, SchoolChange {
        name: update.name.as_ref().map(String::as_str),
        description: update.description.as_ref().map(String::as_str),
    })?;

    Ok(Json(school.get_public()))
}

/// Delete a school together with its modules and their enrollments.
///
/// ## Method
///
/// ```text
/// DELETE /schools/:id
/// ```
pub fn delete_school(
    state: actix_web::State<State>,
    _session: Session<DeleteSchool>,
    id: Path<i32>,
) -> Result<HttpResponse> {
    let db = state.db.get()?;

    School::by_id(&*db, id.into_inner())?.delete(&*db)?;

    Ok(HttpResponse::NoContent().finish())
}

/// Get modules of a school, in their teaching order.
///
/// ## Method
///
/// ```text
/// GET /schools/:id/modules
/// ```
pub fn list_school_modules(
    state: actix_web::State<State>,
    _session: Session<(ViewSchool, ViewModule)>,
    id: Path<i32>,
) -> Result<Json<Vec<ModuleData>>> {
    let db = state.db.get()?;
    let school = School::by_id(&*db, id.into_inner())?;

    Ok(Json(school.modules(&*db)?.iter().map(|m| m.get_public()).collect()))
}
