use actix_web::{App, HttpResponse, Json, Path};

use crate::{
    db::models::ModuleChange,
    models::{
        enrollment::{Enrollment, PublicData as EnrollmentData},
        module::{Module, PublicData as ModuleData},
        school::School,
    },
    permissions::{AddModule, ChangeModule, DeleteModule, ViewModule},
};
use super::{
    Error,
    RouteExt,
    State,
    session::Session,
    util::Created,
};

/// Configure routes.
pub fn routes(app: App<State>) -> App<State> {
    app
        .resource("/modules", |r| {
            r.get().api_with(list_modules);
            r.post().api_with(create_module);
        })
        .resource("/modules/{id}", |r| {
            r.get().api_with(get_module);
            r.put().api_with(update_module);
            r.delete().api_with(delete_module);
        })
        .resource("/modules/{id}/enroll", |r| {
            r.post().api_with(enroll);
        })
}

type Result<T, E=Error> = std::result::Result<T, E>;

/// Get list of all modules, ordered by school and position.
///
/// ## Method
///
/// ```text
/// GET /modules
/// ```
pub fn list_modules(
    state: actix_web::State<State>,
    _session: Session<ViewModule>,
) -> Result<Json<Vec<ModuleData>>> {
    let db = state.db.get()?;

    Module::all(&*db)
        .map(|v| v.iter().map(Module::get_public).collect())
        .map(Json)
        .map_err(Into::into)
}

#[derive(Debug, Deserialize)]
pub struct NewModule {
    school: i32,
    title: String,
    #[serde(default)]
    description: String,
    /// Position within the school. Defaults to after the last module.
    position: Option<i32>,
}

/// Create a new module.
///
/// ## Method
///
/// ```text
/// POST /modules
/// ```
pub fn create_module(
    state: actix_web::State<State>,
    _session: Session<AddModule>,
    data: Json<NewModule>,
) -> Result<Created<String, Json<ModuleData>>> {
    let db = state.db.get()?;
    let school = School::by_id(&*db, data.school)?;
    let module = Module::create(
        &*db, &school, &data.title, &data.description, data.position)?;

    let location = format!("/api/v1/modules/{}", module.id);

    Ok(Created(location, Json(module.get_public())))
}

/// Get a module by ID.
///
/// ## Method
///
/// ```text
/// GET /modules/:id
/// ```
pub fn get_module(
    state: actix_web::State<State>,
    _session: Session<ViewModule>,
    id: Path<i32>,
) -> Result<Json<ModuleData>> {
    let db = state.db.get()?;
    let module = Module::by_id(&*db, id.into_inner())?;

    Ok(Json(module.get_public()))
}

#[derive(Debug, Deserialize)]
pub struct ModuleUpdate {
    title: Option<String>,
    description: Option<String>,
    position: Option<i32>,
}

/// Update a module.
///
/// ## Method
///
/// ```text
/// PUT /modules/:id
/// ```
pub fn update_module(
    state: actix_web::State<State>,
    _session: Session<ChangeModule>,
    id: Path<i32>,
    update: Json<ModuleUpdate>,
) -> Result<Json<ModuleData>> {
    let db = state.db.get()?;
    let mut module = Module::by_id(&*db, id.into_inner())?;

    module.update(&*db, ModuleChange {
        title: update.title.as_ref().map(String::as_str),
        description: update.description.as_ref().map(String::as_str),
        position: update.position,
    })?;

    Ok(Json(module.get_public()))
}

/// Delete a module and its enrollments.
///
/// ## Method
///
/// ```text
/// DELETE /modules/:id
/// ```
pub fn delete_module(
    state: actix_web::State<State>,
    _session: Session<DeleteModule>,
    id: Path<i32>,
) -> Result<HttpResponse> {
    let db = state.db.get()?;

    Module::by_id(&*db, id.into_inner())?.delete(&*db)?;

    Ok(HttpResponse::NoContent().finish())
}

/// Enroll current user in a module.
///
/// Only users holding the student role can enroll.
///
/// ## Method
///
/// ```text
/// POST /modules/:id/enroll
/// ```
pub fn enroll(
    state: actix_web::State<State>,
    session: Session,
    id: Path<i32>,
) -> Result<Created<String, Json<EnrollmentData>>> {
    let db = state.db.get()?;
    let module = Module::by_id(&*db, id.into_inner())?;
    let enrollment = Enrollment::create(&*db, session.user(), &module)?;

    let location = format!("/api/v1/enrollments/{}", enrollment.id);

    Ok(Created(location, Json(enrollment.get_public())))
}
