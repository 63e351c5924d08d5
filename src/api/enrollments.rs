use actix_web::{App, HttpResponse, Json, Path};

use crate::{
    models::{
        enrollment::{Enrollment, PublicData as EnrollmentData},
        module::Module,
        user::User,
    },
    permissions::{
        AddEnrollment,
        ChangeEnrollment,
        DeleteEnrollment,
        PermissionBits,
        ViewEnrollment,
    },
};
use super::{Error, RouteExt, State, session::Session, util::Created};

/// Configure routes.
pub fn routes(app: App<State>) -> App<State> {
    app
        .resource("/enrollments", |r| {
            r.get().api_with(list_enrollments);
            r.post().api_with(create_enrollment);
        })
        .resource("/enrollments/{id}", |r| {
            r.get().api_with(get_enrollment);
            r.put().api_with(update_enrollment);
            r.delete().api_with(delete_enrollment);
        })
}

type Result<T, E=Error> = std::result::Result<T, E>;

/// Get list of all enrollments, newest first.
///
/// ## Method
///
/// ```text
/// GET /enrollments
/// ```
pub fn list_enrollments(
    state: actix_web::State<State>,
    _session: Session<ViewEnrollment>,
) -> Result<Json<Vec<EnrollmentData>>> {
    let db = state.db.get()?;

    Enrollment::all(&*db)
        .map(|v| v.iter().map(Enrollment::get_public).collect())
        .map(Json)
        .map_err(Into::into)
}

#[derive(Debug, Deserialize)]
pub struct NewEnrollment {
    student: i32,
    module: i32,
}

/// Enroll a student in a module.
///
/// ## Method
///
/// ```text
/// POST /enrollments
/// ```
pub fn create_enrollment(
    state: actix_web::State<State>,
    _session: Session<AddEnrollment>,
    data: Json<NewEnrollment>,
) -> Result<Created<String, Json<EnrollmentData>>> {
    let db = state.db.get()?;
    let student = User::by_id(&*db, data.student)?;
    let module = Module::by_id(&*db, data.module)?;
    let enrollment = Enrollment::create(&*db, &student, &module)?;

    let location = format!("/api/v1/enrollments/{}", enrollment.id);

    Ok(Created(location, Json(enrollment.get_public())))
}

/// Get an enrollment by ID.
///
/// Students can always see their own enrollments.
///
/// ## Method
///
/// ```text
/// GET /enrollments/:id
/// ```
pub fn get_enrollment(
    state: actix_web::State<State>,
    session: Session,
    id: Path<i32>,
) -> Result<Json<EnrollmentData>> {
    let db = state.db.get()?;
    let enrollment = Enrollment::by_id(&*db, id.into_inner())?;

    if enrollment.student != session.user().id {
        session.permissions().require(PermissionBits::VIEW_ENROLLMENT)?;
    }

    Ok(Json(enrollment.get_public()))
}

#[derive(Debug, Deserialize)]
pub struct EnrollmentUpdate {
    completed: bool,
}

/// Mark an enrollment as completed, or not.
///
/// ## Method
///
/// ```text
/// PUT /enrollments/:id
/// ```
pub fn update_enrollment(
    state: actix_web::State<State>,
    _session: Session<ChangeEnrollment>,
    id: Path<i32>,
    update: Json<EnrollmentUpdate>,
) -> Result<Json<EnrollmentData>> {
    let db = state.db.get()?;
    let mut enrollment = Enrollment::by_id(&*db, id.into_inner())?;

    enrollment.set_completed(&*db, update.completed)?;

    Ok(Json(enrollment.get_public()))
}

/// Delete an enrollment.
///
/// ## Method
///
/// ```text
/// DELETE /enrollments/:id
/// ```
pub fn delete_enrollment(
    state: actix_web::State<State>,
    _session: Session<DeleteEnrollment>,
    id: Path<i32>,
) -> Result<HttpResponse> {
    let db = state.db.get()?;

    Enrollment::by_id(&*db, id.into_inner())?.delete(&*db)?;

    Ok(HttpResponse::NoContent().finish())
}
