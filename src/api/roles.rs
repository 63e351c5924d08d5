use actix_web::{App, HttpResponse, Json, Path};
use diesel::Connection as _;

use crate::{
    db::models::RoleChange,
    models::role::{Role, RoleDefinition, PublicData as RoleData},
    permissions::{AddRole, ChangeRole, DeleteRole, PermissionBits, ViewRole},
};
use super::{Error, RouteExt, State, session::Session};

/// Configure routes.
pub fn routes(app: App<State>) -> App<State> {
    app
        .resource("/roles",|r| {
            r.get().api_with(list_roles);
            r.post().api_with(create_role);
        })
        .resource("/roles/{id}", |r| {
            r.get().api_with(get_role);
            r.put().api_with(update_role);
            r.delete().api_with(delete_role);
        })
}

type Result<T, E=Error> = std::result::Result<T, E>;

/// Can holder of this session see permissions of roles?
fn shows_permissions<P>(session: &Session<P>) -> bool {
    session.permissions().contains(PermissionBits::CHANGE_ROLE)
}

/// Get list of all roles.
///
/// ## Method
///
/// ```text
/// GET /roles
/// ```
pub fn list_roles(
    state: actix_web::State<State>,
    session: Session<ViewRole>,
) -> Result<Json<Vec<RoleData>>> {
    let db = state.db.get()?;
    let show_permissions = shows_permissions(&session);

    Role::all(&*db)
        .map(|v| v.into_iter().map(|r| r.get_public(show_permissions)).collect())
        .map(Json)
        .map_err(Into::into)
}

#[derive(Deserialize)]
pub struct NewRole {
    #[serde(flatten)]
    definition: RoleDefinition,
    #[serde(default)]
    permissions: PermissionBits,
}

/// Create a new role.
///
/// ## Method
///
/// ```text
/// POST /roles
/// ```
pub fn create_role(
    state: actix_web::State<State>,
    _session: Session<AddRole>,
    data: Json<NewRole>,
) -> Result<Json<RoleData>> {
    let db = state.db.get()?;
    let role = Role::create(&*db, &data.definition, data.permissions)?;

    Ok(Json(role.get_public(true)))
}

/// Get a role by ID.
///
/// ## Method
///
/// ```text
/// GET /roles/:id
/// ```
pub fn get_role(
    state: actix_web::State<State>,
    session: Session<ViewRole>,
    id: Path<i32>,
) -> Result<Json<RoleData>> {
    let db = state.db.get()?;
    let role = Role::by_id(&*db, id.into_inner())?;

    Ok(Json(role.get_public(shows_permissions(&session))))
}

#[derive(Deserialize)]
pub struct RoleUpdate {
    display_name: Option<String>,
    description: Option<String>,
    is_staff_role: Option<bool>,
    is_default_role: Option<bool>,
    permissions: Option<PermissionBits>,
}

/// Update a role.
///
/// ## Method
///
/// ```text
/// PUT /roles/:id
/// ```
pub fn update_role(
    state: actix_web::State<State>,
    _session: Session<ChangeRole>,
    id: Path<i32>,
    update: Json<RoleUpdate>,
) -> Result<Json<RoleData>> {
    let db = state.db.get()?;
    let mut role = Role::by_id(&*db, id.into_inner())?;

    let dbcon = &*db;
    dbcon.transaction::<_, Error, _>(|| {
        role.update(dbcon, RoleChange {
            display_name: update.display_name.as_ref().map(String::as_str),
            description: update.description.as_ref().map(String::as_str),
            is_staff_role: update.is_staff_role,
            is_default_role: update.is_default_role,
        })?;

        if let Some(permissions) = update.permissions {
            role.set_permissions(dbcon, permissions)?;
        }

        Ok(())
    })?;

    Ok(Json(role.get_public(true)))
}

/// Delete a role.
///
/// Users holding this role are left without one.
///
/// ## Method
///
/// ```text
/// DELETE /roles/:id
/// ```
pub fn delete_role(
    state: actix_web::State<State>,
    _session: Session<DeleteRole>,
    id: Path<i32>,
) -> Result<HttpResponse> {
    let db = state.db.get()?;

    Role::by_id(&*db, id.into_inner())?.delete(&*db)?;

    Ok(HttpResponse::NoContent().finish())
}
