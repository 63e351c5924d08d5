use actix_web::{App, Json, Path};

use crate::{
    db::Connection,
    models::user::{User, PublicData as UserData},
    permissions::{ChangeUser, PermissionBits, ViewUser},
};
use super::{Error, RouteExt, State, session::Session};

/// Configure routes.
pub fn routes(app: App<State>) -> App<State> {
    app
        .resource("/users", |r| {
            r.get().api_with(list_users);
        })
        .resource("/users/me", |r| {
            r.get().api_with(get_current_user);
        })
        .resource("/users/{id}", |r| {
            r.get().api_with(get_user);
        })
        .resource("/users/{id}/role", |r| {
            r.put().api_with(modify_role);
        })
}

type Result<T, E=Error> = std::result::Result<T, E>;

fn public_data(dbcon: &Connection, user: &User) -> Result<UserData> {
    let role = user.role(dbcon)?;
    Ok(user.get_public(role.as_ref()))
}

/// Get list of all users.
///
/// ## Method
///
/// ```text
/// GET /users
/// ```
pub fn list_users(
    state: actix_web::State<State>,
    _session: Session<ViewUser>,
) -> Result<Json<Vec<UserData>>> {
    let db = state.db.get()?;

    User::all(&*db)?
        .iter()
        .map(|user| public_data(&*db, user))
        .collect::<Result<Vec<_>>>()
        .map(Json)
}

/// Get current user's information.
///
/// ## Method
///
/// ```text
/// GET /users/me
/// ```
pub fn get_current_user(
    state: actix_web::State<State>,
    session: Session,
) -> Result<Json<UserData>> {
    let db = state.db.get()?;

    public_data(&*db, session.user()).map(Json)
}

/// Get user information.
///
/// Users can always see their own information.
///
/// ## Method
///
/// ```text
/// GET /users/:id
/// ```
pub fn get_user(
    state: actix_web::State<State>,
    session: Session,
    id: Path<i32>,
) -> Result<Json<UserData>> {
    let db = state.db.get()?;
    let id = id.into_inner();

    if id != session.user().id {
        session.permissions().require(PermissionBits::VIEW_USER)?;
    }

    let user = User::by_id(&*db, id)?;

    public_data(&*db, &user).map(Json)
}

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    role: String,
}

/// Assign a role to a user.
///
/// ## Method
///
/// ```text
/// PUT /users/:id/role
/// ```
pub fn modify_role(
    state: actix_web::State<State>,
    _session: Session<ChangeUser>,
    id: Path<i32>,
    change: Json<RoleChange>,
) -> Result<Json<UserData>> {
    let db = state.db.get()?;
    let mut user = User::by_id(&*db, id.into_inner())?;

    user.set_role(&*db, &change.role)?;

    public_data(&*db, &user).map(Json)
}
