use chrono::NaiveDateTime;
use diesel::{
    Connection as _Connection,
    prelude::*,
    result::{DatabaseErrorKind, Error as DbError},
};
use rand::RngCore;

use crate::{
    audit,
    db::{
        Connection,
        models as db,
        schema::{roles, sessions, users},
    },
    permissions::PermissionBits,
};
use super::role::Role;

static ARGON2_CONFIG: argon2::Config = argon2::Config {
    ad: &[],
    hash_length: 32,
    lanes: 1,
    mem_cost: 4096,
    secret: &[],
    thread_mode: argon2::ThreadMode::Sequential,
    time_cost: 3,
    variant: argon2::Variant::Argon2id,
    version: argon2::Version::Version13,
};

/// Shown in place of a role name for users without a role.
pub const NO_ROLE: &str = "No role assigned";

/// Maximum number of characters in a username.
pub const MAX_USERNAME_LENGTH: usize = 150;

/// A single user in the system.
#[derive(Debug)]
pub struct User {
    data: db::User,
}

/// A subset of user's data that can safely be publicly exposed.
#[derive(Debug, Serialize)]
pub struct PublicData {
    id: i32,
    username: String,
    first_name: String,
    last_name: String,
    is_staff: bool,
    is_superuser: bool,
    role: Option<String>,
    date_joined: NaiveDateTime,
}

/// Data needed to create a user.
#[derive(Clone, Copy, Debug)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub password: &'a str,
    pub is_superuser: bool,
}

/// A change of staff status caused by [`User::sync_staff_status`].
#[derive(Debug)]
pub struct StaffChange {
    pub username: String,
    pub role: String,
    pub was_staff: bool,
    pub is_staff: bool,
}

impl User {
    pub(super) fn from_db(data: db::User) -> User {
        User { data }
    }

    /// Get all users, ordered by username.
    pub fn all(dbcon: &Connection) -> Result<Vec<User>, DbError> {
        users::table
            .order_by(users::username.asc())
            .get_results::<db::User>(dbcon)
            .map(|v| v.into_iter().map(User::from_db).collect())
    }

    /// Find an user by ID.
    pub fn by_id(dbcon: &Connection, id: i32) -> Result<User, FindUserError> {
        users::table
            .filter(users::id.eq(id))
            .get_result::<db::User>(dbcon)
            .optional()?
            .ok_or(FindUserError::NotFound)
            .map(User::from_db)
    }

    /// Find an user by username.
    pub fn by_username(dbcon: &Connection, username: &str)
    -> Result<User, FindUserError> {
        users::table
            .filter(users::username.eq(username))
            .get_result::<db::User>(dbcon)
            .optional()?
            .ok_or(FindUserError::NotFound)
            .map(User::from_db)
    }

    /// Create a new user.
    ///
    /// Superusers are always staff, and are given the `admin` role (or the
    /// first staff role, if `admin` is not a staff role). Other users are
    /// given the default role, and their staff status follows it.
    pub fn create(dbcon: &Connection, new: NewUser)
    -> Result<User, CreateUserError> {
        validate_username(new.username)?;

        let (hash, salt) = hash_password(new.password)?;

        dbcon.transaction(|| {
            let role = if new.is_superuser {
                superuser_role(dbcon)?
            } else {
                Role::default(dbcon)?
            };

            let is_staff = new.is_superuser
                || role.as_ref().map_or(false, |role| role.is_staff_role);

            let data = diesel::insert_into(users::table)
                .values(db::NewUser {
                    username: new.username,
                    email: new.email,
                    first_name: new.first_name,
                    last_name: new.last_name,
                    password: &hash,
                    salt: &salt,
                    is_superuser: new.is_superuser,
                    is_staff,
                    role: role.as_ref().map(|role| role.id),
                })
                .get_result::<db::User>(dbcon)?;

            audit::log_db(dbcon, "users", data.id, "create", LogNewUser {
                username: &data.username,
                is_superuser: data.is_superuser,
                role: data.role,
            })?;

            Ok(User::from_db(data))
        })
    }

    /// Find an user for given username and try to authenticate as them.
    pub fn authenticate(dbcon: &Connection, username: &str, password: &str)
    -> Result<User, UserAuthenticateError> {
        let user = User::by_username(dbcon, username)?;

        if !user.check_password(password) {
            return Err(UserAuthenticateError::BadPassword);
        }

        if !user.is_active {
            return Err(UserAuthenticateError::Inactive);
        }

        Ok(user)
    }

    /// Verify correctness of a password.
    pub fn check_password(&self, password: &str) -> bool {
        argon2::verify_raw(
            password.as_bytes(),
            &self.data.salt,
            &self.data.password,
            &ARGON2_CONFIG,
        ).unwrap_or(false)
    }

    /// Get the public portion of this user's data.
    pub fn get_public(&self, role: Option<&Role>) -> PublicData {
        let db::User {
            id, ref username, ref first_name, ref last_name, is_staff,
            is_superuser, date_joined, ..
        } = self.data;

        PublicData {
            id,
            username: username.clone(),
            first_name: first_name.clone(),
            last_name: last_name.clone(),
            is_staff,
            is_superuser,
            role: role.map(|role| role.name.clone()),
            date_joined,
        }
    }

    /// Change user's password.
    ///
    /// All of the user's sessions are ended.
    pub fn change_password(&mut self, dbcon: &Connection, password: &str)
    -> Result<(), ChangePasswordError> {
        let (hash, salt) = hash_password(password)?;

        let data = dbcon.transaction(|| {
            diesel::delete(sessions::table.filter(sessions::user.eq(self.id)))
                .execute(dbcon)?;

            audit::log_db(dbcon, "users", self.data.id, "change-password", ())?;

            diesel::update(&self.data)
                .set(db::PasswordChange {
                    salt: &salt,
                    password: &hash,
                })
                .get_result::<db::User>(dbcon)
        })?;

        self.data = data;

        Ok(())
    }

    /// Get this user's role.
    pub fn role(&self, dbcon: &Connection) -> Result<Option<Role>, DbError> {
        match self.data.role {
            Some(id) => roles::table
                .filter(roles::id.eq(id))
                .get_result::<db::Role>(dbcon)
                .optional()
                .map(|data| data.map(Role::from_db)),
            None => Ok(None),
        }
    }

    /// Name of this user's role, or [`NO_ROLE`].
    pub fn role_name(&self, dbcon: &Connection) -> Result<String, DbError> {
        Ok(self.role(dbcon)?
            .map_or_else(|| NO_ROLE.to_string(), |role| role.name.clone()))
    }

    /// Does this user hold role `name`?
    pub fn has_role(&self, dbcon: &Connection, name: &str) -> Result<bool, DbError> {
        Ok(self.role(dbcon)?.map_or(false, |role| role.name == name))
    }

    /// Assign a role to this user, replacing any previous role.
    ///
    /// Staff status of non-superusers follows the new role.
    pub fn set_role(&mut self, dbcon: &Connection, name: &str)
    -> Result<(), SetRoleError> {
        dbcon.transaction(|| {
            let role = match Role::by_name(dbcon, name) {
                Ok(role) => role,
                Err(super::role::FindRoleError::NotFound) => {
                    let valid = Role::all(dbcon)?
                        .iter()
                        .map(|role| role.name.clone())
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Err(SetRoleError::InvalidRole(name.to_string(), valid));
                }
                Err(super::role::FindRoleError::Database(err)) =>
                    return Err(err.into()),
            };

            let is_staff = self.data.is_superuser || role.is_staff_role;

            audit::log_db(dbcon, "users", self.data.id, "set-role", role.id)?;

            self.data = diesel::update(&self.data)
                .set((
                    users::role.eq(role.id),
                    users::is_staff.eq(is_staff),
                ))
                .get_result::<db::User>(dbcon)?;

            Ok(())
        })
    }

    /// Activate or deactivate this user. Inactive users can't sign in.
    pub fn set_active(&mut self, dbcon: &Connection, is_active: bool)
    -> Result<(), DbError> {
        let data = dbcon.transaction(|| {
            audit::log_db(dbcon, "users", self.data.id, "set-active", is_active)?;

            diesel::update(&self.data)
                .set(users::is_active.eq(is_active))
                .get_result::<db::User>(dbcon)
        })?;

        self.data = data;

        Ok(())
    }

    /// Get the permissions this user holds.
    ///
    /// Superusers hold all permissions, other users hold those of their role.
    pub fn permissions(&self, dbcon: &Connection) -> Result<PermissionBits, DbError> {
        if self.data.is_superuser {
            return Ok(PermissionBits::all());
        }

        Ok(self.role(dbcon)?
            .map_or_else(PermissionBits::empty, |role| role.permissions()))
    }

    /// Bring staff status of all users in line with their roles.
    ///
    /// Superusers and users without a role are left unchanged.
    pub fn sync_staff_status(dbcon: &Connection)
    -> Result<Vec<StaffChange>, DbError> {
        let rows = users::table
            .inner_join(roles::table)
            .filter(users::is_superuser.eq(false))
            .filter(users::is_staff.ne(roles::is_staff_role))
            .order_by(users::username.asc())
            .get_results::<(db::User, db::Role)>(dbcon)?;

        let mut changes = Vec::with_capacity(rows.len());

        for (user, role) in rows {
            diesel::update(&user)
                .set(users::is_staff.eq(role.is_staff_role))
                .execute(dbcon)?;

            changes.push(StaffChange {
                username: user.username,
                role: role.name,
                was_staff: user.is_staff,
                is_staff: role.is_staff_role,
            });
        }

        Ok(changes)
    }
}

impl std::ops::Deref for User {
    type Target = db::User;

    fn deref(&self) -> &db::User {
        &self.data
    }
}

/// Generate salt and hash password.
fn hash_password(password: &str) -> Result<(Vec<u8>, [u8; 16]), argon2::Error> {
    let mut salt = [0; 16];
    rand::thread_rng().fill_bytes(&mut salt);

    let hash = argon2::hash_raw(password.as_bytes(), &salt, &ARGON2_CONFIG)?;

    Ok((hash, salt))
}

/// Select the role given to a new superuser.
fn superuser_role(dbcon: &Connection) -> Result<Option<Role>, DbError> {
    let staff = roles::table
        .filter(roles::is_staff_role.eq(true))
        .order_by(roles::id.asc())
        .get_results::<db::Role>(dbcon)?;

    if let Some(admin) = staff.iter().find(|role| role.name == "admin") {
        return Ok(Some(Role::from_db(admin.clone())));
    }

    if let Some(first) = staff.into_iter().next() {
        return Ok(Some(Role::from_db(first)));
    }

    let admin = roles::table
        .filter(roles::name.eq("admin"))
        .get_result::<db::Role>(dbcon)
        .optional()?;

    match admin {
        Some(admin) => {
            // Superusers are staff, so their role should be too.
            let admin = diesel::update(&admin)
                .set(roles::is_staff_role.eq(true))
                .get_result::<db::Role>(dbcon)?;
            Ok(Some(Role::from_db(admin)))
        }
        None => Ok(None),
    }
}

/// Check that a username is non-empty, not too long, and only uses letters,
/// numbers, and `@.+-_`.
pub fn validate_username(username: &str) -> Result<(), CreateUserError> {
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(CreateUserError::UsernameTooLong);
    }

    let valid = !username.is_empty() && username.chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c));

    if valid {
        Ok(())
    } else {
        Err(CreateUserError::InvalidUsername)
    }
}

#[derive(Serialize)]
struct LogNewUser<'a> {
    username: &'a str,
    is_superuser: bool,
    role: Option<i32>,
}

#[derive(ApiError, Debug, Fail)]
pub enum FindUserError {
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Internal(#[cause] DbError),
    /// No user found for given username or ID.
    #[fail(display = "No such user")]
    #[api(code = "user:not-found", status = "NOT_FOUND")]
    NotFound,
}

impl_from! { for FindUserError ;
    DbError => |e| FindUserError::Internal(e),
}

#[derive(ApiError, Debug, Fail)]
pub enum CreateUserError {
    /// Creation failed due to a database error.
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Internal(#[cause] DbError),
    #[fail(display = "Cannot hash password: {}", _0)]
    #[api(internal)]
    Hash(#[cause] argon2::Error),
    /// Duplicate user.
    #[fail(display = "A user with that username already exists")]
    #[api(code = "user:new:exists", status = "BAD_REQUEST")]
    Duplicate,
    #[fail(display = "Enter a valid username. This value may contain only \
        letters, numbers, and @/./+/-/_ characters.")]
    #[api(code = "user:new:invalid-username", status = "BAD_REQUEST")]
    InvalidUsername,
    #[fail(display = "Ensure the username has at most 150 characters")]
    #[api(code = "user:new:username-too-long", status = "BAD_REQUEST")]
    UsernameTooLong,
}

impl_from! { for CreateUserError ;
    argon2::Error => |e| CreateUserError::Hash(e),
    DbError => |e| match e {
        DbError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
            => CreateUserError::Duplicate,
        _ => CreateUserError::Internal(e),
    },
}

#[derive(ApiError, Debug, Fail)]
pub enum UserAuthenticateError {
    /// Authentication failed due to a database error.
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Internal(#[cause] DbError),
    /// No user found for given username.
    #[fail(display = "No such user")]
    #[api(code = "user:not-found", status = "NOT_FOUND")]
    NotFound,
    /// Provided password was not valid for the user.
    #[fail(display = "Bad password")]
    #[api(code = "user:authenticate:bad-password", status = "BAD_REQUEST")]
    BadPassword,
    #[fail(display = "This account is inactive")]
    #[api(code = "user:authenticate:inactive", status = "FORBIDDEN")]
    Inactive,
}

impl_from! { for UserAuthenticateError ;
    DbError => |e| UserAuthenticateError::Internal(e),
    FindUserError => |e| match e {
        FindUserError::Internal(e) => UserAuthenticateError::Internal(e),
        FindUserError::NotFound => UserAuthenticateError::NotFound,
    },
}

#[derive(ApiError, Debug, Fail)]
pub enum ChangePasswordError {
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Internal(#[cause] DbError),
    #[fail(display = "Cannot hash password: {}", _0)]
    #[api(internal)]
    Hash(#[cause] argon2::Error),
}

impl_from! { for ChangePasswordError ;
    DbError => |e| ChangePasswordError::Internal(e),
    argon2::Error => |e| ChangePasswordError::Hash(e),
}

#[derive(ApiError, Debug, Fail)]
pub enum SetRoleError {
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Internal(#[cause] DbError),
    #[fail(display = "Invalid role: {}. Valid roles: {}", _0, _1)]
    #[api(code = "user:set-role:invalid-role", status = "BAD_REQUEST")]
    InvalidRole(String, String),
}

impl_from! { for SetRoleError ;
    DbError => |e| SetRoleError::Internal(e),
}
