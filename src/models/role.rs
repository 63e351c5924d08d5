use diesel::{
    Connection as _Connection,
    prelude::*,
    result::{DatabaseErrorKind, Error as DbError},
};

use crate::{
    audit,
    db::{
        Connection,
        models as db,
        schema::roles,
    },
    permissions::PermissionBits,
};

/// Role a user can take.
#[derive(Debug)]
pub struct Role {
    data: db::Role,
}

/// A subset of role's data that can safely be publicly exposed.
#[derive(Debug, Serialize)]
pub struct PublicData {
    id: i32,
    name: String,
    display_name: String,
    description: String,
    is_staff_role: bool,
    is_default_role: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    permissions: Option<PermissionBits>,
}

/// Definition of a role, as used when setting up roles.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RoleDefinition {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub is_staff_role: bool,
    #[serde(default)]
    pub is_default_role: bool,
    #[serde(default)]
    pub description: String,
}

/// Outcome of [`Role::setup`].
#[derive(Debug, Default)]
pub struct SetupReport {
    /// Names of roles which were created.
    pub created: Vec<String>,
    /// Names of roles which were overwritten.
    pub updated: Vec<String>,
    /// Names of roles which already existed and were left alone.
    pub skipped: Vec<String>,
}

/// Result of resolving a single permission codename.
#[derive(Debug)]
pub enum PermissionLine {
    Granted(String),
    InvalidFormat(String),
    NotFound(String),
}

/// Outcome of [`Role::setup_permissions`] for a single role.
#[derive(Debug)]
pub enum PermissionsReport {
    /// There is no role with this name.
    MissingRole(String),
    /// No permissions were listed for this role.
    NoPermissions(String),
    Applied {
        role: String,
        lines: Vec<PermissionLine>,
        /// Number of permissions which were resolved. If it is zero the
        /// role's permissions were left unchanged.
        granted: usize,
    },
}

impl Role {
    /// Construct `Role` from its database counterpart.
    pub(super) fn from_db(data: db::Role) -> Role {
        Role { data }
    }

    /// Get all roles, ordered by name.
    pub fn all(dbcon: &Connection) -> Result<Vec<Role>, DbError> {
        roles::table
            .order_by(roles::name.asc())
            .get_results::<db::Role>(dbcon)
            .map(|v| v.into_iter().map(Role::from_db).collect())
    }

    /// Find a role by ID.
    pub fn by_id(dbcon: &Connection, id: i32) -> Result<Role, FindRoleError> {
        roles::table
            .filter(roles::id.eq(id))
            .get_result::<db::Role>(dbcon)
            .optional()?
            .ok_or(FindRoleError::NotFound)
            .map(Role::from_db)
    }

    /// Find a role by its machine name.
    pub fn by_name(dbcon: &Connection, name: &str) -> Result<Role, FindRoleError> {
        roles::table
            .filter(roles::name.eq(name))
            .get_result::<db::Role>(dbcon)
            .optional()?
            .ok_or(FindRoleError::NotFound)
            .map(Role::from_db)
    }

    /// Find the role assigned to new users, if there is one.
    pub fn default(dbcon: &Connection) -> Result<Option<Role>, DbError> {
        roles::table
            .filter(roles::is_default_role.eq(true))
            .get_result::<db::Role>(dbcon)
            .optional()
            .map(|data| data.map(Role::from_db))
    }

    /// Create a new role.
    ///
    /// If the new role is the default role, it replaces the previous default.
    pub fn create(
        dbcon: &Connection,
        definition: &RoleDefinition,
        permissions: PermissionBits,
    ) -> Result<Role, CreateRoleError> {
        dbcon.transaction(|| {
            if definition.is_default_role {
                clear_default(dbcon, None)?;
            }

            let data = diesel::insert_into(roles::table)
                .values(db::NewRole {
                    name: &definition.name,
                    display_name: &definition.display_name,
                    description: &definition.description,
                    is_staff_role: definition.is_staff_role,
                    is_default_role: definition.is_default_role,
                    permissions: permissions.bits(),
                })
                .get_result::<db::Role>(dbcon)?;

            audit::log_db(dbcon, "roles", data.id, "create", LogNewRole {
                name: &data.name,
                display_name: &data.display_name,
                is_staff_role: data.is_staff_role,
                is_default_role: data.is_default_role,
                permissions: data.permissions,
            })?;

            Ok(Role::from_db(data))
        })
    }

    /// Delete this role.
    ///
    /// Users holding this role are left without a role.
    pub fn delete(self, dbcon: &Connection) -> Result<(), DbError> {
        dbcon.transaction(|| {
            audit::log_db(dbcon, "roles", self.data.id, "delete", ())?;
            diesel::delete(&self.data).execute(dbcon)?;
            Ok(())
        })
    }

    /// Get public portion of this role's data.
    ///
    /// Permissions are only included when `permissions` is true.
    pub fn get_public(&self, permissions: bool) -> PublicData {
        let db::Role {
            id, ref name, ref display_name, ref description, is_staff_role,
            is_default_role, ..
        } = self.data;

        PublicData {
            id,
            name: name.clone(),
            display_name: display_name.clone(),
            description: description.clone(),
            is_staff_role,
            is_default_role,
            permissions: if permissions {
                Some(self.permissions())
            } else {
                None
            },
        }
    }

    /// Get all permissions this role has.
    pub fn permissions(&self) -> PermissionBits {
        PermissionBits::from_bits_truncate(self.data.permissions)
    }

    /// Change this role's descriptive fields and flags.
    pub fn update(&mut self, dbcon: &Connection, change: db::RoleChange)
    -> Result<(), DbError> {
        let data = dbcon.transaction(|| {
            if change.is_default_role == Some(true) {
                clear_default(dbcon, Some(self.data.id))?;
            }

            audit::log_db(dbcon, "roles", self.data.id, "update", LogRoleChange {
                display_name: change.display_name,
                description: change.description,
                is_staff_role: change.is_staff_role,
                is_default_role: change.is_default_role,
            })?;

            diesel::update(&self.data)
                .set(change)
                .get_result::<db::Role>(dbcon)
        })?;

        self.data = data;

        Ok(())
    }

    /// Set this role's permissions.
    pub fn set_permissions(
        &mut self,
        dbcon: &Connection,
        permissions: PermissionBits,
    ) -> Result<(), DbError> {
        let data = dbcon.transaction(|| {
            audit::log_db(dbcon, "roles", self.data.id, "set-permissions",
                permissions.bits())?;

            diesel::update(&self.data)
                .set(roles::permissions.eq(permissions.bits()))
                .get_result::<db::Role>(dbcon)
        })?;

        self.data = data;

        Ok(())
    }

    /// Create roles from a list of definitions.
    ///
    /// Roles which already exist are left alone, unless `force` is set, in
    /// which case their display name, flags and description are overwritten.
    /// Permissions of existing roles are never changed here.
    pub fn setup(dbcon: &Connection, definitions: &[RoleDefinition], force: bool)
    -> Result<SetupReport, DbError> {
        let mut report = SetupReport::default();

        for definition in definitions {
            match Role::by_name(dbcon, &definition.name) {
                Ok(mut role) => if force {
                    role.update(dbcon, db::RoleChange {
                        display_name: Some(&definition.display_name),
                        description: Some(&definition.description),
                        is_staff_role: Some(definition.is_staff_role),
                        is_default_role: Some(definition.is_default_role),
                    })?;
                    report.updated.push(definition.name.clone());
                } else {
                    report.skipped.push(definition.name.clone());
                },
                Err(FindRoleError::NotFound) => {
                    let permissions = default_permissions(&definition.name)
                        .iter()
                        .filter_map(|name| PermissionBits::from_codename(name).ok())
                        .fold(PermissionBits::empty(), |acc, bits| acc | bits);

                    match Role::create(dbcon, definition, permissions) {
                        Ok(_) => (),
                        Err(CreateRoleError::Database(err)) => return Err(err),
                        // Only possible in a race with another process.
                        Err(CreateRoleError::Duplicate) => {
                            report.skipped.push(definition.name.clone());
                            continue;
                        }
                    }
                    report.created.push(definition.name.clone());
                }
                Err(FindRoleError::Database(err)) => return Err(err),
            }
        }

        Ok(report)
    }

    /// Replace permissions of named roles.
    ///
    /// Each entry gives a role name and a list of permission codenames. Names
    /// which don't resolve are reported and skipped; a role's permissions are
    /// only replaced when at least one name resolved.
    pub fn setup_permissions<'a, I>(dbcon: &Connection, sets: I)
    -> Result<Vec<PermissionsReport>, DbError>
    where
        I: IntoIterator<Item = (&'a str, &'a [String])>,
    {
        let mut reports = Vec::new();

        for (name, codenames) in sets {
            let mut role = match Role::by_name(dbcon, name) {
                Ok(role) => role,
                Err(FindRoleError::NotFound) => {
                    reports.push(PermissionsReport::MissingRole(name.to_string()));
                    continue;
                }
                Err(FindRoleError::Database(err)) => return Err(err),
            };

            if codenames.is_empty() {
                reports.push(PermissionsReport::NoPermissions(name.to_string()));
                continue;
            }

            let mut bits = PermissionBits::empty();
            let mut granted = 0;
            let lines = codenames.iter()
                .map(|codename| match PermissionBits::from_codename(codename) {
                    Ok(permission) => {
                        bits |= permission;
                        granted += 1;
                        PermissionLine::Granted(codename.clone())
                    }
                    Err(crate::permissions::ParseCodenameError::InvalidFormat(_)) =>
                        PermissionLine::InvalidFormat(codename.clone()),
                    Err(crate::permissions::ParseCodenameError::NotFound(_)) =>
                        PermissionLine::NotFound(codename.clone()),
                })
                .collect();

            if granted > 0 {
                role.set_permissions(dbcon, bits)?;
            }

            reports.push(PermissionsReport::Applied {
                role: name.to_string(),
                lines,
                granted,
            });
        }

        Ok(reports)
    }
}

impl std::ops::Deref for Role {
    type Target = db::Role;

    fn deref(&self) -> &db::Role {
        &self.data
    }
}

/// Unset the default flag on all roles, except `keep`.
fn clear_default(dbcon: &Connection, keep: Option<i32>) -> Result<(), DbError> {
    let query = roles::table.filter(roles::is_default_role.eq(true));

    match keep {
        Some(id) => diesel::update(query.filter(roles::id.ne(id)))
            .set(roles::is_default_role.eq(false))
            .execute(dbcon)?,
        None => diesel::update(query)
            .set(roles::is_default_role.eq(false))
            .execute(dbcon)?,
    };

    Ok(())
}

/// Built-in roles.
pub fn default_definitions() -> Vec<RoleDefinition> {
    vec![
        RoleDefinition {
            name: "student".to_string(),
            display_name: "Student".to_string(),
            is_staff_role: false,
            is_default_role: true,
            description: "Standard student role with basic access for schools"
                .to_string(),
        },
        RoleDefinition {
            name: "instructor".to_string(),
            display_name: "Instructor".to_string(),
            is_staff_role: true,
            is_default_role: false,
            description: "Teaching staff with course management access for schools"
                .to_string(),
        },
        RoleDefinition {
            name: "admin".to_string(),
            display_name: "Administrator".to_string(),
            is_staff_role: true,
            is_default_role: false,
            description: "Full administrative access for schools".to_string(),
        },
    ]
}

/// Permission codenames of a built-in role. Unknown roles have none.
pub fn default_permissions(role: &str) -> Vec<String> {
    match role {
        "student" => PermissionBits::student().codenames(),
        "instructor" => PermissionBits::instructor().codenames(),
        "admin" => PermissionBits::all().codenames(),
        _ => Vec::new(),
    }
}

#[derive(Serialize)]
struct LogNewRole<'a> {
    name: &'a str,
    display_name: &'a str,
    is_staff_role: bool,
    is_default_role: bool,
    permissions: i32,
}

#[derive(Serialize)]
struct LogRoleChange<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_staff_role: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_default_role: Option<bool>,
}

#[derive(ApiError, Debug, Fail)]
pub enum FindRoleError {
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Database(#[cause] DbError),
    /// No role found for given name or ID.
    #[fail(display = "No such role")]
    #[api(code = "role:not-found", status = "NOT_FOUND")]
    NotFound,
}

impl_from! { for FindRoleError ;
    DbError => |e| FindRoleError::Database(e),
}

#[derive(ApiError, Debug, Fail)]
pub enum CreateRoleError {
    /// Creation failed due to a database error.
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Database(#[cause] DbError),
    /// Duplicate role.
    #[fail(display = "Duplicate role")]
    #[api(code = "role:new:exists", status = "BAD_REQUEST")]
    Duplicate,
}

impl_from! { for CreateRoleError ;
    DbError => |e| match e {
        DbError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
            => CreateRoleError::Duplicate,
        _ => CreateRoleError::Database(e),
    },
}
