//! Data and behaviours modelled as objects.

use crate::db::Connection;

pub mod contact;
pub mod enrollment;
pub mod module;
pub mod org;
pub mod password;
pub mod role;
pub mod school;
pub mod user;

pub use self::{
    enrollment::Enrollment,
    module::Module,
    role::Role,
    school::School,
    user::User,
};

/// Make sure data every deployment expects is present.
///
/// This runs after migrations: built-in roles are created if missing, blank
/// organisation details are added, and staff status of users is brought in
/// line with their roles.
pub fn post_migrate(dbcon: &Connection) -> crate::Result<()> {
    use diesel::Connection as _;

    dbcon.transaction(|| -> crate::Result<()> {
        let report = Role::setup(dbcon, &role::default_definitions(), false)?;
        if !report.created.is_empty() {
            info!("Created roles: {}", report.created.join(", "));
        }

        org::ensure_rows(dbcon)?;

        let changes = User::sync_staff_status(dbcon)?;
        if !changes.is_empty() {
            info!("Updated staff status for {} users", changes.len());
        }

        Ok(())
    })
}
