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
        schema::{modules, schools},
    },
};
use super::module::Module;

/// Maximum length of a school's name.
pub const MAX_NAME_LENGTH: usize = 100;

/// A training programme track, such as Foundation or Ministry.
#[derive(Debug)]
pub struct School {
    data: db::School,
}

/// A subset of school's data that can safely be publicly exposed.
#[derive(Debug, Serialize)]
pub struct PublicData {
    id: i32,
    name: String,
    description: String,
}

impl School {
    /// Get all schools, ordered by name.
    pub fn all(dbcon: &Connection) -> Result<Vec<School>, DbError> {
        schools::table
            .order_by(schools::name.asc())
            .get_results::<db::School>(dbcon)
            .map(|v| v.into_iter().map(|data| School { data }).collect())
    }

    /// Find a school by ID.
    pub fn by_id(dbcon: &Connection, id: i32) -> Result<School, FindSchoolError> {
        schools::table
            .filter(schools::id.eq(id))
            .get_result::<db::School>(dbcon)
            .optional()?
            .ok_or(FindSchoolError::NotFound)
            .map(|data| School { data })
    }

    /// Find a school by name.
    pub fn by_name(dbcon: &Connection, name: &str)
    -> Result<School, FindSchoolError> {
        schools::table
            .filter(schools::name.eq(name))
            .get_result::<db::School>(dbcon)
            .optional()?
            .ok_or(FindSchoolError::NotFound)
            .map(|data| School { data })
    }

    /// Create a new school.
    pub fn create(dbcon: &Connection, name: &str, description: &str)
    -> Result<School, CreateSchoolError> {
        let name = validate_name(name)?;

        dbcon.transaction(|| {
            let data = diesel::insert_into(schools::table)
                .values(db::NewSchool { name, description })
                .get_result::<db::School>(dbcon)?;

            audit::log_db(dbcon, "schools", data.id, "create", LogSchool {
                name: Some(&data.name),
                description: Some(&data.description),
            })?;

            Ok(School { data })
        })
    }

    /// Change this school's name or description.
    pub fn update(&mut self, dbcon: &Connection, mut change: db::SchoolChange)
    -> Result<(), CreateSchoolError> {
        if let Some(name) = change.name {
            change.name = Some(validate_name(name)?);
        }

        if change.name.is_none() && change.description.is_none() {
            return Ok(());
        }

        let data = dbcon.transaction(|| {
            audit::log_db(dbcon, "schools", self.data.id, "update", LogSchool {
                name: change.name,
                description: change.description,
            })?;

            diesel::update(&self.data)
                .set(change)
                .get_result::<db::School>(dbcon)
        })?;

        self.data = data;

        Ok(())
    }

    /// Delete this school, together with its modules and their enrollments.
    pub fn delete(self, dbcon: &Connection) -> Result<(), DbError> {
        dbcon.transaction(|| {
            audit::log_db(dbcon, "schools", self.data.id, "delete", ())?;
            diesel::delete(&self.data).execute(dbcon)?;
            Ok(())
        })
    }

    /// Get all modules of this school, in order.
    pub fn modules(&self, dbcon: &Connection) -> Result<Vec<Module>, DbError> {
        db::Module::belonging_to(&self.data)
            .order_by(modules::position.asc())
            .get_results::<db::Module>(dbcon)
            .map(|v| v.into_iter().map(Module::from_db).collect())
    }

    /// Get the public portion of this school's data.
    pub fn get_public(&self) -> PublicData {
        let db::School { id, ref name, ref description } = self.data;

        PublicData {
            id,
            name: name.clone(),
            description: description.clone(),
        }
    }

    pub(super) fn from_db(data: db::School) -> School {
        School { data }
    }
}

impl std::ops::Deref for School {
    type Target = db::School;

    fn deref(&self) -> &db::School {
        &self.data
    }
}

impl std::fmt::Display for School {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.write_str(&self.data.name)
    }
}

/// Check a school's name, returning it without surrounding whitespace.
fn validate_name(name: &str) -> Result<&str, CreateSchoolError> {
    let name = name.trim();

    if name.is_empty() {
        Err(CreateSchoolError::EmptyName)
    } else if name.chars().count() > MAX_NAME_LENGTH {
        Err(CreateSchoolError::NameTooLong)
    } else {
        Ok(name)
    }
}

#[derive(Serialize)]
struct LogSchool<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(ApiError, Debug, Fail)]
pub enum FindSchoolError {
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Internal(#[cause] DbError),
    #[fail(display = "No such school")]
    #[api(code = "school:not-found", status = "NOT_FOUND")]
    NotFound,
}

impl_from! { for FindSchoolError ;
    DbError => |e| FindSchoolError::Internal(e),
}

#[derive(ApiError, Debug, Fail)]
pub enum CreateSchoolError {
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Internal(#[cause] DbError),
    /// There already is a school with this name.
    #[fail(display = "School with this name already exists")]
    #[api(code = "school:new:exists", status = "BAD_REQUEST")]
    Duplicate,
    #[fail(display = "School name can't be empty")]
    #[api(code = "school:new:empty-name", status = "BAD_REQUEST")]
    EmptyName,
    #[fail(display = "School name can't be longer than 100 characters")]
    #[api(code = "school:new:name-too-long", status = "BAD_REQUEST")]
    NameTooLong,
}

impl_from! { for CreateSchoolError ;
    DbError => |e| match e {
        DbError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
            => CreateSchoolError::Duplicate,
        _ => CreateSchoolError::Internal(e),
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_validated() {
        assert!(validate_name("Foundation").is_ok());
        assert!(matches!(validate_name("   "), Err(CreateSchoolError::EmptyName)));
        assert!(matches!(validate_name(&"x".repeat(101)),
            Err(CreateSchoolError::NameTooLong)));
        assert!(validate_name(&"x".repeat(100)).is_ok());
    }

    #[test]
    fn names_are_trimmed() {
        assert_eq!(validate_name(" Foundation ").ok(), Some("Foundation"));
        let padded = format!("  {}  ", "x".repeat(100));
        assert_eq!(validate_name(&padded).ok().map(str::len), Some(100));
    }
}
