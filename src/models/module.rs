use diesel::{
    Connection as _Connection,
    dsl::max,
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
use super::school::School;

/// Maximum length of a module's title.
pub const MAX_TITLE_LENGTH: usize = 100;

/// A unit of instructional content within a school.
#[derive(Debug)]
pub struct Module {
    data: db::Module,
}

/// A subset of module's data that can safely be publicly exposed.
#[derive(Debug, Serialize)]
pub struct PublicData {
    id: i32,
    school: i32,
    title: String,
    description: String,
    position: i32,
}

impl Module {
    pub(super) fn from_db(data: db::Module) -> Module {
        Module { data }
    }

    /// Get all modules, ordered by school and position.
    pub fn all(dbcon: &Connection) -> Result<Vec<Module>, DbError> {
        modules::table
            .order_by((modules::school.asc(), modules::position.asc()))
            .get_results::<db::Module>(dbcon)
            .map(|v| v.into_iter().map(Module::from_db).collect())
    }

    /// Get all modules together with their schools, ordered by school and
    /// position.
    pub fn all_with_schools(dbcon: &Connection)
    -> Result<Vec<(Module, School)>, DbError> {
        modules::table
            .inner_join(schools::table)
            .order_by((modules::school.asc(), modules::position.asc()))
            .get_results::<(db::Module, db::School)>(dbcon)
            .map(|v| v.into_iter()
                .map(|(module, school)| (
                    Module::from_db(module),
                    School::from_db(school),
                ))
                .collect())
    }

    /// Find a module by ID.
    pub fn by_id(dbcon: &Connection, id: i32) -> Result<Module, FindModuleError> {
        modules::table
            .filter(modules::id.eq(id))
            .get_result::<db::Module>(dbcon)
            .optional()?
            .ok_or(FindModuleError::NotFound)
            .map(Module::from_db)
    }

    /// Create a new module in a school.
    ///
    /// When `position` is not given the module is placed after the last
    /// module of the school.
    pub fn create(
        dbcon: &Connection,
        school: &School,
        title: &str,
        description: &str,
        position: Option<i32>,
    ) -> Result<Module, CreateModuleError> {
        let title = validate_title(title)?;

        dbcon.transaction(|| {
            let position = match position {
                Some(position) => validate_position(position)?,
                None => next_position(dbcon, school.id)?,
            };

            let data = diesel::insert_into(modules::table)
                .values(db::NewModule {
                    school: school.id,
                    title,
                    description,
                    position,
                })
                .get_result::<db::Module>(dbcon)?;

            audit::log_db(dbcon, "modules", data.id, "create", LogModule {
                school: Some(data.school),
                title: Some(&data.title),
                position: Some(data.position),
            })?;

            Ok(Module { data })
        })
    }

    /// Change this module's title, description or position.
    pub fn update(&mut self, dbcon: &Connection, mut change: db::ModuleChange)
    -> Result<(), CreateModuleError> {
        if let Some(title) = change.title {
            change.title = Some(validate_title(title)?);
        }

        if let Some(position) = change.position {
            validate_position(position)?;
        }

        if change.title.is_none() && change.description.is_none()
        && change.position.is_none() {
            return Ok(());
        }

        let data = dbcon.transaction(|| {
            audit::log_db(dbcon, "modules", self.data.id, "update", LogModule {
                school: None,
                title: change.title,
                position: change.position,
            })?;

            diesel::update(&self.data)
                .set(change)
                .get_result::<db::Module>(dbcon)
        })?;

        self.data = data;

        Ok(())
    }

    /// Delete this module, together with its enrollments.
    pub fn delete(self, dbcon: &Connection) -> Result<(), DbError> {
        dbcon.transaction(|| {
            audit::log_db(dbcon, "modules", self.data.id, "delete", ())?;
            diesel::delete(&self.data).execute(dbcon)?;
            Ok(())
        })
    }

    /// Get the school this module belongs to.
    pub fn school(&self, dbcon: &Connection) -> Result<School, DbError> {
        schools::table
            .filter(schools::id.eq(self.data.school))
            .get_result::<db::School>(dbcon)
            .map(School::from_db)
    }

    /// Human readable name, `Title (School)`.
    pub fn display_name(&self, school: &School) -> String {
        format!("{} ({})", self.data.title, school.name)
    }

    /// Get the public portion of this module's data.
    pub fn get_public(&self) -> PublicData {
        let db::Module { id, school, ref title, ref description, position } =
            self.data;

        PublicData {
            id,
            school,
            title: title.clone(),
            description: description.clone(),
            position,
        }
    }
}

impl std::ops::Deref for Module {
    type Target = db::Module;

    fn deref(&self) -> &db::Module {
        &self.data
    }
}

/// Position after the last module of a school.
fn next_position(dbcon: &Connection, school: i32) -> Result<i32, CreateModuleError> {
    let last = modules::table
        .filter(modules::school.eq(school))
        .select(max(modules::position))
        .get_result::<Option<i32>>(dbcon)?;

    match last {
        None => Ok(1),
        Some(last) => last.checked_add(1).ok_or(CreateModuleError::InvalidPosition),
    }
}

/// Check a module's title, returning it without surrounding whitespace.
fn validate_title(title: &str) -> Result<&str, CreateModuleError> {
    let title = title.trim();

    if title.is_empty() {
        Err(CreateModuleError::EmptyTitle)
    } else if title.chars().count() > MAX_TITLE_LENGTH {
        Err(CreateModuleError::TitleTooLong)
    } else {
        Ok(title)
    }
}

fn validate_position(position: i32) -> Result<i32, CreateModuleError> {
    if position < 1 {
        Err(CreateModuleError::InvalidPosition)
    } else {
        Ok(position)
    }
}

#[derive(Serialize)]
struct LogModule<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    school: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<i32>,
}

#[derive(ApiError, Debug, Fail)]
pub enum FindModuleError {
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Internal(#[cause] DbError),
    #[fail(display = "No such module")]
    #[api(code = "module:not-found", status = "NOT_FOUND")]
    NotFound,
}

impl_from! { for FindModuleError ;
    DbError => |e| FindModuleError::Internal(e),
}

#[derive(ApiError, Debug, Fail)]
pub enum CreateModuleError {
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Internal(#[cause] DbError),
    /// Another module of the same school already occupies this position.
    #[fail(display = "Module with this school and position already exists")]
    #[api(code = "module:new:position-taken", status = "BAD_REQUEST")]
    PositionTaken,
    #[fail(display = "Module position must be at least 1")]
    #[api(code = "module:new:invalid-position", status = "BAD_REQUEST")]
    InvalidPosition,
    #[fail(display = "Module title can't be empty")]
    #[api(code = "module:new:empty-title", status = "BAD_REQUEST")]
    EmptyTitle,
    #[fail(display = "Module title can't be longer than 100 characters")]
    #[api(code = "module:new:title-too-long", status = "BAD_REQUEST")]
    TitleTooLong,
}

impl_from! { for CreateModuleError ;
    DbError => |e| match e {
        DbError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
            => CreateModuleError::PositionTaken,
        _ => CreateModuleError::Internal(e),
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_start_at_one() {
        assert!(matches!(validate_position(0),
            Err(CreateModuleError::InvalidPosition)));
        assert_eq!(validate_position(1).ok(), Some(1));
    }

    #[test]
    fn titles_are_validated() {
        assert!(matches!(validate_title(""), Err(CreateModuleError::EmptyTitle)));
        assert!(matches!(validate_title(&"m".repeat(101)),
            Err(CreateModuleError::TitleTooLong)));
        assert!(validate_title("Introduction to Ministry").is_ok());
    }

    #[test]
    fn titles_are_trimmed() {
        assert_eq!(validate_title("\tOld Testament\n").ok(), Some("Old Testament"));
    }
}
