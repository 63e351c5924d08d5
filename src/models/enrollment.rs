use chrono::NaiveDate;
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
        schema::{enrollments, modules, users},
    },
};
use super::{module::Module, user::User};

/// Only users holding this role may be enrolled in modules.
pub const STUDENT_ROLE: &str = "student";

/// A student's enrollment in a module.
#[derive(Debug)]
pub struct Enrollment {
    data: db::Enrollment,
}

/// A subset of enrollment's data that can safely be publicly exposed.
#[derive(Debug, Serialize)]
pub struct PublicData {
    id: i32,
    student: i32,
    module: i32,
    date_enrolled: NaiveDate,
    completed: bool,
}

impl Enrollment {
    /// Get all enrollments, newest first.
    pub fn all(dbcon: &Connection) -> Result<Vec<Enrollment>, DbError> {
        enrollments::table
            .order_by((enrollments::date_enrolled.desc(), enrollments::id.desc()))
            .get_results::<db::Enrollment>(dbcon)
            .map(|v| v.into_iter().map(|data| Enrollment { data }).collect())
    }

    /// Get all enrollments of a student, together with their modules.
    pub fn of_student(dbcon: &Connection, student: &User)
    -> Result<Vec<(Enrollment, Module)>, DbError> {
        enrollments::table
            .inner_join(modules::table)
            .filter(enrollments::student.eq(student.id))
            .order_by((modules::school.asc(), modules::position.asc()))
            .get_results::<(db::Enrollment, db::Module)>(dbcon)
            .map(|v| v.into_iter()
                .map(|(data, module)| (Enrollment { data }, Module::from_db(module)))
                .collect())
    }

    /// Find an enrollment by ID.
    pub fn by_id(dbcon: &Connection, id: i32)
    -> Result<Enrollment, FindEnrollmentError> {
        enrollments::table
            .filter(enrollments::id.eq(id))
            .get_result::<db::Enrollment>(dbcon)
            .optional()?
            .ok_or(FindEnrollmentError::NotFound)
            .map(|data| Enrollment { data })
    }

    /// Enroll a student in a module.
    pub fn create(dbcon: &Connection, student: &User, module: &Module)
    -> Result<Enrollment, CreateEnrollmentError> {
        dbcon.transaction(|| {
            if !student.has_role(dbcon, STUDENT_ROLE)? {
                return Err(CreateEnrollmentError::NotAStudent);
            }

            let data = diesel::insert_into(enrollments::table)
                .values(db::NewEnrollment {
                    student: student.id,
                    module: module.id,
                    completed: false,
                })
                .get_result::<db::Enrollment>(dbcon)?;

            audit::log_db(dbcon, "enrollments", data.id, "create", LogEnrollment {
                student: Some(data.student),
                module: Some(data.module),
                completed: None,
            })?;

            Ok(Enrollment { data })
        })
    }

    /// Mark this enrollment as completed, or not.
    pub fn set_completed(&mut self, dbcon: &Connection, completed: bool)
    -> Result<(), DbError> {
        let data = dbcon.transaction(|| {
            audit::log_db(dbcon, "enrollments", self.data.id, "update",
                LogEnrollment {
                    student: None,
                    module: None,
                    completed: Some(completed),
                })?;

            diesel::update(&self.data)
                .set(enrollments::completed.eq(completed))
                .get_result::<db::Enrollment>(dbcon)
        })?;

        self.data = data;

        Ok(())
    }

    /// Delete this enrollment.
    pub fn delete(self, dbcon: &Connection) -> Result<(), DbError> {
        dbcon.transaction(|| {
            audit::log_db(dbcon, "enrollments", self.data.id, "delete", ())?;
            diesel::delete(&self.data).execute(dbcon)?;
            Ok(())
        })
    }

    /// Human readable name, `username in Module title`.
    pub fn display_name(&self, dbcon: &Connection) -> Result<String, DbError> {
        let username = users::table
            .filter(users::id.eq(self.data.student))
            .select(users::username)
            .get_result::<String>(dbcon)?;
        let title = modules::table
            .filter(modules::id.eq(self.data.module))
            .select(modules::title)
            .get_result::<String>(dbcon)?;

        Ok(format!("{} in {}", username, title))
    }

    /// Get the public portion of this enrollment's data.
    pub fn get_public(&self) -> PublicData {
        let db::Enrollment { id, student, module, date_enrolled, completed } =
            self.data;

        PublicData { id, student, module, date_enrolled, completed }
    }
}

impl std::ops::Deref for Enrollment {
    type Target = db::Enrollment;

    fn deref(&self) -> &db::Enrollment {
        &self.data
    }
}

#[derive(Serialize)]
struct LogEnrollment {
    #[serde(skip_serializing_if = "Option::is_none")]
    student: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    module: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed: Option<bool>,
}

#[derive(ApiError, Debug, Fail)]
pub enum FindEnrollmentError {
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Internal(#[cause] DbError),
    #[fail(display = "No such enrollment")]
    #[api(code = "enrollment:not-found", status = "NOT_FOUND")]
    NotFound,
}

impl_from! { for FindEnrollmentError ;
    DbError => |e| FindEnrollmentError::Internal(e),
}

#[derive(ApiError, Debug, Fail)]
pub enum CreateEnrollmentError {
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Internal(#[cause] DbError),
    /// Only students can be enrolled.
    #[fail(display = "Only users with the student role can be enrolled")]
    #[api(code = "enrollment:new:not-a-student", status = "BAD_REQUEST")]
    NotAStudent,
    /// The student is already enrolled in this module.
    #[fail(display = "Student is already enrolled in this module")]
    #[api(code = "enrollment:new:exists", status = "BAD_REQUEST")]
    AlreadyEnrolled,
}

impl_from! { for CreateEnrollmentError ;
    DbError => |e| match e {
        DbError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
            => CreateEnrollmentError::AlreadyEnrolled,
        _ => CreateEnrollmentError::Internal(e),
    },
}
