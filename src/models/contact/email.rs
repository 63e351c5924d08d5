use chrono::Utc;
use diesel::{
    Connection as _Connection,
    prelude::*,
    result::{DatabaseErrorKind, Error as DbError},
};
use validator::ValidateEmail;

use crate::db::{
    Connection,
    models as db,
    schema::email_addresses,
};

/// An email address at which the organisation can be reached.
#[derive(Debug)]
pub struct EmailAddress {
    data: db::EmailAddress,
}

/// Editable fields of an email address.
#[derive(Clone, Debug, Deserialize)]
pub struct EmailAddressData {
    pub email: String,
    #[serde(default = "super::default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Serialize)]
pub struct PublicData {
    id: i32,
    email: String,
    mailto_link: String,
    is_primary: bool,
}

impl EmailAddress {
    /// Get all addresses, by position and address.
    pub fn all(dbcon: &Connection) -> Result<Vec<EmailAddress>, DbError> {
        email_addresses::table
            .order_by((email_addresses::position.asc(), email_addresses::email.asc()))
            .get_results::<db::EmailAddress>(dbcon)
            .map(|v| v.into_iter().map(|data| EmailAddress { data }).collect())
    }

    /// Get all addresses which should be displayed.
    pub fn active(dbcon: &Connection) -> Result<Vec<EmailAddress>, DbError> {
        email_addresses::table
            .filter(email_addresses::is_active.eq(true))
            .order_by((email_addresses::position.asc(), email_addresses::email.asc()))
            .get_results::<db::EmailAddress>(dbcon)
            .map(|v| v.into_iter().map(|data| EmailAddress { data }).collect())
    }

    pub fn by_id(dbcon: &Connection, id: i32)
    -> Result<EmailAddress, super::FindContactError> {
        email_addresses::table
            .filter(email_addresses::id.eq(id))
            .get_result::<db::EmailAddress>(dbcon)
            .optional()?
            .ok_or(super::FindContactError::NotFound)
            .map(|data| EmailAddress { data })
    }

    /// The primary address, to which contact messages are sent.
    pub fn primary(dbcon: &Connection) -> Result<Option<EmailAddress>, DbError> {
        email_addresses::table
            .filter(email_addresses::is_primary.eq(true))
            .get_result::<db::EmailAddress>(dbcon)
            .optional()
            .map(|data| data.map(|data| EmailAddress { data }))
    }

    pub fn create(dbcon: &Connection, data: &EmailAddressData)
    -> Result<EmailAddress, SaveEmailAddressError> {
        let email = validate(&data.email)?;
        let is_primary = data.is_active && data.is_primary;

        dbcon.transaction(|| {
            if is_primary {
                clear_primary(dbcon, None)?;
            }

            diesel::insert_into(email_addresses::table)
                .values(db::NewEmailAddress {
                    email,
                    is_active: data.is_active,
                    is_primary,
                    position: data.position,
                })
                .get_result::<db::EmailAddress>(dbcon)
                .map(|data| EmailAddress { data })
                .map_err(Into::into)
        })
    }

    pub fn update(&mut self, dbcon: &Connection, data: &EmailAddressData)
    -> Result<(), SaveEmailAddressError> {
        let email = validate(&data.email)?;
        let is_primary = data.is_active && data.is_primary;

        let updated = dbcon.transaction(|| {
            if is_primary {
                clear_primary(dbcon, Some(self.data.id))?;
            }

            diesel::update(&self.data)
                .set((
                    email_addresses::email.eq(email),
                    email_addresses::is_active.eq(data.is_active),
                    email_addresses::is_primary.eq(is_primary),
                    email_addresses::position.eq(data.position),
                    email_addresses::updated_at.eq(Utc::now().naive_utc()),
                ))
                .get_result::<db::EmailAddress>(dbcon)
        })?;

        self.data = updated;

        Ok(())
    }

    pub fn delete(self, dbcon: &Connection) -> Result<(), DbError> {
        diesel::delete(&self.data).execute(dbcon)?;
        Ok(())
    }

    pub fn mailto_link(&self) -> String {
        format!("mailto:{}", self.data.email)
    }

    pub fn get_public(&self) -> PublicData {
        PublicData {
            id: self.data.id,
            email: self.data.email.clone(),
            mailto_link: self.mailto_link(),
            is_primary: self.data.is_primary,
        }
    }
}

impl std::ops::Deref for EmailAddress {
    type Target = db::EmailAddress;

    fn deref(&self) -> &db::EmailAddress {
        &self.data
    }
}

fn clear_primary(dbcon: &Connection, keep: Option<i32>) -> Result<(), DbError> {
    diesel::update(email_addresses::table
        .filter(email_addresses::is_primary.eq(true))
        .filter(email_addresses::id.ne(keep.unwrap_or(0))))
        .set(email_addresses::is_primary.eq(false))
        .execute(dbcon)?;
    Ok(())
}

/// Check that an address is a valid email address on a dotted domain, such
/// as `local@domain.tld`.
pub fn validate(email: &str) -> Result<&str, SaveEmailAddressError> {
    let email = email.trim();
    let domain = email.rsplit('@').next().unwrap_or_default();

    if !email.validate_email() || !domain.contains('.') || domain.ends_with('.') {
        return Err(SaveEmailAddressError::InvalidEmail(email.to_string()));
    }

    Ok(email)
}

#[derive(ApiError, Debug, Fail)]
pub enum SaveEmailAddressError {
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Internal(#[cause] DbError),
    #[fail(display = "Enter a valid email address, got {:?}", _0)]
    #[api(code = "contact:email:invalid", status = "BAD_REQUEST")]
    InvalidEmail(String),
    #[fail(display = "Email address already exists")]
    #[api(code = "contact:email:exists", status = "BAD_REQUEST")]
    Duplicate,
}

impl_from! { for SaveEmailAddressError ;
    DbError => |e| match e {
        DbError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
            => SaveEmailAddressError::Duplicate,
        _ => SaveEmailAddressError::Internal(e),
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_addresses() {
        assert_eq!(validate(" info@gci.org ").unwrap(), "info@gci.org");
        assert!(validate("first.last+schools@mail.gci.org").is_ok());
        for bad in &[
            "", "info", "@gci.org", "info@gci", "info@.org", "in fo@gci.org",
            "info@@gci.org", "info@gci.org.",
        ] {
            assert!(validate(bad).is_err(), "{}", bad);
        }
    }
}
