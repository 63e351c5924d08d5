use chrono::Utc;
use diesel::{
    Connection as _Connection,
    prelude::*,
    result::{DatabaseErrorKind, Error as DbError},
};

use crate::db::{
    Connection,
    models as db,
    schema::phone_numbers,
};

/// Calling code assumed for numbers written without one.
pub const DEFAULT_CALLING_CODE: &str = "254";

/// A phone number at which the organisation can be reached.
#[derive(Debug)]
pub struct PhoneNumber {
    data: db::PhoneNumber,
}

/// Editable fields of a phone number.
#[derive(Clone, Debug, Deserialize)]
pub struct PhoneNumberData {
    /// Number in any common notation; it is stored normalised.
    pub number: String,
    #[serde(default = "super::default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub use_for_whatsapp: bool,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Serialize)]
pub struct PublicData {
    id: i32,
    number: String,
    national: String,
    international: String,
    tel_link: String,
    whatsapp_link: Option<String>,
    is_primary: bool,
}

impl PhoneNumber {
    /// Get all phone numbers, by position and number.
    pub fn all(dbcon: &Connection) -> Result<Vec<PhoneNumber>, DbError> {
        phone_numbers::table
            .order_by((phone_numbers::position.asc(), phone_numbers::number.asc()))
            .get_results::<db::PhoneNumber>(dbcon)
            .map(|v| v.into_iter().map(|data| PhoneNumber { data }).collect())
    }

    /// Get all phone numbers which should be displayed.
    pub fn active(dbcon: &Connection) -> Result<Vec<PhoneNumber>, DbError> {
        phone_numbers::table
            .filter(phone_numbers::is_active.eq(true))
            .order_by((phone_numbers::position.asc(), phone_numbers::number.asc()))
            .get_results::<db::PhoneNumber>(dbcon)
            .map(|v| v.into_iter().map(|data| PhoneNumber { data }).collect())
    }

    pub fn by_id(dbcon: &Connection, id: i32) -> Result<PhoneNumber, super::FindContactError> {
        phone_numbers::table
            .filter(phone_numbers::id.eq(id))
            .get_result::<db::PhoneNumber>(dbcon)
            .optional()?
            .ok_or(super::FindContactError::NotFound)
            .map(|data| PhoneNumber { data })
    }

    /// The primary phone number, if any.
    pub fn primary(dbcon: &Connection) -> Result<Option<PhoneNumber>, DbError> {
        phone_numbers::table
            .filter(phone_numbers::is_primary.eq(true))
            .get_result::<db::PhoneNumber>(dbcon)
            .optional()
            .map(|data| data.map(|data| PhoneNumber { data }))
    }

    /// The number used for WhatsApp, if any.
    pub fn whatsapp(dbcon: &Connection) -> Result<Option<PhoneNumber>, DbError> {
        phone_numbers::table
            .filter(phone_numbers::use_for_whatsapp.eq(true))
            .get_result::<db::PhoneNumber>(dbcon)
            .optional()
            .map(|data| data.map(|data| PhoneNumber { data }))
    }

    pub fn create(dbcon: &Connection, data: &PhoneNumberData)
    -> Result<PhoneNumber, SavePhoneNumberError> {
        let number = normalize(&data.number)?;
        let (is_primary, use_for_whatsapp) = flags(data);

        dbcon.transaction(|| {
            clear_flags(dbcon, None, is_primary, use_for_whatsapp)?;

            diesel::insert_into(phone_numbers::table)
                .values(db::NewPhoneNumber {
                    number: &number,
                    is_active: data.is_active,
                    is_primary,
                    use_for_whatsapp,
                    position: data.position,
                })
                .get_result::<db::PhoneNumber>(dbcon)
                .map(|data| PhoneNumber { data })
                .map_err(Into::into)
        })
    }

    pub fn update(&mut self, dbcon: &Connection, data: &PhoneNumberData)
    -> Result<(), SavePhoneNumberError> {
        let number = normalize(&data.number)?;
        let (is_primary, use_for_whatsapp) = flags(data);

        let updated = dbcon.transaction(|| {
            clear_flags(dbcon, Some(self.data.id), is_primary, use_for_whatsapp)?;

            diesel::update(&self.data)
                .set((
                    phone_numbers::number.eq(&number),
                    phone_numbers::is_active.eq(data.is_active),
                    phone_numbers::is_primary.eq(is_primary),
                    phone_numbers::use_for_whatsapp.eq(use_for_whatsapp),
                    phone_numbers::position.eq(data.position),
                    phone_numbers::updated_at.eq(Utc::now().naive_utc()),
                ))
                .get_result::<db::PhoneNumber>(dbcon)
        })?;

        self.data = updated;

        Ok(())
    }

    pub fn delete(self, dbcon: &Connection) -> Result<(), DbError> {
        diesel::delete(&self.data).execute(dbcon)?;
        Ok(())
    }

    /// Number in national notation, e.g. `0712 345678`.
    pub fn national(&self) -> String {
        national_format(&self.data.number)
    }

    /// Number in international notation, e.g. `+254 712 345678`.
    pub fn international(&self) -> String {
        international_format(&self.data.number)
    }

    pub fn tel_link(&self) -> String {
        format!("tel:{}", self.data.number)
    }

    /// Link opening a WhatsApp chat, only for the WhatsApp number.
    pub fn whatsapp_link(&self) -> Option<String> {
        if self.data.use_for_whatsapp {
            Some(whatsapp_link(&self.data.number))
        } else {
            None
        }
    }

    pub fn get_public(&self) -> PublicData {
        PublicData {
            id: self.data.id,
            number: self.data.number.clone(),
            national: self.national(),
            international: self.international(),
            tel_link: self.tel_link(),
            whatsapp_link: self.whatsapp_link(),
            is_primary: self.data.is_primary,
        }
    }
}

impl std::ops::Deref for PhoneNumber {
    type Target = db::PhoneNumber;

    fn deref(&self) -> &db::PhoneNumber {
        &self.data
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.write_str(&self.international())
    }
}

/// Inactive numbers can be neither primary nor used for WhatsApp.
fn flags(data: &PhoneNumberData) -> (bool, bool) {
    if data.is_active {
        (data.is_primary, data.use_for_whatsapp)
    } else {
        (false, false)
    }
}

/// Take primary and WhatsApp flags away from all numbers but `keep`.
fn clear_flags(
    dbcon: &Connection,
    keep: Option<i32>,
    primary: bool,
    whatsapp: bool,
) -> Result<(), DbError> {
    let keep = keep.unwrap_or(0);

    if primary {
        diesel::update(phone_numbers::table
            .filter(phone_numbers::is_primary.eq(true))
            .filter(phone_numbers::id.ne(keep)))
            .set(phone_numbers::is_primary.eq(false))
            .execute(dbcon)?;
    }

    if whatsapp {
        diesel::update(phone_numbers::table
            .filter(phone_numbers::use_for_whatsapp.eq(true))
            .filter(phone_numbers::id.ne(keep)))
            .set(phone_numbers::use_for_whatsapp.eq(false))
            .execute(dbcon)?;
    }

    Ok(())
}

/// Normalise a phone number to E.164.
///
/// Numbers without a calling code are taken to be Kenyan.
pub fn normalize(input: &str) -> Result<String, SavePhoneNumberError> {
    let compact = input.chars()
        .filter(|c| !c.is_whitespace() && !"-().".contains(*c))
        .collect::<String>();

    let (international, digits) = if compact.starts_with('+') {
        (true, &compact[1..])
    } else if compact.starts_with("00") {
        (true, &compact[2..])
    } else {
        (false, &compact[..])
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(SavePhoneNumberError::InvalidNumber(input.to_string()));
    }

    let number = if international {
        format!("+{}", digits)
    } else if digits.starts_with('0') && digits.len() == 10 {
        format!("+{}{}", DEFAULT_CALLING_CODE, &digits[1..])
    } else if digits.len() == 9 && (digits.starts_with('7') || digits.starts_with('1')) {
        format!("+{}{}", DEFAULT_CALLING_CODE, digits)
    } else if digits.starts_with(DEFAULT_CALLING_CODE) && digits.len() == 12 {
        format!("+{}", digits)
    } else {
        return Err(SavePhoneNumberError::InvalidNumber(input.to_string()));
    };

    let length = number.len() - 1;
    if length < 8 || length > 15 || number[1..].starts_with('0') {
        return Err(SavePhoneNumberError::InvalidNumber(input.to_string()));
    }

    if number[1..].starts_with(DEFAULT_CALLING_CODE) && length != 12 {
        return Err(SavePhoneNumberError::InvalidNumber(input.to_string()));
    }

    Ok(number)
}

fn kenyan_subscriber(number: &str) -> Option<&str> {
    let prefix = format!("+{}", DEFAULT_CALLING_CODE);
    if number.starts_with(&prefix) && number.len() == prefix.len() + 9 {
        Some(&number[prefix.len()..])
    } else {
        None
    }
}

/// Format a normalised number the way it's written within the country.
pub fn national_format(number: &str) -> String {
    match kenyan_subscriber(number) {
        Some(subscriber) => format!("0{} {}", &subscriber[..3], &subscriber[3..]),
        None => number.to_string(),
    }
}

/// Format a normalised number the way it's written abroad.
pub fn international_format(number: &str) -> String {
    match kenyan_subscriber(number) {
        Some(subscriber) => format!(
            "+{} {} {}", DEFAULT_CALLING_CODE, &subscriber[..3], &subscriber[3..]),
        None => number.to_string(),
    }
}

/// `wa.me` link for a normalised number.
pub fn whatsapp_link(number: &str) -> String {
    let digits = number.chars()
        .filter(|&c| c != '+' && c != ' ')
        .collect::<String>();
    format!("https://wa.me/{}", digits)
}

#[derive(ApiError, Debug, Fail)]
pub enum SavePhoneNumberError {
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Internal(#[cause] DbError),
    #[fail(display = "Enter a valid phone number (e.g. +254712345678 or \
        0712345678), got {:?}", _0)]
    #[api(code = "contact:phone:invalid", status = "BAD_REQUEST")]
    InvalidNumber(String),
    #[fail(display = "Phone number already exists")]
    #[api(code = "contact:phone:exists", status = "BAD_REQUEST")]
    Duplicate,
}

impl_from! { for SavePhoneNumberError ;
    DbError => |e| match e {
        DbError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
            => SavePhoneNumberError::Duplicate,
        _ => SavePhoneNumberError::Internal(e),
    },
}
