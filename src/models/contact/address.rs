use chrono::Utc;
use diesel::{
    Connection as _Connection,
    prelude::*,
    result::{DatabaseErrorKind, Error as DbError},
};
use url::form_urlencoded;

use crate::db::{
    Connection,
    models as db,
    schema::physical_addresses,
};

/// A postal address of the organisation.
#[derive(Debug)]
pub struct PhysicalAddress {
    data: db::PhysicalAddress,
}

fn default_country() -> String {
    "Kenya".to_string()
}

/// Editable fields of an address.
#[derive(Clone, Debug, Deserialize)]
pub struct PhysicalAddressData {
    pub label: String,
    #[serde(default)]
    pub building: String,
    #[serde(default)]
    pub street_address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state_province: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub map_embed_url: String,
    #[serde(default = "super::default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub use_in_contact_form: bool,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Serialize)]
pub struct PublicData {
    id: i32,
    label: String,
    building: String,
    full_address: String,
    short_address: String,
    google_maps_url: String,
    map_embed_url: String,
}

impl PhysicalAddress {
    /// Get all addresses, by position, label and city.
    pub fn all(dbcon: &Connection) -> Result<Vec<PhysicalAddress>, DbError> {
        physical_addresses::table
            .order_by((
                physical_addresses::position.asc(),
                physical_addresses::label.asc(),
                physical_addresses::city.asc(),
            ))
            .get_results::<db::PhysicalAddress>(dbcon)
            .map(|v| v.into_iter().map(|data| PhysicalAddress { data }).collect())
    }

    /// Get all addresses which should be displayed.
    pub fn active(dbcon: &Connection) -> Result<Vec<PhysicalAddress>, DbError> {
        Ok(PhysicalAddress::all(dbcon)?
            .into_iter()
            .filter(|address| address.data.is_active)
            .collect())
    }

    pub fn by_id(dbcon: &Connection, id: i32)
    -> Result<PhysicalAddress, super::FindContactError> {
        physical_addresses::table
            .filter(physical_addresses::id.eq(id))
            .get_result::<db::PhysicalAddress>(dbcon)
            .optional()?
            .ok_or(super::FindContactError::NotFound)
            .map(|data| PhysicalAddress { data })
    }

    /// The address shown next to the contact form, if any.
    pub fn for_contact_form(dbcon: &Connection)
    -> Result<Option<PhysicalAddress>, DbError> {
        physical_addresses::table
            .filter(physical_addresses::use_in_contact_form.eq(true))
            .get_result::<db::PhysicalAddress>(dbcon)
            .optional()
            .map(|data| data.map(|data| PhysicalAddress { data }))
    }

    pub fn create(dbcon: &Connection, data: &PhysicalAddressData)
    -> Result<PhysicalAddress, SavePhysicalAddressError> {
        validate(data)?;
        let use_in_contact_form = data.is_active && data.use_in_contact_form;

        dbcon.transaction(|| {
            if use_in_contact_form {
                clear_contact_form(dbcon, None)?;
            }

            diesel::insert_into(physical_addresses::table)
                .values(db::NewPhysicalAddress {
                    label: data.label.trim(),
                    building: &data.building,
                    street_address: &data.street_address,
                    city: &data.city,
                    state_province: &data.state_province,
                    postal_code: &data.postal_code,
                    country: &data.country,
                    map_embed_url: &data.map_embed_url,
                    is_active: data.is_active,
                    use_in_contact_form,
                    position: data.position,
                })
                .get_result::<db::PhysicalAddress>(dbcon)
                .map(|data| PhysicalAddress { data })
                .map_err(Into::into)
        })
    }

    pub fn update(&mut self, dbcon: &Connection, data: &PhysicalAddressData)
    -> Result<(), SavePhysicalAddressError> {
        validate(data)?;
        let use_in_contact_form = data.is_active && data.use_in_contact_form;

        let updated = dbcon.transaction(|| {
            if use_in_contact_form {
                clear_contact_form(dbcon, Some(self.data.id))?;
            }

            diesel::update(&self.data)
                .set((
                    physical_addresses::label.eq(data.label.trim()),
                    physical_addresses::building.eq(&data.building),
                    physical_addresses::street_address.eq(&data.street_address),
                    physical_addresses::city.eq(&data.city),
                    physical_addresses::state_province.eq(&data.state_province),
                    physical_addresses::postal_code.eq(&data.postal_code),
                    physical_addresses::country.eq(&data.country),
                    physical_addresses::map_embed_url.eq(&data.map_embed_url),
                    physical_addresses::is_active.eq(data.is_active),
                    physical_addresses::use_in_contact_form.eq(use_in_contact_form),
                    physical_addresses::position.eq(data.position),
                    physical_addresses::updated_at.eq(Utc::now().naive_utc()),
                ))
                .get_result::<db::PhysicalAddress>(dbcon)
        })?;

        self.data = updated;

        Ok(())
    }

    pub fn delete(self, dbcon: &Connection) -> Result<(), DbError> {
        diesel::delete(&self.data).execute(dbcon)?;
        Ok(())
    }

    /// `street, city[, state][, postal code], country`.
    pub fn full_address(&self) -> String {
        full_address(&self.data)
    }

    /// `city, country`.
    pub fn short_address(&self) -> String {
        format!("{}, {}", self.data.city, self.data.country)
    }

    /// Google Maps search for this address.
    pub fn google_maps_url(&self) -> String {
        let query = form_urlencoded::byte_serialize(self.full_address().as_bytes())
            .collect::<String>();
        format!("https://www.google.com/maps/search/?api=1&query={}", query)
    }

    pub fn get_public(&self) -> PublicData {
        PublicData {
            id: self.data.id,
            label: self.data.label.clone(),
            building: self.data.building.clone(),
            full_address: self.full_address(),
            short_address: self.short_address(),
            google_maps_url: self.google_maps_url(),
            map_embed_url: self.data.map_embed_url.clone(),
        }
    }
}

impl std::ops::Deref for PhysicalAddress {
    type Target = db::PhysicalAddress;

    fn deref(&self) -> &db::PhysicalAddress {
        &self.data
    }
}

impl std::fmt::Display for PhysicalAddress {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.data.label.is_empty() {
            fmt.write_str(&self.data.city)
        } else {
            fmt.write_str(&self.data.label)
        }
    }
}

fn full_address(data: &db::PhysicalAddress) -> String {
    let mut parts = vec![data.street_address.as_str(), data.city.as_str()];

    if !data.state_province.is_empty() {
        parts.push(&data.state_province);
    }

    if !data.postal_code.is_empty() {
        parts.push(&data.postal_code);
    }

    parts.push(&data.country);
    parts.join(", ")
}

fn clear_contact_form(dbcon: &Connection, keep: Option<i32>) -> Result<(), DbError> {
    diesel::update(physical_addresses::table
        .filter(physical_addresses::use_in_contact_form.eq(true))
        .filter(physical_addresses::id.ne(keep.unwrap_or(0))))
        .set(physical_addresses::use_in_contact_form.eq(false))
        .execute(dbcon)?;
    Ok(())
}

fn validate(data: &PhysicalAddressData) -> Result<(), SavePhysicalAddressError> {
    if data.label.trim().is_empty() {
        return Err(SavePhysicalAddressError::EmptyLabel);
    }

    if !data.map_embed_url.is_empty() && !data.map_embed_url.starts_with("https://") {
        return Err(SavePhysicalAddressError::InvalidMapUrl);
    }

    Ok(())
}

#[derive(ApiError, Debug, Fail)]
pub enum SavePhysicalAddressError {
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Internal(#[cause] DbError),
    #[fail(display = "Address label can't be empty")]
    #[api(code = "contact:address:empty-label", status = "BAD_REQUEST")]
    EmptyLabel,
    #[fail(display = "Map embed URL must be an https:// address")]
    #[api(code = "contact:address:invalid-map-url", status = "BAD_REQUEST")]
    InvalidMapUrl,
    #[fail(display = "Address with this label already exists")]
    #[api(code = "contact:address:exists", status = "BAD_REQUEST")]
    Duplicate,
}

impl_from! { for SavePhysicalAddressError ;
    DbError => |e| match e {
        DbError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
            => SavePhysicalAddressError::Duplicate,
        _ => SavePhysicalAddressError::Internal(e),
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn address() -> db::PhysicalAddress {
        let now = NaiveDate::from_ymd(2024, 3, 1).and_hms(9, 0, 0);
        db::PhysicalAddress {
            id: 1,
            label: "Main Office".into(),
            building: "Britam Tower".into(),
            street_address: "Hospital Road".into(),
            city: "Nairobi".into(),
            state_province: String::new(),
            postal_code: "00100".into(),
            country: "Kenya".into(),
            map_embed_url: String::new(),
            is_active: true,
            use_in_contact_form: true,
            position: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn formats_addresses() {
        let address = PhysicalAddress { data: address() };
        assert_eq!(address.full_address(), "Hospital Road, Nairobi, 00100, Kenya");
        assert_eq!(address.short_address(), "Nairobi, Kenya");
        assert_eq!(address.google_maps_url(),
            "https://www.google.com/maps/search/?api=1&query=\
            Hospital+Road%2C+Nairobi%2C+00100%2C+Kenya");
        assert_eq!(address.to_string(), "Main Office");
    }

    #[test]
    fn full_address_includes_optional_parts() {
        let mut data = address();
        data.state_province = "Vihiga County".into();
        data.postal_code = String::new();
        assert_eq!(full_address(&data), "Hospital Road, Nairobi, Vihiga County, Kenya");
    }
}
