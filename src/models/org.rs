//! Details and images identifying the organisation running this site.

use diesel::{
    Connection as _Connection,
    prelude::*,
    result::Error as DbError,
};
use std::collections::HashMap;

use crate::{
    audit,
    db::{
        Connection,
        models as db,
        schema::{org_details, org_images},
        types::{OrgDetailKind, OrgImageKind},
    },
};

/// Maximum length of a detail's value.
pub const MAX_VALUE_LENGTH: usize = 255;

/// Get all details, in their display order.
pub fn details(dbcon: &Connection) -> Result<Vec<db::OrgDetail>, DbError> {
    let mut details = org_details::table.get_results::<db::OrgDetail>(dbcon)?;
    details.sort_by_key(|detail| detail.name.ordering());
    Ok(details)
}

/// Get all images, in their display order.
pub fn images(dbcon: &Connection) -> Result<Vec<db::OrgImage>, DbError> {
    let mut images = org_images::table.get_results::<db::OrgImage>(dbcon)?;
    images.sort_by_key(|image| image.name.ordering());
    Ok(images)
}

/// Get all details and images as a single map from their names to values.
///
/// Images without a file are left out.
pub fn load_map(dbcon: &Connection) -> Result<HashMap<String, String>, DbError> {
    let mut map = HashMap::new();

    for detail in details(dbcon)? {
        map.insert(detail.name.key().to_string(), detail.value);
    }

    for image in images(dbcon)? {
        if !image.path.is_empty() {
            map.insert(image.name.key().to_string(), image.path);
        }
    }

    Ok(map)
}

/// Set value of a detail, creating its row if necessary.
pub fn set_detail(dbcon: &Connection, kind: OrgDetailKind, value: &str)
-> Result<(), SetDetailError> {
    if value.chars().count() > MAX_VALUE_LENGTH {
        return Err(SetDetailError::TooLong);
    }

    dbcon.transaction(|| {
        diesel::insert_into(org_details::table)
            .values((org_details::name.eq(kind), org_details::value.eq(value)))
            .on_conflict(org_details::name)
            .do_update()
            .set(org_details::value.eq(value))
            .execute(dbcon)?;

        audit::log_db_actor(dbcon, audit::get_actor(), "org_details", None,
            kind.key(), value)?;

        Ok(())
    })
}

/// Set path of an image, relative to the media directory, creating its row
/// if necessary.
pub fn set_image(dbcon: &Connection, kind: OrgImageKind, path: &str)
-> Result<(), DbError> {
    dbcon.transaction(|| {
        diesel::insert_into(org_images::table)
            .values((org_images::name.eq(kind), org_images::path.eq(path)))
            .on_conflict(org_images::name)
            .do_update()
            .set(org_images::path.eq(path))
            .execute(dbcon)?;

        audit::log_db_actor(dbcon, audit::get_actor(), "org_images", None,
            kind.key(), path)
    })
}

/// Kinds of details which don't have a row yet, and can be offered when
/// adding a new one.
pub fn available_details(dbcon: &Connection)
-> Result<Vec<OrgDetailKind>, DbError> {
    let existing = org_details::table
        .select(org_details::name)
        .get_results::<OrgDetailKind>(dbcon)?;

    Ok(OrgDetailKind::ALL.iter()
        .cloned()
        .filter(|kind| !existing.contains(kind))
        .collect())
}

/// Kinds of images which don't have a row yet.
pub fn available_images(dbcon: &Connection)
-> Result<Vec<OrgImageKind>, DbError> {
    let existing = org_images::table
        .select(org_images::name)
        .get_results::<OrgImageKind>(dbcon)?;

    Ok(OrgImageKind::ALL.iter()
        .cloned()
        .filter(|kind| !existing.contains(kind))
        .collect())
}

/// Make sure every kind of detail and image has a row, inserting blank ones
/// where missing. Existing values are not changed.
pub fn ensure_rows(dbcon: &Connection) -> Result<(), DbError> {
    let details = OrgDetailKind::ALL.iter()
        .map(|&kind| (org_details::name.eq(kind), org_details::value.eq("")))
        .collect::<Vec<_>>();

    diesel::insert_into(org_details::table)
        .values(details)
        .on_conflict_do_nothing()
        .execute(dbcon)?;

    let images = OrgImageKind::ALL.iter()
        .map(|&kind| (org_images::name.eq(kind), org_images::path.eq("")))
        .collect::<Vec<_>>();

    diesel::insert_into(org_images::table)
        .values(images)
        .on_conflict_do_nothing()
        .execute(dbcon)?;

    Ok(())
}

#[derive(ApiError, Debug, Fail)]
pub enum SetDetailError {
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Internal(#[cause] DbError),
    #[fail(display = "Value can't be longer than 255 characters")]
    #[api(code = "site:detail:too-long", status = "BAD_REQUEST")]
    TooLong,
}

impl_from! { for SetDetailError ;
    DbError => |e| SetDetailError::Internal(e),
}
