use chrono::Utc;
use diesel::{
    prelude::*,
    result::{DatabaseErrorKind, Error as DbError},
};
use url::Url;

use crate::db::{
    Connection,
    models as db,
    schema::social_media_links,
    types::SocialPlatform,
};

/// A link to one of the organisation's social media profiles.
#[derive(Debug)]
pub struct SocialMediaLink {
    data: db::SocialMediaLink,
}

/// Editable fields of a social media link.
#[derive(Clone, Debug, Deserialize)]
pub struct SocialMediaLinkData {
    pub name: SocialPlatform,
    pub url: String,
    #[serde(default = "super::default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Serialize)]
pub struct PublicData {
    id: i32,
    name: SocialPlatform,
    label: &'static str,
    icon: &'static str,
    url: String,
}

impl SocialMediaLink {
    /// Get all links, by position and platform name.
    pub fn all(dbcon: &Connection) -> Result<Vec<SocialMediaLink>, DbError> {
        social_media_links::table
            .order_by((social_media_links::position.asc(), social_media_links::name.asc()))
            .get_results::<db::SocialMediaLink>(dbcon)
            .map(|v| v.into_iter().map(|data| SocialMediaLink { data }).collect())
    }

    /// Get all links which should be displayed.
    pub fn active(dbcon: &Connection) -> Result<Vec<SocialMediaLink>, DbError> {
        Ok(SocialMediaLink::all(dbcon)?
            .into_iter()
            .filter(|link| link.data.is_active)
            .collect())
    }

    pub fn by_id(dbcon: &Connection, id: i32)
    -> Result<SocialMediaLink, super::FindContactError> {
        social_media_links::table
            .filter(social_media_links::id.eq(id))
            .get_result::<db::SocialMediaLink>(dbcon)
            .optional()?
            .ok_or(super::FindContactError::NotFound)
            .map(|data| SocialMediaLink { data })
    }

    pub fn create(dbcon: &Connection, data: &SocialMediaLinkData)
    -> Result<SocialMediaLink, SaveSocialMediaLinkError> {
        validate_url(&data.url)?;

        diesel::insert_into(social_media_links::table)
            .values(db::NewSocialMediaLink {
                name: data.name,
                url: &data.url,
                is_active: data.is_active,
                position: data.position,
            })
            .get_result::<db::SocialMediaLink>(dbcon)
            .map(|data| SocialMediaLink { data })
            .map_err(Into::into)
    }

    pub fn update(&mut self, dbcon: &Connection, data: &SocialMediaLinkData)
    -> Result<(), SaveSocialMediaLinkError> {
        validate_url(&data.url)?;

        self.data = diesel::update(&self.data)
            .set((
                social_media_links::name.eq(data.name),
                social_media_links::url.eq(&data.url),
                social_media_links::is_active.eq(data.is_active),
                social_media_links::position.eq(data.position),
                social_media_links::updated_at.eq(Utc::now().naive_utc()),
            ))
            .get_result::<db::SocialMediaLink>(dbcon)?;

        Ok(())
    }

    pub fn delete(self, dbcon: &Connection) -> Result<(), DbError> {
        diesel::delete(&self.data).execute(dbcon)?;
        Ok(())
    }

    /// Bootstrap Icons class of this link's platform.
    pub fn icon(&self) -> &'static str {
        self.data.name.icon()
    }

    pub fn get_public(&self) -> PublicData {
        PublicData {
            id: self.data.id,
            name: self.data.name,
            label: self.data.name.label(),
            icon: self.icon(),
            url: self.data.url.clone(),
        }
    }
}

impl std::ops::Deref for SocialMediaLink {
    type Target = db::SocialMediaLink;

    fn deref(&self) -> &db::SocialMediaLink {
        &self.data
    }
}

impl std::fmt::Display for SocialMediaLink {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{} - {}", self.data.name.label(), self.data.url)
    }
}

/// Social media links must be absolute web addresses.
fn validate_url(url: &str) -> Result<(), SaveSocialMediaLinkError> {
    match Url::parse(url) {
        Ok(ref parsed) if parsed.scheme() == "http" || parsed.scheme() == "https"
            => Ok(()),
        _ => Err(SaveSocialMediaLinkError::InvalidUrl(url.to_string())),
    }
}

#[derive(ApiError, Debug, Fail)]
pub enum SaveSocialMediaLinkError {
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Internal(#[cause] DbError),
    #[fail(display = "Enter a valid URL, got {:?}", _0)]
    #[api(code = "contact:social:invalid-url", status = "BAD_REQUEST")]
    InvalidUrl(String),
    /// There already is a link for this platform.
    #[fail(display = "Social media link for this platform already exists")]
    #[api(code = "contact:social:exists", status = "BAD_REQUEST")]
    Duplicate,
}

impl_from! { for SaveSocialMediaLinkError ;
    DbError => |e| match e {
        DbError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
            => SaveSocialMediaLinkError::Duplicate,
        _ => SaveSocialMediaLinkError::Internal(e),
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_must_be_web_addresses() {
        assert!(validate_url("https://facebook.com/gci").is_ok());
        assert!(validate_url("facebook.com/gci").is_err());
        assert!(validate_url("javascript:alert(1)").is_err());
    }
}
