//! Information about the organisation running this site, as used by page
//! templates.

use diesel::result::Error as DbError;
use moka::sync::Cache;
use std::{sync::Arc, time::Duration};

use crate::{
    config::Environment,
    db::{Connection, types::{OrgDetailKind, OrgImageKind}},
    layout,
    models::{
        contact::{
            EmailAddress,
            PhoneNumber,
            PhysicalAddress,
            SocialMediaLink,
            address,
            email,
            phone,
            social,
        },
        org,
    },
};

/// How long site information is cached for in production.
const CACHE_TTL: Duration = Duration::from_secs(3600);

/// Everything templates need to know about the organisation.
#[derive(Debug, Serialize)]
pub struct SiteInfo {
    pub name: String,
    pub description: String,
    pub theme_color: String,
    pub url: String,
    pub author: String,
    pub author_url: String,
    pub logo: Option<String>,
    pub favicon: Option<String>,
    pub apple_touch_icon: Option<String>,
    pub cover_image: Option<String>,
    /// Pre-rendered `Designed by …` line.
    pub credits: String,
    pub social_links: Vec<social::PublicData>,
    pub phone_numbers: Vec<phone::PublicData>,
    pub email_addresses: Vec<email::PublicData>,
    pub primary_phone: Option<phone::PublicData>,
    pub whatsapp_link: Option<String>,
    pub primary_email: Option<email::PublicData>,
    /// Address shown next to the contact form.
    pub contact_address: Option<address::PublicData>,
}

impl SiteInfo {
    /// Load site information from the database.
    pub fn load(dbcon: &Connection) -> Result<SiteInfo, DbError> {
        let map = org::load_map(dbcon)?;
        let detail = |kind: OrgDetailKind| map.get(kind.key())
            .cloned()
            .unwrap_or_default();
        let image = |kind: OrgImageKind| map.get(kind.key())
            .map(|path| layout::media_url(path));

        let author = detail(OrgDetailKind::OrgAuthor);
        let author_url = detail(OrgDetailKind::OrgAuthorUrl);

        let whatsapp = PhoneNumber::whatsapp(dbcon)?;

        Ok(SiteInfo {
            name: detail(OrgDetailKind::OrgName),
            description: detail(OrgDetailKind::OrgDescription),
            theme_color: non_empty(detail(OrgDetailKind::OrgThemeColor))
                .unwrap_or_else(|| "#000".to_string()),
            url: detail(OrgDetailKind::OrgUrl),
            credits: credits(&author, &author_url),
            author,
            author_url,
            logo: image(OrgImageKind::OrgLogo),
            favicon: image(OrgImageKind::OrgFavicon),
            apple_touch_icon: image(OrgImageKind::OrgAppleTouchIcon),
            cover_image: image(OrgImageKind::OrgCoverImage),
            social_links: SocialMediaLink::active(dbcon)?
                .iter().map(SocialMediaLink::get_public).collect(),
            phone_numbers: PhoneNumber::active(dbcon)?
                .iter().map(PhoneNumber::get_public).collect(),
            email_addresses: EmailAddress::active(dbcon)?
                .iter().map(EmailAddress::get_public).collect(),
            primary_phone: PhoneNumber::primary(dbcon)?
                .as_ref().map(PhoneNumber::get_public),
            whatsapp_link: whatsapp.as_ref().and_then(PhoneNumber::whatsapp_link),
            primary_email: EmailAddress::primary(dbcon)?
                .as_ref().map(EmailAddress::get_public),
            contact_address: PhysicalAddress::for_contact_form(dbcon)?
                .as_ref().map(PhysicalAddress::get_public),
        })
    }

    /// Full document title for a page.
    pub fn title(&self, page_title: Option<&str>) -> String {
        full_title(page_title, &self.name)
    }

    /// Web application manifest.
    pub fn manifest(&self) -> Manifest {
        let name = non_empty(self.name.clone())
            .unwrap_or_else(|| "My App".to_string());
        let icons = [
            (&self.favicon, "32x32"),
            (&self.apple_touch_icon, "180x180"),
            (&self.logo, "512x512"),
        ];

        Manifest {
            short_name: name.clone(),
            name,
            description: self.description.clone(),
            start_url: "/",
            display: "standalone",
            background_color: "#ffffff",
            theme_color: non_empty(self.theme_color.clone())
                .unwrap_or_else(|| "#000000".to_string()),
            icons: icons.iter()
                .filter_map(|&(src, sizes)| src.as_ref().map(|src| ManifestIcon {
                    src: src.clone(),
                    sizes,
                    purpose: "any",
                }))
                .collect(),
            scope: "/",
            lang: "en",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Manifest {
    pub name: String,
    pub short_name: String,
    pub description: String,
    pub start_url: &'static str,
    pub display: &'static str,
    pub background_color: &'static str,
    pub theme_color: String,
    pub icons: Vec<ManifestIcon>,
    pub scope: &'static str,
    pub lang: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ManifestIcon {
    pub src: String,
    pub sizes: &'static str,
    pub purpose: &'static str,
}

/// Site information, cached in production and always fresh in development.
#[derive(Clone)]
pub struct SiteCache {
    cache: Option<Cache<(), Arc<SiteInfo>>>,
}

impl SiteCache {
    pub fn new(environment: Environment) -> SiteCache {
        let cache = if environment.is_debug() {
            None
        } else {
            Some(Cache::builder()
                .max_capacity(1)
                .time_to_live(CACHE_TTL)
                .build())
        };

        SiteCache { cache }
    }

    pub fn get(&self, dbcon: &Connection) -> Result<Arc<SiteInfo>, DbError> {
        let cache = match self.cache {
            Some(ref cache) => cache,
            None => return SiteInfo::load(dbcon).map(Arc::new),
        };

        if let Some(info) = cache.get(&()) {
            return Ok(info);
        }

        let info = Arc::new(SiteInfo::load(dbcon)?);
        cache.insert((), info.clone());
        Ok(info)
    }

    /// Drop cached information, so that changes are visible immediately.
    pub fn invalidate(&self) {
        if let Some(ref cache) = self.cache {
            cache.invalidate_all();
        }
    }
}

/// `<page title> | <organisation name>`, or just the organisation name.
pub fn full_title(page_title: Option<&str>, name: &str) -> String {
    match page_title {
        Some(title) if !title.is_empty() => format!("{} | {}", title, name),
        _ => name.to_string(),
    }
}

/// Credits line linking to the site's author.
///
/// The link is disabled when there is no meaningful URL.
pub fn credits(author: &str, url: &str) -> String {
    let class = if url.is_empty() || url == "#" { "pe-none" } else { "" };

    format!(r#"Designed by <a href="{}" class="{}"><em>{}</em></a>"#,
        tera::escape_html(url), class, tera::escape_html(author))
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_with_and_without_page_title() {
        assert_eq!(full_title(Some("Welcome"), "GCI Schools"), "Welcome | GCI Schools");
        assert_eq!(full_title(None, "GCI Schools"), "GCI Schools");
        assert_eq!(full_title(Some(""), "GCI Schools"), "GCI Schools");
    }

    #[test]
    fn credits_link_is_disabled_without_url() {
        assert_eq!(credits("Tawala Bora", ""),
            r#"Designed by <a href="" class="pe-none"><em>Tawala Bora</em></a>"#);
        assert_eq!(credits("Tawala Bora", "#"),
            r##"Designed by <a href="#" class="pe-none"><em>Tawala Bora</em></a>"##);
        assert_eq!(credits("Tawala Bora", "https://tawalabora.space"),
            r#"Designed by <a href="https://tawalabora.space" class=""><em>Tawala Bora</em></a>"#);
    }

    #[test]
    fn credits_are_escaped() {
        assert_eq!(credits("<b>", ""),
            r#"Designed by <a href="" class="pe-none"><em>&lt;b&gt;</em></a>"#);
    }

    #[test]
    fn development_cache_is_disabled() {
        assert!(SiteCache::new(Environment::Development).cache.is_none());
        assert!(SiteCache::new(Environment::Production).cache.is_some());
    }
}
