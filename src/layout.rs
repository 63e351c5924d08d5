//! Page composition.
//!
//! Every public page is made of the same fixed sequence of optional regions.
//! A page decides which of them to include through per-region flags; regions
//! without a flag fall back to their default. Authentication regions are
//! additionally gated by the auth pages registry.

use serde::ser::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::{config::Environment, registry::{AuthPage, AuthPages}};

/// URL prefix under which the static directory is served.
pub const STATIC_URL: &str = "/lib/static/";

/// URL prefix under which uploaded media are served.
pub const MEDIA_URL: &str = "/lib/media/";

keyed_enum! {
    /// Regions of a page, in the order in which they are laid out.
    #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
    pub enum Region {
        Header = "header", "Header";
        Hero = "hero", "Hero";
        Signin = "signin", "Sign in";
        Signup = "signup", "Sign up";
        Contact = "contact", "Contact";
        Footer = "footer", "Footer";
        BackToTop = "back_to_top", "Back to top";
        Preloader = "preloader", "Preloader";
        ContactCall = "contact_call", "Contact call";
        AuthModal = "auth_modal", "Sign in modal";
    }
}

impl Region {
    /// Is this region included when a page says nothing about it?
    pub fn included_by_default(self) -> bool {
        match self {
            Region::Hero | Region::Signin | Region::Signup | Region::AuthModal
                => false,
            Region::Header | Region::Contact | Region::Footer
            | Region::BackToTop | Region::Preloader | Region::ContactCall
                => true,
        }
    }

    /// Floating elements, rendered above the page content.
    pub fn is_overlay(self) -> bool {
        match self {
            Region::BackToTop | Region::Preloader | Region::ContactCall => true,
            _ => false,
        }
    }

    /// URL of this region's stylesheet.
    pub fn stylesheet(self) -> String {
        static_url(&format!("css/regions/{}.css", self.key()))
    }
}

impl Serialize for Region {
    fn serialize<S>(&self, ser: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        ser.serialize_str(self.key())
    }
}

/// Which authentication form a page shows inline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthMode {
    Signin,
    Signup,
}

impl AuthMode {
    pub fn region(self) -> Region {
        match self {
            AuthMode::Signin => Region::Signin,
            AuthMode::Signup => Region::Signup,
        }
    }

    pub fn page(self) -> AuthPage {
        match self {
            AuthMode::Signin => AuthPage::Signin,
            AuthMode::Signup => AuthPage::Signup,
        }
    }

    pub fn key(self) -> &'static str {
        self.page().key()
    }
}

/// A call-to-action button in the hero region.
#[derive(Clone, Debug, Serialize)]
pub struct HeroButton {
    pub show: bool,
    /// Only show this button to signed-in users.
    pub login_required: bool,
    /// Bootstrap Icons class.
    pub icon: String,
    pub name: String,
    pub url: String,
}

impl HeroButton {
    fn hidden() -> HeroButton {
        HeroButton {
            show: false,
            login_required: false,
            icon: String::new(),
            name: String::new(),
            url: String::new(),
        }
    }
}

/// Settings of individual regions.
#[derive(Clone, Debug, Serialize)]
pub struct Options {
    pub header_logo: bool,
    pub header_navigation: bool,
    /// Show sign in / sign out button in the header.
    pub header_auth_btn: bool,
    pub hero_btn_1: HeroButton,
    pub hero_btn_2: HeroButton,
    pub footer_newsletter: bool,
    pub footer_top: bool,
    pub footer_copyright: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            header_logo: true,
            header_navigation: true,
            header_auth_btn: true,
            hero_btn_1: HeroButton {
                show: true,
                login_required: false,
                icon: String::new(),
                name: "Dashboard".to_string(),
                url: "/dashboard/".to_string(),
            },
            hero_btn_2: HeroButton::hidden(),
            footer_newsletter: true,
            footer_top: true,
            footer_copyright: true,
        }
    }
}

/// Description of a page to compose.
#[derive(Clone, Debug, Default)]
pub struct Page {
    pub title: Option<String>,
    flags: BTreeMap<Region, bool>,
    auth: Option<AuthMode>,
    pub options: Options,
}

impl Page {
    pub fn new<T: Into<String>>(title: T) -> Page {
        Page {
            title: Some(title.into()),
            ..Page::default()
        }
    }

    /// The public landing page.
    pub fn landing() -> Page {
        let mut page = Page::new("Welcome").with(Region::Hero, true);
        page.options.header_navigation = false;
        page.options.footer_top = false;
        page
    }

    /// Page showing an inline authentication form.
    pub fn auth(mode: AuthMode) -> Page {
        let title = match mode {
            AuthMode::Signin => "Login",
            AuthMode::Signup => "Sign up",
        };
        let mut page = Page::new(title);
        page.auth = Some(mode);
        page.options.header_auth_btn = false;
        page.options.header_navigation = false;
        page
    }

    /// Set a region's flag.
    pub fn with(mut self, region: Region, include: bool) -> Page {
        self.flags.insert(region, include);
        self
    }

    pub fn set(&mut self, region: Region, include: bool) {
        self.flags.insert(region, include);
    }

    /// Explicitly set flag of a region, if any.
    pub fn flag(&self, region: Region) -> Option<bool> {
        self.flags.get(&region).cloned()
    }

    pub fn auth_mode(&self) -> Option<AuthMode> {
        self.auth
    }

    /// Does this page include `region`?
    pub fn includes(&self, region: Region, auth: &AuthPages) -> bool {
        match region {
            Region::Signin | Region::Signup => {
                let mode = if region == Region::Signin {
                    AuthMode::Signin
                } else {
                    AuthMode::Signup
                };
                let wanted = self.flag(region)
                    .unwrap_or(self.auth == Some(mode));
                wanted && auth.is_enabled(mode.page())
            }
            Region::AuthModal => {
                self.flag(region).unwrap_or(false)
                    && (auth.is_enabled(AuthPage::Signin)
                        || auth.is_enabled(AuthPage::Signup))
            }
            _ => self.flag(region).unwrap_or_else(|| region.included_by_default()),
        }
    }

    /// Decide which regions to include.
    pub fn compose(&self, auth: &AuthPages) -> Composition {
        let regions = Region::ALL.iter()
            .cloned()
            .filter(|&region| self.includes(region, auth))
            .collect::<Vec<_>>();

        Composition::new(regions)
    }
}

/// Outcome of composing a page: the included regions, in layout order.
#[derive(Clone, Debug, Serialize)]
pub struct Composition {
    pub regions: Vec<Region>,
    /// One stylesheet per included region, in the same order.
    pub stylesheets: Vec<String>,
    /// Included floating regions, rendered after everything else.
    pub overlays: Vec<Region>,
    /// Inclusion of every region, keyed by region name.
    pub include: BTreeMap<&'static str, bool>,
}

impl Composition {
    fn new(regions: Vec<Region>) -> Composition {
        let stylesheets = regions.iter().map(|r| r.stylesheet()).collect();
        let overlays = regions.iter().cloned().filter(|r| r.is_overlay()).collect();
        let include = Region::ALL.iter()
            .map(|region| (region.key(), regions.contains(region)))
            .collect();

        Composition { regions, stylesheets, overlays, include }
    }

    pub fn contains(&self, region: Region) -> bool {
        self.regions.contains(&region)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Stylesheet,
    Script,
}

/// A third-party stylesheet or script loaded by every page.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Asset {
    pub kind: AssetKind,
    pub url: String,
    /// Subresource integrity hash.
    pub integrity: Option<&'static str>,
}

impl Asset {
    fn cdn(kind: AssetKind, url: &str, integrity: Option<&'static str>) -> Asset {
        Asset { kind, url: url.to_string(), integrity }
    }

    fn local(kind: AssetKind, path: &str) -> Asset {
        Asset { kind, url: static_url(path), integrity: None }
    }
}

/// Bootstrap, Bootstrap Icons, and AOS.
///
/// Development deployments use copies from the static directory, production
/// ones load them from jsDelivr. The AOS initialisation files are always
/// local.
pub fn vendor_assets(environment: Environment) -> Vec<Asset> {
    use self::AssetKind::*;

    let mut assets = if environment.is_debug() {
        vec![
            Asset::local(Stylesheet, "vendor/bootstrap/dist/css/bootstrap.min.css"),
            Asset::local(Script, "vendor/bootstrap/dist/js/bootstrap.bundle.min.js"),
            Asset::local(Stylesheet, "vendor/bootstrap-icons/font/bootstrap-icons.min.css"),
            Asset::local(Stylesheet, "vendor/aos/dist/aos.css"),
            Asset::local(Script, "vendor/aos/dist/aos.js"),
        ]
    } else {
        vec![
            Asset::cdn(Stylesheet,
                "https://cdn.jsdelivr.net/npm/bootstrap@5.3.6/dist/css/bootstrap.min.css",
                Some("sha384-4Q6Gf2aSP4eDXB8Miphtr37CMZZQ5oXLH2yaXMJ2w8e2ZtHTl7GptT4jmndRuHDT")),
            Asset::cdn(Script,
                "https://cdn.jsdelivr.net/npm/bootstrap@5.3.6/dist/js/bootstrap.bundle.min.js",
                Some("sha384-j1CDi7MgGQ12Z7Qab0qlWQ/Qqz24Gc6BM0thvEMVjHnfYGF0rmFCozFSxQBxwHKO")),
            Asset::cdn(Stylesheet,
                "https://cdn.jsdelivr.net/npm/bootstrap-icons@1.13.1/font/bootstrap-icons.min.css",
                None),
            Asset::cdn(Stylesheet,
                "https://cdn.jsdelivr.net/npm/aos@2.3.4/dist/aos.min.css", None),
            Asset::cdn(Script,
                "https://cdn.jsdelivr.net/npm/aos@2.3.4/dist/aos.min.js", None),
        ]
    };

    assets.push(Asset::local(Stylesheet, "init/aos/init.css"));
    assets.push(Asset::local(Script, "init/aos/init.js"));

    assets
}

pub fn static_url(path: &str) -> String {
    format!("{}{}", STATIC_URL, path.trim_start_matches('/'))
}

/// URL of an uploaded file, given its path relative to the media directory.
pub fn media_url(path: &str) -> String {
    format!("{}{}", MEDIA_URL, path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(composition: &Composition) -> Vec<&'static str> {
        composition.regions.iter().map(|r| r.key()).collect()
    }

    #[test]
    fn defaults_apply_when_flags_are_absent() {
        let page = Page::default();
        let auth = AuthPages::default();

        for &region in Region::ALL {
            assert_eq!(page.includes(region, &auth), region.included_by_default(),
                "{} (default {})", region, region.included_by_default());
        }

        assert_eq!(keys(&page.compose(&auth)), [
            "header", "contact", "footer", "back_to_top", "preloader",
            "contact_call",
        ]);
    }

    #[test]
    fn flags_override_defaults() {
        let auth = AuthPages::default();
        let page = Page::default()
            .with(Region::Hero, true)
            .with(Region::Footer, false)
            .with(Region::Preloader, false);

        assert_eq!(keys(&page.compose(&auth)), [
            "header", "hero", "contact", "back_to_top", "contact_call",
        ]);
    }

    #[test]
    fn overlays_are_the_included_floating_regions() {
        let auth = AuthPages::default();

        let composition = Page::default().compose(&auth);
        assert_eq!(composition.overlays,
            [Region::BackToTop, Region::Preloader, Region::ContactCall]);

        let composition = Page::default()
            .with(Region::Preloader, false)
            .with(Region::Hero, true)
            .compose(&auth);
        assert_eq!(composition.overlays, [Region::BackToTop, Region::ContactCall]);
        assert!(!Region::Hero.is_overlay());
    }

    #[test]
    fn every_region_follows_its_flag() {
        let auth = AuthPages::default();

        for &region in Region::ALL {
            let on = Page::default().with(region, true).compose(&auth);
            let off = Page::default().with(region, false).compose(&auth);
            assert!(on.contains(region), "{} should be included", region);
            assert!(!off.contains(region), "{} should be excluded", region);
        }
    }

    #[test]
    fn auth_mode_selects_form() {
        let auth = AuthPages::default();

        let signin = Page::auth(AuthMode::Signin).compose(&auth);
        assert!(signin.contains(Region::Signin));
        assert!(!signin.contains(Region::Signup));

        let signup = Page::auth(AuthMode::Signup).compose(&auth);
        assert!(signup.contains(Region::Signup));
        assert!(!signup.contains(Region::Signin));
    }

    #[test]
    fn disabled_auth_pages_are_never_included() {
        let mut auth = AuthPages::default();
        auth.disable(AuthPage::Signup);

        let page = Page::auth(AuthMode::Signup).with(Region::Signup, true);
        assert!(!page.compose(&auth).contains(Region::Signup));

        auth.disable(AuthPage::Signin);
        let page = Page::default().with(Region::AuthModal, true);
        assert!(!page.compose(&auth).contains(Region::AuthModal));

        auth.enable(AuthPage::Signin, None);
        assert!(page.compose(&auth).contains(Region::AuthModal));
    }

    #[test]
    fn order_is_fixed_and_stylesheets_match() {
        let auth = AuthPages::default();
        let mut page = Page::auth(AuthMode::Signin);
        for &region in Region::ALL.iter().rev() {
            page.set(region, true);
        }

        let composition = page.compose(&auth);
        assert_eq!(composition.regions, Region::ALL);
        assert_eq!(composition.stylesheets, Region::ALL.iter()
            .map(|r| r.stylesheet())
            .collect::<Vec<_>>());
        assert!(composition.include.values().all(|&v| v));
    }

    #[test]
    fn landing_page_settings() {
        let page = Page::landing();
        let composition = page.compose(&AuthPages::default());

        assert_eq!(page.title.as_ref().map(String::as_str), Some("Welcome"));
        assert!(composition.contains(Region::Hero));
        assert!(!page.options.header_navigation);
        assert!(!page.options.footer_top);
        assert!(page.options.footer_copyright);
    }

    #[test]
    fn production_assets_come_from_cdn_with_integrity() {
        let assets = vendor_assets(Environment::Production);

        let bootstrap = assets.iter()
            .filter(|a| a.url.contains("bootstrap@5.3.6"))
            .collect::<Vec<_>>();
        assert_eq!(bootstrap.len(), 2);
        assert!(bootstrap.iter().all(|a| a.integrity.is_some()));

        let local = assets.iter()
            .filter(|a| a.url.starts_with(STATIC_URL))
            .map(|a| a.url.as_str())
            .collect::<Vec<_>>();
        assert_eq!(local, [
            "/lib/static/init/aos/init.css",
            "/lib/static/init/aos/init.js",
        ]);
    }

    #[test]
    fn development_assets_are_local() {
        let assets = vendor_assets(Environment::Development);
        assert!(assets.iter().all(|a| a.url.starts_with(STATIC_URL)));
        assert!(assets.iter().all(|a| a.integrity.is_none()));
    }
}
