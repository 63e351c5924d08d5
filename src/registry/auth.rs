//! Which authentication pages are available, and how they are configured.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

keyed_enum! {
    #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
    pub enum AuthPage {
        Signin = "signin", "Signin";
        Signup = "signup", "Signup";
        ProfileUpdate = "profile_update", "Profile update";
        PasswordReset = "password_reset", "Password reset";
        EmailVerification = "email_verification", "Email verification";
        Logout = "logout", "Logout";
    }
}

impl AuthPage {
    /// Is this page available when nothing was configured?
    fn enabled_by_default(self) -> bool {
        match self {
            AuthPage::PasswordReset | AuthPage::EmailVerification => false,
            _ => true,
        }
    }

    /// Path this page is served at, if it has a route.
    pub fn path(self) -> Option<&'static str> {
        match self {
            AuthPage::Signin => Some("/signin/"),
            AuthPage::Signup => Some("/signup/"),
            AuthPage::Logout => Some("/signout/"),
            _ => None,
        }
    }

    /// Message shown when this page is requested while disabled.
    pub fn unavailable_message(self) -> String {
        format!("{} is currently unavailable.", self.label())
    }

    pub fn parse(name: &str) -> Result<AuthPage, UnknownAuthPage> {
        AuthPage::from_key(name).ok_or_else(|| UnknownAuthPage(name.to_string()))
    }
}

/// Configuration of a single page, free-form.
pub type PageConfig = Map<String, Value>;

/// `[auth]` section of the configuration file.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Per-page configuration. Key `enabled` turns a page on or off, all
    /// other keys become that page's configuration.
    #[serde(default)]
    pub pages: BTreeMap<String, PageConfig>,
    /// Label of the username field on sign-in and sign-up forms.
    pub username_label: Option<String>,
    /// Placeholder of the username field.
    pub username_placeholder: Option<String>,
}

/// Registry of authentication pages.
#[derive(Clone, Debug)]
pub struct AuthPages {
    enabled: BTreeMap<AuthPage, bool>,
    configs: BTreeMap<AuthPage, PageConfig>,
    username_label: String,
    username_placeholder: String,
}

impl Default for AuthPages {
    fn default() -> Self {
        AuthPages {
            enabled: AuthPage::ALL.iter()
                .map(|&page| (page, page.enabled_by_default()))
                .collect(),
            configs: BTreeMap::new(),
            username_label: "Username".to_string(),
            username_placeholder: "Enter your username".to_string(),
        }
    }
}

impl AuthPages {
    /// Build registry from the `[auth]` configuration section.
    pub fn from_config(config: &Config) -> Result<AuthPages, UnknownAuthPage> {
        let mut pages = AuthPages::default();

        let bulk = config.pages.iter()
            .map(|(name, config)| Ok((AuthPage::parse(name)?, config.clone())))
            .collect::<Result<Vec<_>, UnknownAuthPage>>()?;
        pages.bulk_configure(bulk);

        pages.configure_username_field(
            config.username_label.as_ref().map(String::as_str),
            config.username_placeholder.as_ref().map(String::as_str),
        );

        Ok(pages)
    }

    /// Enable a page, optionally replacing its configuration.
    pub fn enable(&mut self, page: AuthPage, config: Option<PageConfig>) {
        self.enabled.insert(page, true);
        if let Some(config) = config {
            if !config.is_empty() {
                self.configs.insert(page, config);
            }
        }
    }

    /// Disable a page, dropping its configuration.
    pub fn disable(&mut self, page: AuthPage) {
        self.enabled.insert(page, false);
        self.configs.remove(&page);
    }

    pub fn is_enabled(&self, page: AuthPage) -> bool {
        self.enabled.get(&page).cloned().unwrap_or(false)
    }

    /// All enabled pages, in declaration order.
    pub fn enabled_pages(&self) -> Vec<AuthPage> {
        AuthPage::ALL.iter()
            .cloned()
            .filter(|&page| self.is_enabled(page))
            .collect()
    }

    /// Configuration of a page; empty if none was set.
    pub fn page_config(&self, page: AuthPage) -> PageConfig {
        self.configs.get(&page).cloned().unwrap_or_default()
    }

    /// Replace a page's configuration without changing whether it's enabled.
    pub fn configure(&mut self, page: AuthPage, config: PageConfig) {
        self.configs.insert(page, config);
    }

    /// Configure many pages at once.
    ///
    /// A boolean `enabled` key toggles the page; remaining keys, if any,
    /// replace its configuration.
    pub fn bulk_configure<I>(&mut self, pages: I)
    where
        I: IntoIterator<Item = (AuthPage, PageConfig)>,
    {
        for (page, mut config) in pages {
            if let Some(enabled) = config.remove("enabled") {
                self.enabled.insert(page, enabled.as_bool().unwrap_or(false));
            }

            if !config.is_empty() {
                self.configs.insert(page, config);
            }
        }
    }

    /// Change label or placeholder of the username field.
    pub fn configure_username_field(
        &mut self,
        label: Option<&str>,
        placeholder: Option<&str>,
    ) {
        if let Some(label) = label {
            self.username_label = label.to_string();
        }
        if let Some(placeholder) = placeholder {
            self.username_placeholder = placeholder.to_string();
        }
    }

    pub fn username_label(&self) -> &str {
        &self.username_label
    }

    pub fn username_placeholder(&self) -> &str {
        &self.username_placeholder
    }

    /// Paths of enabled pages which have a route, keyed by page name.
    pub fn urls(&self) -> BTreeMap<&'static str, &'static str> {
        self.enabled_pages()
            .into_iter()
            .filter_map(|page| page.path().map(|path| (page.key(), path)))
            .collect()
    }

    /// Status of every page, enabled or not.
    pub fn status(&self) -> Vec<(AuthPage, bool, PageConfig)> {
        AuthPage::ALL.iter()
            .map(|&page| (page, self.is_enabled(page), self.page_config(page)))
            .collect()
    }
}

#[derive(Debug, Fail)]
#[fail(display = "Unknown auth page: {}", _0)]
pub struct UnknownAuthPage(pub String);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> PageConfig {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn defaults() {
        let pages = AuthPages::default();
        assert_eq!(pages.enabled_pages(), vec![
            AuthPage::Signin,
            AuthPage::Signup,
            AuthPage::ProfileUpdate,
            AuthPage::Logout,
        ]);
        assert_eq!(pages.username_label(), "Username");
        assert_eq!(pages.username_placeholder(), "Enter your username");
    }

    #[test]
    fn disable_drops_config() {
        let mut pages = AuthPages::default();
        pages.configure(AuthPage::Signup, config(json!({"next": "/dashboard/"})));
        pages.disable(AuthPage::Signup);
        assert!(!pages.is_enabled(AuthPage::Signup));
        assert!(pages.page_config(AuthPage::Signup).is_empty());

        pages.enable(AuthPage::Signup, Some(config(json!({"a": 1}))));
        assert!(pages.is_enabled(AuthPage::Signup));
        assert_eq!(pages.page_config(AuthPage::Signup), config(json!({"a": 1})));
    }

    #[test]
    fn bulk_configure_splits_enabled_key() {
        let mut pages = AuthPages::default();
        pages.bulk_configure(vec![
            (AuthPage::Signin, config(json!({"redirect_url": "/home"}))),
            (AuthPage::EmailVerification,
                config(json!({"enabled": true, "expiry_hours": 24}))),
            (AuthPage::Signup, config(json!({"enabled": false}))),
        ]);

        assert!(pages.is_enabled(AuthPage::Signin));
        assert_eq!(pages.page_config(AuthPage::Signin),
            config(json!({"redirect_url": "/home"})));
        assert!(pages.is_enabled(AuthPage::EmailVerification));
        assert_eq!(pages.page_config(AuthPage::EmailVerification),
            config(json!({"expiry_hours": 24})));
        assert!(!pages.is_enabled(AuthPage::Signup));
    }

    #[test]
    fn unknown_pages_are_errors() {
        assert!(AuthPage::parse("magic_link").is_err());

        let mut cfg = Config::default();
        cfg.pages.insert("magic_link".into(), PageConfig::new());
        assert!(AuthPages::from_config(&cfg).is_err());
    }

    #[test]
    fn url_map_only_contains_routed_enabled_pages() {
        let mut pages = AuthPages::default();
        pages.disable(AuthPage::Signup);

        let urls = pages.urls();
        assert_eq!(urls.get("signin"), Some(&"/signin/"));
        assert_eq!(urls.get("logout"), Some(&"/signout/"));
        assert!(!urls.contains_key("signup"));
        assert!(!urls.contains_key("profile_update"));
    }

    #[test]
    fn unavailable_message() {
        assert_eq!(AuthPage::Signup.unavailable_message(),
            "Signup is currently unavailable.");
    }
}
