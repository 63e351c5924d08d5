//! Site-wide registries populated once at start-up.

use crate::{Config, apps::CustomApp};

pub mod auth;
pub mod home;
pub mod navigation;

pub use self::{
    auth::{AuthPage, AuthPages},
    home::HomeUrl,
    navigation::{NavItem, Navigation},
};

/// All registries, as seen by request handlers and templates.
#[derive(Clone, Debug)]
pub struct Registries {
    pub navigation: Navigation,
    pub auth: AuthPages,
    pub home: HomeUrl,
}

impl Registries {
    /// Populate registries the way the landing page, the custom application
    /// and the contact section register themselves.
    pub fn new(config: &Config) -> crate::Result<Registries> {
        let auth = AuthPages::from_config(&config.auth)?;

        let mut home = HomeUrl::default();
        home.register("/", "landing");

        let mut navigation = Navigation::default();
        navigation.register("Home", "/", 0, Some("hero"), "");

        if let Some(app) = CustomApp::from_name(&config.apps.custom_app_name) {
            navigation.register(
                app.title(), &config.apps.url_prefix(), 10, None, "app");
        }

        navigation.register("Contact", "/", 20, Some("contact"), "");

        Ok(Registries { navigation, auth, home })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registrations() {
        let registries = Registries::new(&Config::default()).unwrap();

        let items = registries.navigation.items();
        let links = items.iter()
            .map(|item| (item.name.as_str(), item.href()))
            .collect::<Vec<_>>();
        assert_eq!(links, vec![
            ("Home", "/#hero".to_string()),
            ("Dashboard", "/dashboard/".to_string()),
            ("Contact", "/#contact".to_string()),
        ]);

        assert_eq!(registries.home.get().unwrap(), "/");
        assert!(registries.auth.is_enabled(AuthPage::Signin));
    }
}
