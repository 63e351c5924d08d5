//! Pluggable applications mounted at `CUSTOM_APP_URL`.

/// Applications which can be selected with `CUSTOM_APP_NAME`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CustomApp {
    /// Schools, modules and enrollments dashboard.
    Schools,
}

impl CustomApp {
    pub const ALL: &'static [CustomApp] = &[CustomApp::Schools];

    /// Find an application by name. Both the bare name (`schools`) and the
    /// dotted package name (`apps.schools`) are accepted.
    pub fn from_name(name: &str) -> Option<CustomApp> {
        let bare = name.trim().trim_start_matches("apps.");

        CustomApp::ALL.iter()
            .cloned()
            .find(|app| app.label() == bare)
    }

    pub fn label(self) -> &'static str {
        match self {
            CustomApp::Schools => "schools",
        }
    }

    /// Title shown in navigation.
    pub fn title(self) -> &'static str {
        match self {
            CustomApp::Schools => "Dashboard",
        }
    }

    /// Human-readable list of available applications.
    pub fn available() -> String {
        CustomApp::ALL.iter()
            .map(|app| format!("apps.{}", app.label()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
