/// Where the "home" link of every page points.
///
/// Only the first registration counts.
#[derive(Clone, Debug, Default)]
pub struct HomeUrl {
    entry: Option<(String, String)>,
}

impl HomeUrl {
    /// Register `url` as the home URL on behalf of `owner`.
    ///
    /// Returns `false`, and changes nothing, if a home URL was already
    /// registered.
    pub fn register(&mut self, url: &str, owner: &str) -> bool {
        if let Some((ref existing, ref existing_owner)) = self.entry {
            warn!("Home URL already registered as {} by {}, ignoring {} from {}",
                existing, existing_owner, url, owner);
            return false;
        }

        self.entry = Some((url.to_string(), owner.to_string()));
        true
    }

    /// Registered home URL.
    pub fn get(&self) -> Result<&str, NoHomeUrl> {
        self.entry.as_ref().map(|(url, _)| url.as_str()).ok_or(NoHomeUrl)
    }

    /// Name of whoever registered the home URL.
    pub fn owner(&self) -> Option<&str> {
        self.entry.as_ref().map(|(_, owner)| owner.as_str())
    }

    /// Registered home URL, or `/` if there is none.
    pub fn get_or_root(&self) -> &str {
        self.get().unwrap_or("/")
    }

    /// Home URL with a fragment appended.
    pub fn with_fragment(&self, fragment: Option<&str>) -> String {
        match fragment {
            Some(fragment) => format!("{}#{}", self.get_or_root(), fragment),
            None => self.get_or_root().to_string(),
        }
    }

    /// Is `url` the registered home URL?
    pub fn is_home(&self, url: &str) -> bool {
        self.get().map_or(false, |home| home == url)
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }
}

#[derive(Debug, Fail)]
#[fail(display = "No home URL has been registered")]
pub struct NoHomeUrl;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_registration_wins() {
        let mut home = HomeUrl::default();
        assert!(home.get().is_err());
        assert_eq!(home.get_or_root(), "/");

        assert!(home.register("/", "landing"));
        assert!(!home.register("/dashboard/", "schools"));
        assert_eq!(home.get().unwrap(), "/");
        assert_eq!(home.owner(), Some("landing"));
        assert_eq!(home.with_fragment(Some("hero")), "/#hero");
    }

    #[test]
    fn clear_allows_new_registration() {
        let mut home = HomeUrl::default();
        home.register("/", "landing");
        home.clear();
        assert!(home.get().is_err());
        assert!(home.register("/dashboard/", "schools"));
        assert!(home.is_home("/dashboard/"));
    }
}
