/// A single entry of the site navigation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct NavItem {
    pub name: String,
    pub url: String,
    pub order: i32,
    pub fragment: Option<String>,
    /// Free-form kind of this item, e.g. `page` or `admin`.
    #[serde(rename = "type")]
    pub kind: String,
}

impl NavItem {
    /// Target of this item, `url#fragment` when there is a fragment.
    pub fn href(&self) -> String {
        match self.fragment {
            Some(ref fragment) => format!("{}#{}", self.url, fragment),
            None => self.url.clone(),
        }
    }
}

/// Ordered collection of navigation entries.
#[derive(Clone, Debug, Default)]
pub struct Navigation {
    items: Vec<NavItem>,
}

impl Navigation {
    pub fn register(
        &mut self,
        name: &str,
        url: &str,
        order: i32,
        fragment: Option<&str>,
        kind: &str,
    ) {
        self.items.push(NavItem {
            name: name.to_string(),
            url: url.to_string(),
            order,
            fragment: fragment.map(String::from),
            kind: kind.to_string(),
        });
    }

    /// All entries, sorted by order. Entries with the same order keep the
    /// order in which they were registered.
    pub fn items(&self) -> Vec<NavItem> {
        let mut items = self.items.clone();
        items.sort_by_key(|item| item.order);
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_sorted_by_order_stably() {
        let mut nav = Navigation::default();
        nav.register("Contact", "/", 20, Some("contact"), "");
        nav.register("Home", "/", 0, Some("hero"), "");
        nav.register("About", "/about/", 20, None, "page");
        nav.register("Dashboard", "/dashboard/", 10, None, "");

        let names = nav.items().into_iter().map(|i| i.name).collect::<Vec<_>>();
        assert_eq!(names, ["Home", "Dashboard", "Contact", "About"]);
    }

    #[test]
    fn href_includes_fragment() {
        let mut nav = Navigation::default();
        nav.register("Home", "/", 0, Some("hero"), "");
        nav.register("Dashboard", "/dashboard/", 10, None, "");

        let items = nav.items();
        assert_eq!(items[0].href(), "/#hero");
        assert_eq!(items[1].href(), "/dashboard/");
    }
}
