//! Rendering composed pages through the real templates.

use gci_schools::{
    api::pages::PageContext,
    config::Config,
    layout::{AuthMode, Page, Region},
    registry::Registries,
    site::SiteInfo,
    templates::PAGES,
};

fn registries() -> Registries {
    Registries::new(&Config::default()).expect("Default registries should build")
}

fn site() -> SiteInfo {
    SiteInfo {
        name: "GCI".to_string(),
        description: "Grace Communion International".to_string(),
        theme_color: "#000".to_string(),
        url: String::new(),
        author: String::new(),
        author_url: String::new(),
        logo: None,
        favicon: None,
        apple_touch_icon: None,
        cover_image: None,
        credits: String::new(),
        social_links: Vec::new(),
        phone_numbers: Vec::new(),
        email_addresses: Vec::new(),
        primary_phone: None,
        whatsapp_link: None,
        primary_email: None,
        contact_address: None,
    }
}

#[derive(serde_derive::Serialize)]
struct Empty {}

fn render(page: &Page, registries: &Registries) -> String {
    let config = Config::default();
    let site = site();
    let context = PageContext::new(
        &config, registries, &site, page, None, Vec::new(), &Empty {});

    PAGES.render("index.html", &context).expect("Page should render")
}

fn has_region(body: &str, region: Region) -> bool {
    body.contains(&format!("data-region=\"{}\"", region.key()))
}

#[test]
fn regions_follow_their_defaults() {
    let registries = registries();
    let page = Page::new("Test");
    let body = render(&page, &registries);

    for &region in Region::ALL {
        assert_eq!(
            has_region(&body, region),
            page.includes(region, &registries.auth),
            "{:?}", region,
        );
    }

    assert!(has_region(&body, Region::Header));
    assert!(!has_region(&body, Region::Hero));
}

#[test]
fn each_region_follows_its_flag() {
    let registries = registries();

    for &region in Region::ALL {
        let on = render(&Page::new("Test").with(region, true), &registries);
        assert!(has_region(&on, region), "{:?} should be included", region);

        let off = render(&Page::new("Test").with(region, false), &registries);
        assert!(!has_region(&off, region), "{:?} should be excluded", region);
    }
}

#[test]
fn regions_are_laid_out_in_order() {
    let registries = registries();
    let mut page = Page::auth(AuthMode::Signin);
    for &region in Region::ALL {
        page.set(region, true);
    }
    let body = render(&page, &registries);

    let offsets = Region::ALL.iter()
        .map(|region| body.find(&format!("data-region=\"{}\"", region.key()))
            .unwrap_or_else(|| panic!("{:?} missing", region)))
        .collect::<Vec<_>>();

    let mut sorted = offsets.clone();
    sorted.sort();
    assert_eq!(offsets, sorted);
}

#[test]
fn auth_pages_show_their_form() {
    let registries = registries();
    let body = render(&Page::auth(AuthMode::Signup), &registries);

    assert!(has_region(&body, Region::Signup));
    assert!(!has_region(&body, Region::Signin));
}

#[test]
fn disabled_auth_pages_are_never_shown() {
    let mut registries = registries();
    registries.auth.disable(gci_schools::registry::AuthPage::Signin);

    let body = render(&Page::auth(AuthMode::Signin).with(Region::Signin, true),
        &registries);

    assert!(!has_region(&body, Region::Signin));
}

#[test]
fn overlays_are_rendered_last() {
    let registries = registries();
    let body = render(&Page::new("Test"), &registries);

    let overlays = body.find("class=\"overlays\"").expect("overlays missing");
    let footer = body.find("data-region=\"footer\"").expect("footer missing");
    let back_to_top = body.find("data-region=\"back_to_top\"")
        .expect("back_to_top missing");

    assert!(footer < overlays);
    assert!(overlays < back_to_top);
}

#[test]
fn region_stylesheets_are_linked() {
    let registries = registries();
    let body = render(&Page::landing(), &registries);

    assert!(body.contains("/lib/static/css/regions/hero.css"));
    assert!(!body.contains("/lib/static/css/regions/signin.css"));
}
