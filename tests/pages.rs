//! Tests for public pages, signing in, and the dashboard.
//!
//! These tests need a PostgreSQL server, see `common::db` for how to point
//! them at one, and run with `cargo test -- --ignored`.

use actix_web::http::StatusCode;
use failure::Fallible;
use gci_schools::{
    config::Config,
    models::{Module, School, User, user::NewUser},
};
use serde_derive::Deserialize;
use serde_json::json;

mod common;

use self::common::{CONFIG, Client, Connection, Pool, Pooled};

#[gci_schools::test_database]
fn setup_db(db: &Connection) -> Fallible<()> {
    let school = School::create(db, "School of Leadership", "Equipping leaders")?;
    Module::create(db, &school, "Servant leadership", "", None)?;

    User::create(db, NewUser {
        username: "student",
        email: "student@gci.test",
        first_name: "Grace",
        last_name: "",
        password: "correct horse",
        is_superuser: false,
    })?;

    User::create(db, NewUser {
        username: "pastor",
        email: "pastor@gci.test",
        first_name: "",
        last_name: "",
        password: "battery staple",
        is_superuser: true,
    })?;

    Ok(())
}

fn has_region(body: &str, region: &str) -> bool {
    body.contains(&format!("data-region=\"{}\"", region))
}

/// Test configuration with an authentication page turned off.
fn without(page: &str) -> Config {
    let mut config = CONFIG.clone();
    let mut settings = serde_json::Map::new();
    settings.insert("enabled".to_string(), false.into());
    config.auth.pages.insert(page.to_string(), settings);
    config
}

#[gci_schools::test]
#[ignore]
fn landing_page_shows_hero(mut client: Client) {
    let body = client.get("/")
        .send()
        .assert_success()
        .text();

    assert!(has_region(&body, "header"));
    assert!(has_region(&body, "hero"));
    assert!(has_region(&body, "footer"));
    assert!(!has_region(&body, "signin"));
    assert!(!has_region(&body, "signup"));
}

#[gci_schools::test]
#[ignore]
fn signin_page_shows_only_its_form(mut client: Client) {
    let body = client.get("/signin/?next=/dashboard/")
        .send()
        .assert_success()
        .text();

    assert!(has_region(&body, "signin"));
    assert!(!has_region(&body, "signup"));
    assert!(!has_region(&body, "hero"));
    assert!(body.contains("/dashboard/"));
}

#[gci_schools::test]
#[ignore]
fn bad_credentials_render_the_form_again(mut client: Client) {
    let body = client.post("/signin/")
        .form(&[("username", "student"), ("password", "wrong")])
        .assert_success()
        .text();

    assert!(has_region(&body, "signin"));
    assert!(body.contains("Invalid username or password."));
}

#[gci_schools::test]
#[ignore]
fn dashboard_requires_signing_in(mut client: Client) {
    let rsp = client.get("/dashboard/")
        .send()
        .assert_status(StatusCode::SEE_OTHER);

    assert_eq!(rsp.header("location"), "/signin/?next=/dashboard/");
}

#[gci_schools::test]
#[ignore]
fn students_see_their_modules(mut client: Client) {
    client.sign_in("student", "correct horse");

    let body = client.get("/dashboard/")
        .send()
        .assert_success()
        .text();

    assert!(body.contains("Welcome, Grace"));
    assert!(body.contains("You are not enrolled in any modules yet."));
    assert!(!body.contains("data-school="));
}

#[gci_schools::test]
#[ignore]
fn staff_see_all_schools(mut client: Client) {
    client.sign_in("pastor", "battery staple");

    let body = client.get("/dashboard/")
        .send()
        .assert_success()
        .text();

    assert!(body.contains("School of Leadership"));
    assert!(body.contains("Servant leadership"));
}

#[derive(Debug, Deserialize)]
struct EnrollmentData {
    student: i32,
    completed: bool,
}

#[gci_schools::test]
#[ignore]
fn students_can_enroll_themselves(mut client: Client) {
    client.sign_in("student", "correct horse");

    let data = client.post("/api/v1/modules/1/enroll")
        .send()
        .assert_status(StatusCode::CREATED)
        .json::<EnrollmentData>();

    assert_eq!(data.student, 1);
    assert!(!data.completed);

    client.post("/api/v1/modules/1/enroll")
        .send()
        .assert_error(StatusCode::BAD_REQUEST, "enrollment:new:exists");
}

#[gci_schools::test]
#[ignore]
fn students_cant_manage_schools(mut client: Client) {
    client.sign_in("student", "correct horse");

    client.post("/api/v1/schools")
        .json(json!({ "name": "School of Ministry" }))
        .assert_error(StatusCode::FORBIDDEN, "user:insufficient-permissions");
}

#[gci_schools::test]
#[ignore]
fn api_requires_a_session(mut client: Client) {
    client.get("/api/v1/users/me")
        .send()
        .assert_error(StatusCode::UNAUTHORIZED, "user:session:required");
}

#[gci_schools::test]
#[ignore]
fn disabled_pages_refuse_api_clients(pool: Pool) {
    let mut client = Client::with_config(pool, without("signin"));

    let data = client.get("/signin/")
        .header("X-Requested-With", "XMLHttpRequest")
        .send()
        .assert_status(StatusCode::FORBIDDEN)
        .json::<serde_json::Value>();

    assert_eq!(data, json!({ "error": "signin is currently unavailable." }));

    client.get("/signup/")
        .header("X-Requested-With", "XMLHttpRequest")
        .send()
        .assert_success();

    let data = client.post("/signin/")
        .header("X-Requested-With", "XMLHttpRequest")
        .form(&[("username", "student"), ("password", "correct horse")])
        .assert_status(StatusCode::FORBIDDEN)
        .json::<serde_json::Value>();

    assert_eq!(data, json!({ "error": "signin is currently unavailable." }));
}

#[gci_schools::test]
#[ignore]
fn disabled_pages_send_browsers_home(pool: Pool) {
    let mut client = Client::with_config(pool, without("signup"));

    let flash = {
        let rsp = client.get("/signup/")
            .send()
            .assert_status(StatusCode::SEE_OTHER);
        assert_eq!(rsp.header("location"), "/");
        rsp.cookie("flash").into_owned()
    };

    let body = client.get("/")
        .cookie(flash)
        .send()
        .assert_success()
        .text();

    assert!(body.contains("Signup is currently unavailable."));
}

#[gci_schools::test]
#[ignore]
fn signing_up_signs_in(mut client: Client) {
    let session = {
        let rsp = client.post("/signup/")
            .form(&[
                ("username", "deacon"),
                ("email", "deacon@gci.test"),
                ("password1", "narrow gate 42"),
                ("password2", "narrow gate 42"),
            ])
            .assert_status(StatusCode::SEE_OTHER);
        assert_eq!(rsp.header("location"), "/signin/");
        rsp.cookie("sesid").into_owned()
    };

    let data = client.get("/api/v1/users/me")
        .cookie(session)
        .send()
        .assert_success()
        .json::<serde_json::Value>();

    assert_eq!(data["username"], "deacon");
    assert_eq!(data["role"], "student");
}

#[gci_schools::test]
#[ignore]
fn signed_in_users_skip_auth_forms(mut client: Client) {
    client.sign_in("student", "correct horse");

    for &path in &["/signin/", "/signup/"] {
        let rsp = client.get(path)
            .send()
            .assert_status(StatusCode::SEE_OTHER);
        assert_eq!(rsp.header("location"), "/", "{}", path);
    }
}

#[gci_schools::test]
#[ignore]
fn signing_out_ends_the_session(mut client: Client) {
    client.sign_in("student", "correct horse");

    let flash = {
        let rsp = client.post("/signout/")
            .send()
            .assert_status(StatusCode::SEE_OTHER);
        assert_eq!(rsp.header("location"), "/");

        let cleared = rsp.set_cookie("sesid");
        assert!(cleared.contains("HttpOnly"), "{}", cleared);
        assert!(cleared.contains("Max-Age=0"), "{}", cleared);

        rsp.cookie("flash").into_owned()
    };

    let body = client.get("/")
        .cookie(flash)
        .send()
        .assert_success()
        .text();
    assert!(body.contains("You have been successfully logged out."));

    client.get("/api/v1/users/me")
        .send()
        .assert_error(StatusCode::UNAUTHORIZED, "user:session:required");
}

#[gci_schools::test]
#[ignore]
fn changing_password_ends_sessions(db: Pooled, mut client: Client) -> Fallible<()> {
    client.sign_in("student", "correct horse");
    client.get("/api/v1/users/me").send().assert_success();

    User::by_username(&*db, "student")?.change_password(&*db, "narrow gate 42")?;

    client.get("/api/v1/users/me")
        .send()
        .assert_error(StatusCode::UNAUTHORIZED, "user:session:required");

    client.post("/signin/")
        .form(&[("username", "student"), ("password", "correct horse")])
        .assert_success();

    client.sign_in("student", "narrow gate 42");
    client.get("/api/v1/users/me").send().assert_success();

    Ok(())
}

#[gci_schools::test]
#[ignore]
fn inactive_users_cant_sign_in(db: Pooled, mut client: Client) -> Fallible<()> {
    User::by_username(&*db, "student")?.set_active(&*db, false)?;

    let body = client.post("/signin/")
        .form(&[("username", "student"), ("password", "correct horse")])
        .assert_success()
        .text();
    assert!(body.contains("Invalid username or password."));

    User::by_username(&*db, "student")?.set_active(&*db, true)?;
    client.sign_in("student", "correct horse");

    Ok(())
}
