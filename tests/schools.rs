//! Tests for schools, their modules, and student enrollments.
//!
//! These tests need a PostgreSQL server, see `common::db` for how to point
//! them at one, and run with `cargo test -- --ignored`.

use failure::Fallible;
use gci_schools::{
    db::models::{ModuleChange, RoleChange, SchoolChange},
    models::{
        Enrollment,
        Module,
        Role,
        School,
        User,
        contact::{EmailAddress, EmailAddressData, PhoneNumber, PhoneNumberData},
        enrollment::CreateEnrollmentError,
        module::CreateModuleError,
        role::{PermissionLine, PermissionsReport},
        school::CreateSchoolError,
        user::NewUser,
    },
};

mod common;

use self::common::{Connection, Pooled};

#[gci_schools::test_database]
fn setup_db(db: &Connection) -> Fallible<()> {
    let school = School::create(db, "School of Leadership", "")?;
    Module::create(db, &school, "Servant leadership", "", None)?;
    Module::create(db, &school, "Leading teams", "", None)?;

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

#[gci_schools::test]
#[ignore]
fn modules_are_appended_after_the_last(db: Pooled) -> Fallible<()> {
    let school = School::by_name(&*db, "School of Leadership")?;
    let module = Module::create(&*db, &school, "Vision", "", None)?;

    assert_eq!(module.position, 3);

    let positions = school.modules(&*db)?
        .iter()
        .map(|module| module.position)
        .collect::<Vec<_>>();
    assert_eq!(positions, [1, 2, 3]);

    Ok(())
}

#[gci_schools::test]
#[ignore]
fn module_positions_are_unique_within_a_school(db: Pooled) -> Fallible<()> {
    let school = School::by_name(&*db, "School of Leadership")?;

    match Module::create(&*db, &school, "Vision", "", Some(1)) {
        Err(CreateModuleError::PositionTaken) => {}
        other => panic!("Expected PositionTaken, got {:?}", other),
    }

    let other = School::create(&*db, "School of Ministry", "")?;
    let module = Module::create(&*db, &other, "Vision", "", Some(1))?;
    assert_eq!(module.position, 1);

    Ok(())
}

#[gci_schools::test]
#[ignore]
fn new_users_get_the_default_role(db: Pooled) -> Fallible<()> {
    let student = User::by_username(&*db, "student")?;

    assert_eq!(student.role_name(&*db)?, "student");
    assert!(!student.is_staff);

    let pastor = User::by_username(&*db, "pastor")?;

    assert_eq!(pastor.role_name(&*db)?, "admin");
    assert!(pastor.is_staff);

    Ok(())
}

#[gci_schools::test]
#[ignore]
fn only_students_can_enroll(db: Pooled) -> Fallible<()> {
    let school = School::by_name(&*db, "School of Leadership")?;
    let module = school.modules(&*db)?.remove(0);

    let student = User::by_username(&*db, "student")?;
    let enrollment = Enrollment::create(&*db, &student, &module)?;
    assert!(!enrollment.completed);
    assert_eq!(enrollment.display_name(&*db)?, "student in Servant leadership");

    match Enrollment::create(&*db, &student, &module) {
        Err(CreateEnrollmentError::AlreadyEnrolled) => {}
        other => panic!("Expected AlreadyEnrolled, got {:?}", other),
    }

    let pastor = User::by_username(&*db, "pastor")?;
    match Enrollment::create(&*db, &pastor, &module) {
        Err(CreateEnrollmentError::NotAStudent) => {}
        other => panic!("Expected NotAStudent, got {:?}", other),
    }

    Ok(())
}

#[gci_schools::test]
#[ignore]
fn deleting_a_school_removes_its_modules(db: Pooled) -> Fallible<()> {
    let school = School::by_name(&*db, "School of Leadership")?;
    let module = school.modules(&*db)?.remove(0);
    let student = User::by_username(&*db, "student")?;
    let enrollment = Enrollment::create(&*db, &student, &module)?;
    let enrollment_id = enrollment.id;

    school.delete(&*db)?;

    assert!(Module::all(&*db)?.is_empty());
    assert!(Enrollment::by_id(&*db, enrollment_id).is_err());

    Ok(())
}

#[gci_schools::test]
#[ignore]
fn staff_status_follows_role(db: Pooled) -> Fallible<()> {
    let mut student = User::by_username(&*db, "student")?;

    student.set_role(&*db, "instructor")?;
    assert!(student.is_staff);

    student.set_role(&*db, "student")?;
    assert!(!student.is_staff);

    assert!(User::sync_staff_status(&*db)?.is_empty());

    Ok(())
}

#[gci_schools::test]
#[ignore]
fn names_are_stored_trimmed(db: Pooled) -> Fallible<()> {
    let mut school = School::create(&*db, "  School of Ministry ", "")?;
    assert_eq!(school.name, "School of Ministry");

    match School::create(&*db, "School of Ministry  ", "") {
        Err(CreateSchoolError::Duplicate) => {}
        other => panic!("Expected Duplicate, got {:?}", other),
    }

    let padded = format!(" {} ", "x".repeat(100));
    school.update(&*db, SchoolChange { name: Some(&padded), description: None })?;
    assert_eq!(school.name, "x".repeat(100));

    let mut module = Module::create(&*db, &school, "\tPreaching ", "", None)?;
    assert_eq!(module.title, "Preaching");

    module.update(&*db, ModuleChange {
        title: Some(" Pastoral care "),
        description: None,
        position: None,
    })?;
    assert_eq!(module.title, "Pastoral care");

    Ok(())
}

#[gci_schools::test]
#[ignore]
fn appending_after_the_last_position_fails(db: Pooled) -> Fallible<()> {
    let school = School::create(&*db, "School of Ministry", "")?;
    Module::create(&*db, &school, "Last", "", Some(i32::max_value()))?;

    match Module::create(&*db, &school, "After last", "", None) {
        Err(CreateModuleError::InvalidPosition) => {}
        other => panic!("Expected InvalidPosition, got {:?}", other),
    }

    Ok(())
}

fn superuser(db: &Connection, username: &str) -> Fallible<User> {
    User::create(db, NewUser {
        username,
        email: "",
        first_name: "",
        last_name: "",
        password: "battery staple",
        is_superuser: true,
    }).map_err(From::from)
}

fn set_staff(db: &Connection, name: &str, is_staff: bool) -> Fallible<()> {
    Role::by_name(db, name)?.update(db, RoleChange {
        is_staff_role: Some(is_staff),
        .. RoleChange::default()
    })?;
    Ok(())
}

#[gci_schools::test]
#[ignore]
fn superusers_fall_back_to_another_staff_role(db: Pooled) -> Fallible<()> {
    set_staff(&*db, "admin", false)?;

    let elder = superuser(&*db, "elder")?;
    assert_eq!(elder.role_name(&*db)?, "instructor");
    assert!(elder.is_staff);

    Ok(())
}

#[gci_schools::test]
#[ignore]
fn superusers_promote_admin_to_staff(db: Pooled) -> Fallible<()> {
    set_staff(&*db, "admin", false)?;
    set_staff(&*db, "instructor", false)?;

    let elder = superuser(&*db, "elder")?;
    assert_eq!(elder.role_name(&*db)?, "admin");
    assert!(elder.is_staff);
    assert!(Role::by_name(&*db, "admin")?.is_staff_role);

    Ok(())
}

#[gci_schools::test]
#[ignore]
fn permission_sets_need_one_valid_codename(db: Pooled) -> Fallible<()> {
    let before = Role::by_name(&*db, "student")?.permissions();

    let invalid = vec!["no-dot".to_string(), "schools.fly".to_string()];
    let valid = vec!["schools.add_module".to_string(), "bogus".to_string()];

    let reports = Role::setup_permissions(&*db, vec![
        ("student", &invalid[..]),
        ("deacon", &valid[..]),
        ("instructor", &[][..]),
    ])?;

    match reports.as_slice() {
        [
            PermissionsReport::Applied { role, lines, granted: 0 },
            PermissionsReport::MissingRole(missing),
            PermissionsReport::NoPermissions(empty),
        ] => {
            assert_eq!(role, "student");
            assert!(matches!(lines.as_slice(), [
                PermissionLine::InvalidFormat(_),
                PermissionLine::NotFound(_),
            ]));
            assert_eq!(missing, "deacon");
            assert_eq!(empty, "instructor");
        }
        other => panic!("Unexpected reports {:?}", other),
    }

    assert_eq!(Role::by_name(&*db, "student")?.permissions(), before);

    let reports = Role::setup_permissions(&*db, vec![("student", &valid[..])])?;
    assert!(matches!(reports.as_slice(),
        [PermissionsReport::Applied { granted: 1, .. }]));

    let after = Role::by_name(&*db, "student")?.permissions();
    assert_eq!(after.codenames(), ["schools.add_module"]);

    Ok(())
}

fn phone(number: &str, is_primary: bool, use_for_whatsapp: bool) -> PhoneNumberData {
    PhoneNumberData {
        number: number.to_string(),
        is_active: true,
        is_primary,
        use_for_whatsapp,
        position: 0,
    }
}

#[gci_schools::test]
#[ignore]
fn one_primary_and_one_whatsapp_number(db: Pooled) -> Fallible<()> {
    let office = PhoneNumber::create(&*db, &phone("0712 345678", true, true))?;
    let mobile = PhoneNumber::create(&*db, &phone("0722 000111", false, true))?;

    let primary = PhoneNumber::primary(&*db)?.expect("primary number");
    let whatsapp = PhoneNumber::whatsapp(&*db)?.expect("WhatsApp number");
    assert_eq!(primary.id, office.id);
    assert_eq!(whatsapp.id, mobile.id);

    let mut office = PhoneNumber::by_id(&*db, office.id)?;
    office.update(&*db, &phone("0712 345678", true, true))?;

    let whatsapp = PhoneNumber::whatsapp(&*db)?.expect("WhatsApp number");
    assert_eq!(whatsapp.id, office.id);
    assert!(!PhoneNumber::by_id(&*db, mobile.id)?.use_for_whatsapp);

    Ok(())
}

#[gci_schools::test]
#[ignore]
fn one_primary_email_address(db: Pooled) -> Fallible<()> {
    let email = |email: &str, is_primary| EmailAddressData {
        email: email.to_string(),
        is_active: true,
        is_primary,
        position: 0,
    };

    let info = EmailAddress::create(&*db, &email("info@gci.org", true))?;
    let office = EmailAddress::create(&*db, &email("office@gci.org", true))?;

    let primary = EmailAddress::primary(&*db)?.expect("primary address");
    assert_eq!(primary.id, office.id);
    assert!(!EmailAddress::by_id(&*db, info.id)?.is_primary);

    Ok(())
}
