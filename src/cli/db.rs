//! Database maintenance.

use std::{collections::BTreeMap, fs, path::PathBuf};
use structopt::StructOpt;

use crate::{
    Config,
    Result,
    db::{self, types::OrgDetailKind},
    models::{
        Module,
        School,
        contact::{
            EmailAddress,
            EmailAddressData,
            PhoneNumber,
            PhoneNumberData,
            PhysicalAddress,
            PhysicalAddressData,
            SocialMediaLink,
            SocialMediaLinkData,
            address::SavePhysicalAddressError,
            email::SaveEmailAddressError,
            phone::SavePhoneNumberError,
            social::SaveSocialMediaLinkError,
        },
        module::CreateModuleError,
        org,
        school::FindSchoolError,
    },
};
use super::util::transaction;

pub fn migrate(cfg: &Config) -> Result<()> {
    let db = db::connect(cfg)?;

    db::migrate(&db)?;

    println!("Database is up to date");

    Ok(())
}

#[derive(StructOpt)]
pub struct SeedOpts {
    /// Fixture to load
    #[structopt(default_value = "fixtures/example.json", parse(from_os_str))]
    fixture: PathBuf,
    /// Show what would be loaded without making changes
    #[structopt(long = "dry-run")]
    dry_run: bool,
}

/// Contents of a fixture file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Fixture {
    /// Organisation details, keyed by their machine names.
    pub org_details: BTreeMap<String, String>,
    pub social_media_links: Vec<SocialMediaLinkData>,
    pub phone_numbers: Vec<PhoneNumberData>,
    pub email_addresses: Vec<EmailAddressData>,
    pub physical_addresses: Vec<PhysicalAddressData>,
    pub schools: Vec<FixtureSchool>,
}

#[derive(Debug, Deserialize)]
pub struct FixtureSchool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub modules: Vec<FixtureModule>,
}

#[derive(Debug, Deserialize)]
pub struct FixtureModule {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub position: Option<i32>,
}

#[derive(Debug, Default)]
struct SeedReport {
    created: usize,
    skipped: usize,
}

impl SeedReport {
    fn record<T, E>(&mut self, result: Result<T, E>, is_duplicate: fn(&E) -> bool)
    -> Result<(), E> {
        match result {
            Ok(_) => self.created += 1,
            Err(ref err) if is_duplicate(err) => self.skipped += 1,
            Err(err) => return Err(err),
        }
        Ok(())
    }
}

pub fn seed(cfg: &Config, opts: SeedOpts) -> Result<()> {
    let data = fs::read(&opts.fixture)
        .map_err(|e| format_err!("Can't read {}: {}", opts.fixture.display(), e))?;
    let fixture = serde_json::from_slice::<Fixture>(&data)?;

    let db = db::connect(cfg)?;

    let report = transaction(&db, opts.dry_run, || load(&db, &fixture))?;

    if opts.dry_run {
        println!("Would create {} objects, {} already exist (dry run)",
            report.created, report.skipped);
    } else {
        println!("Created {} objects, {} already existed",
            report.created, report.skipped);
    }

    Ok(())
}

fn load(dbcon: &db::Connection, fixture: &Fixture) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for (key, value) in &fixture.org_details {
        let kind = OrgDetailKind::from_key(key)
            .ok_or_else(|| format_err!("Unknown organisation detail {}", key))?;
        org::set_detail(dbcon, kind, value)?;
        report.created += 1;
    }

    for link in &fixture.social_media_links {
        report.record(SocialMediaLink::create(dbcon, link),
            |e| match *e { SaveSocialMediaLinkError::Duplicate => true, _ => false })?;
    }

    for number in &fixture.phone_numbers {
        report.record(PhoneNumber::create(dbcon, number),
            |e| match *e { SavePhoneNumberError::Duplicate => true, _ => false })?;
    }

    for email in &fixture.email_addresses {
        report.record(EmailAddress::create(dbcon, email),
            |e| match *e { SaveEmailAddressError::Duplicate => true, _ => false })?;
    }

    for address in &fixture.physical_addresses {
        report.record(PhysicalAddress::create(dbcon, address),
            |e| match *e { SavePhysicalAddressError::Duplicate => true, _ => false })?;
    }

    for data in &fixture.schools {
        let school = match School::by_name(dbcon, &data.name) {
            Ok(school) => {
                report.skipped += 1;
                school
            }
            Err(FindSchoolError::NotFound) => {
                report.created += 1;
                School::create(dbcon, &data.name, &data.description)?
            }
            Err(err) => return Err(err.into()),
        };

        let existing = school.modules(dbcon)?;

        for module in &data.modules {
            if existing.iter().any(|m| m.title == module.title) {
                report.skipped += 1;
                continue;
            }

            report.record(
                Module::create(dbcon, &school, &module.title, &module.description,
                    module.position),
                |e| match *e { CreateModuleError::PositionTaken => true, _ => false },
            )?;
        }
    }

    Ok(report)
}
