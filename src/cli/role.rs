//! Commands for managing roles and their permissions.

use std::collections::BTreeMap;
use structopt::StructOpt;

use crate::{
    Config,
    Result,
    db,
    models::{
        Role,
        User,
        role::{self, PermissionLine, PermissionsReport, RoleDefinition},
    },
    permissions::PermissionBits,
};
use super::util::{parse_permissions, print_table, transaction};

#[derive(StructOpt)]
pub struct Opts {
    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
pub enum Command {
    /// List roles
    #[structopt(name = "list")]
    List,
    /// Add a role
    #[structopt(name = "add")]
    Add(AddOpts),
}

pub fn main(cfg: &Config, opts: Opts) -> Result<()> {
    match opts.command {
        Command::List => list(cfg),
        Command::Add(opts) => add_role(cfg, opts),
    }
}

fn list(cfg: &Config) -> Result<()> {
    let db = db::connect(&cfg)?;
    let roles = Role::all(&db)?;

    let rows = roles.iter()
        .map(|role| (
            role.id.to_string(),
            role.name.as_str(),
            role.display_name.as_str(),
            if role.is_staff_role { "yes" } else { "no" },
            if role.is_default_role { "yes" } else { "no" },
        ))
        .collect::<Vec<_>>();

    print_table(("ID", "Name", "Display name", "Staff", "Default"), &rows);

    Ok(())
}

#[derive(StructOpt)]
pub struct AddOpts {
    /// Role's name
    name: String,
    /// Role's human readable name
    #[structopt(long = "display-name")]
    display_name: Option<String>,
    /// Users holding this role are staff
    #[structopt(long = "staff")]
    is_staff_role: bool,
    /// Give this role to new users
    #[structopt(long = "default")]
    is_default_role: bool,
    #[structopt(long = "description", default_value = "")]
    description: String,
    /// Role's permissions
    #[structopt(long = "permissions", parse(try_from_str = "parse_permissions"))]
    permissions: Option<PermissionBits>,
}

fn add_role(cfg: &Config, opts: AddOpts) -> Result<()> {
    let db = db::connect(&cfg)?;
    let permissions = opts.permissions.unwrap_or_else(PermissionBits::empty);
    let definition = RoleDefinition {
        display_name: opts.display_name.unwrap_or_else(|| opts.name.clone()),
        name: opts.name,
        is_staff_role: opts.is_staff_role,
        is_default_role: opts.is_default_role,
        description: opts.description,
    };
    let role = Role::create(&db, &definition, permissions)?;

    println!("Created role {}", role.id);

    Ok(())
}

#[derive(StructOpt)]
pub struct SetupOpts {
    /// Overwrite existing roles
    #[structopt(long = "force")]
    force: bool,
    /// Update staff status of existing users based on their roles
    #[structopt(long = "update-users")]
    update_users: bool,
    /// Show what would be done without making changes
    #[structopt(long = "dry-run")]
    dry_run: bool,
    /// Role definitions to use instead of the built-in ones, as a JSON list
    #[structopt(long = "roles-data")]
    roles_data: Option<String>,
}

pub fn setup(cfg: &Config, opts: SetupOpts) -> Result<()> {
    let definitions = match opts.roles_data {
        Some(ref data) => serde_json::from_str::<Vec<RoleDefinition>>(data)?,
        None => role::default_definitions(),
    };

    if opts.dry_run {
        println!("DRY RUN MODE - No changes will be made");
    }

    let db = db::connect(&cfg)?;

    transaction(&db, opts.dry_run, || {
        let report = Role::setup(&db, &definitions, opts.force)?;

        if !report.created.is_empty() {
            println!("Created roles: {}", report.created.join(", "));
        }

        if !report.updated.is_empty() {
            println!("Updated roles: {}", report.updated.join(", "));
        }

        for name in &report.skipped {
            debug!("Role already exists: {} (use --force to update)", name);
        }

        if report.created.is_empty() && report.updated.is_empty() {
            println!("No roles were created or updated");
        }

        if opts.update_users {
            let changes = User::sync_staff_status(&db)?;

            for change in &changes {
                debug!("User {}: staff status {} -> {} (role: {})",
                    change.username, change.was_staff, change.is_staff, change.role);
            }

            if changes.is_empty() {
                println!("No users needed staff status updates");
            } else {
                println!("Updated staff status for {} users", changes.len());
            }
        }

        Ok(())
    })?;

    if !opts.dry_run {
        println!("Successfully set up roles!");
    }

    Ok(())
}

#[derive(StructOpt)]
pub struct PermissionsOpts {
    /// Only set up permissions of this role
    #[structopt(long = "role")]
    role: Option<String>,
    /// Show what would be done without making changes
    #[structopt(long = "dry-run")]
    dry_run: bool,
    /// Permission codenames of each role, as a JSON object mapping role names
    /// to lists of codenames
    #[structopt(long = "permissions-data")]
    permissions_data: Option<String>,
}

pub fn setup_permissions(cfg: &Config, opts: PermissionsOpts) -> Result<()> {
    let mut sets = match opts.permissions_data {
        Some(ref data) => serde_json::from_str::<BTreeMap<String, Vec<String>>>(data)?,
        None => role::default_definitions()
            .into_iter()
            .map(|definition| {
                let permissions = role::default_permissions(&definition.name);
                (definition.name, permissions)
            })
            .collect(),
    };

    if let Some(ref name) = opts.role {
        let permissions = sets.remove(name)
            .unwrap_or_else(|| role::default_permissions(name));
        sets = BTreeMap::new();
        sets.insert(name.clone(), permissions);
    }

    if opts.dry_run {
        println!("DRY RUN MODE - No changes will be made");
    }

    let db = db::connect(&cfg)?;

    let reports = transaction(&db, opts.dry_run, || {
        Role::setup_permissions(&db, sets.iter()
            .map(|(name, codenames)| (name.as_str(), codenames.as_slice())))
            .map_err(Into::into)
    })?;

    for report in reports {
        print_permissions_report(&report);
    }

    if !opts.dry_run {
        println!("Successfully set up role permissions!");
    }

    Ok(())
}

fn print_permissions_report(report: &PermissionsReport) {
    match *report {
        PermissionsReport::MissingRole(ref name) =>
            eprintln!("Role \"{}\" does not exist", name),
        PermissionsReport::NoPermissions(ref name) =>
            println!("No permissions defined for role \"{}\"", name),
        PermissionsReport::Applied { ref role, ref lines, granted } => {
            println!("Setting up permissions for role: {}", role);

            for line in lines {
                match *line {
                    PermissionLine::Granted(ref name) => println!("  ✓ {}", name),
                    PermissionLine::InvalidFormat(ref name) =>
                        println!("  ✗ Invalid permission format: {}", name),
                    PermissionLine::NotFound(ref name) =>
                        println!("  ✗ Permission not found: {}", name),
                }
            }

            println!("Set {} permissions for role \"{}\"", granted, role);
        }
    }
}
