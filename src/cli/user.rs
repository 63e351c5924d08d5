//! Commands for managing users.

use structopt::StructOpt;

use crate::{
    Config,
    Result,
    db,
    models::{User, user::{NewUser, NO_ROLE}},
};
use super::util::{print_table, transaction};

#[derive(StructOpt)]
pub struct Opts {
    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
pub enum Command {
    /// Add a new user
    #[structopt(name = "add")]
    Add(AddOpts),
    /// List users
    #[structopt(name = "list")]
    List,
    /// Assign a role to a user
    #[structopt(name = "set-role")]
    SetRole(SetRoleOpts),
    /// Change a user's password, ending all their sessions
    #[structopt(name = "set-password")]
    SetPassword(SetPasswordOpts),
    /// Allow or forbid a user to sign in
    #[structopt(name = "set-active")]
    SetActive(SetActiveOpts),
}

pub fn main(cfg: &Config, opts: Opts) -> Result<()> {
    match opts.command {
        Command::Add(opts) => add_user(cfg, opts),
        Command::List => list(cfg),
        Command::SetRole(opts) => set_role(cfg, opts),
        Command::SetPassword(opts) => set_password(cfg, opts),
        Command::SetActive(opts) => set_active(cfg, opts),
    }
}

#[derive(StructOpt)]
pub struct AddOpts {
    /// User's username
    username: String,
    /// User's email address
    #[structopt(long = "email", short = "e", default_value = "")]
    email: String,
    /// User's first name
    #[structopt(long = "first-name", default_value = "")]
    first_name: String,
    /// User's last name
    #[structopt(long = "last-name", default_value = "")]
    last_name: String,
    /// User's password
    #[structopt(long = "password", short = "p")]
    password: String,
    /// This user is a superuser
    #[structopt(long = "superuser")]
    is_superuser: bool,
}

pub fn add_user(cfg: &Config, opts: AddOpts) -> Result<()> {
    let db = db::connect(&cfg)?;
    let user = User::create(&db, NewUser {
        username: &opts.username,
        email: &opts.email,
        first_name: &opts.first_name,
        last_name: &opts.last_name,
        password: &opts.password,
        is_superuser: opts.is_superuser,
    })?;

    println!("Created user {}", user.id);

    Ok(())
}

fn list(cfg: &Config) -> Result<()> {
    let db = db::connect(&cfg)?;
    let users = User::all(&db)?;

    let mut rows = Vec::with_capacity(users.len());

    for user in &users {
        let role = user.role(&db)?
            .map_or_else(|| NO_ROLE.to_string(), |role| role.display_name.clone());

        rows.push((
            user.id.to_string(),
            user.username.clone(),
            role,
            if user.is_staff { "yes" } else { "no" },
            if user.is_superuser { "yes" } else { "no" },
        ));
    }

    print_table(("ID", "Username", "Role", "Staff", "Superuser"), &rows);

    Ok(())
}

#[derive(StructOpt)]
pub struct SetRoleOpts {
    /// User's username
    username: String,
    /// Name of the role
    role: String,
}

fn set_role(cfg: &Config, opts: SetRoleOpts) -> Result<()> {
    let db = db::connect(&cfg)?;
    let mut user = User::by_username(&db, &opts.username)?;

    user.set_role(&db, &opts.role)?;

    println!("User {} now has role {} (staff: {})",
        user.username, opts.role, user.is_staff);

    Ok(())
}

#[derive(StructOpt)]
pub struct SetPasswordOpts {
    /// User's username
    username: String,
    /// New password
    #[structopt(long = "password", short = "p")]
    password: String,
}

fn set_password(cfg: &Config, opts: SetPasswordOpts) -> Result<()> {
    let db = db::connect(&cfg)?;
    let mut user = User::by_username(&db, &opts.username)?;

    user.change_password(&db, &opts.password)?;

    println!("Changed password of user {}", user.username);

    Ok(())
}

#[derive(StructOpt)]
pub struct SetActiveOpts {
    /// User's username
    username: String,
    /// Deactivate the user instead
    #[structopt(long = "inactive")]
    inactive: bool,
}

fn set_active(cfg: &Config, opts: SetActiveOpts) -> Result<()> {
    let db = db::connect(&cfg)?;
    let mut user = User::by_username(&db, &opts.username)?;

    user.set_active(&db, !opts.inactive)?;

    println!("User {} is now {}",
        user.username, if user.is_active { "active" } else { "inactive" });

    Ok(())
}

#[derive(StructOpt)]
pub struct SyncOpts {
    /// Show what would be changed without making changes
    #[structopt(long = "dry-run")]
    dry_run: bool,
}

pub fn sync_staff_status(cfg: &Config, opts: SyncOpts) -> Result<()> {
    let db = db::connect(&cfg)?;

    println!("Syncing staff status for all users...");

    let changes = transaction(&db, opts.dry_run, || {
        User::sync_staff_status(&db).map_err(Into::into)
    })?;

    for change in &changes {
        println!("User {} ({}): is_staff {} -> {}",
            change.username, change.role, change.was_staff, change.is_staff);
    }

    if opts.dry_run {
        println!("Would update {} users (dry run)", changes.len());
    } else {
        println!("Successfully updated {} users", changes.len());
    }

    Ok(())
}
