use sentry::protocol::Event;
use std::{env, mem, sync::Arc};
use structopt::StructOpt;

use crate::{Result, config::Config};

mod db;
mod role;
mod school;
mod server;
mod user;
mod util;

#[derive(StructOpt)]
struct Opts {
    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
enum Command {
    /// Start the server
    #[structopt(name = "start")]
    Start,
    /// Run pending database migrations
    #[structopt(name = "migrate")]
    Migrate,
    /// Load example data into the database
    #[structopt(name = "seed")]
    Seed(db::SeedOpts),
    /// Manage roles
    #[structopt(name = "role")]
    Role(role::Opts),
    /// Create or update the built-in roles
    #[structopt(name = "setup-roles")]
    SetupRoles(role::SetupOpts),
    /// Replace permissions of roles
    #[structopt(name = "setup-role-permissions")]
    SetupRolePermissions(role::PermissionsOpts),
    /// Manage users
    #[structopt(name = "user")]
    User(user::Opts),
    /// Make staff status of users follow their roles
    #[structopt(name = "sync-staff-status")]
    SyncStaffStatus(user::SyncOpts),
    /// Manage schools
    #[structopt(name = "school")]
    School(school::SchoolOpts),
    /// Manage modules
    #[structopt(name = "module")]
    Module(school::ModuleOpts),
}

pub fn main() -> Result<()> {
    let opts = Opts::from_args();
    let config = crate::config::load()?;

    setup_sentry(config)?;
    setup_logging(&config.logging)?;

    // Run validation after sentry and logging setup so that they can catch bugs
    // in validation.
    config.validate()?;

    match opts.command {
        Command::Start => server::start(config),
        Command::Migrate => db::migrate(config),
        Command::Seed(opts) => db::seed(config, opts),
        Command::Role(opts) => role::main(config, opts),
        Command::SetupRoles(opts) => role::setup(config, opts),
        Command::SetupRolePermissions(opts) => role::setup_permissions(config, opts),
        Command::User(opts) => user::main(config, opts),
        Command::SyncStaffStatus(opts) => user::sync_staff_status(config, opts),
        Command::School(opts) => school::schools(config, opts),
        Command::Module(opts) => school::modules(config, opts),
    }
}

fn setup_sentry(config: &Config) -> Result<()> {
    if let Some(ref sentry) = config.sentry {
        env::set_var("RUST_BACKTRACE", "1");
        mem::forget(sentry::init((sentry.dsn.as_str(), sentry::ClientOptions {
            trim_backtraces: true,
            debug: cfg!(debug_assertions),
            release: Some(env!("CARGO_PKG_VERSION").into()),
            server_name: Some(config.server.domain.clone().into()),
            before_send: Some(Arc::new(Box::new(before_send_event_to_sentry))),
            .. Default::default()
        })));
        sentry::integrations::panic::register_panic_handler();
    }

    Ok(())
}

fn setup_logging(config: &crate::config::Logging) -> Result<()> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(config.level);

    if let Some(level) = config.network {
        builder.filter_module("actix_web", level);
    }

    for (module, level) in &config.filters {
        builder.filter_module(&module, *level);
    }

    builder.try_init()?;
    Ok(())
}

fn before_send_event_to_sentry(mut ev: Event<'static>) -> Option<Event<'static>> {
    if let Some(ref mut request) = ev.request {
        request.headers.remove("cookie");
    }
    Some(ev)
}
