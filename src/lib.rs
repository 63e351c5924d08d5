// TEMPORARY, see diesel-rs/diesel#1787.
#![allow(proc_macro_derive_resolution_fallback)]

#[macro_use] extern crate bitflags;
#[macro_use] extern crate diesel;
#[macro_use] extern crate diesel_migrations;
#[macro_use] extern crate failure;
#[macro_use] extern crate failure_derive;
#[macro_use(ApiError)] extern crate gci_schools_macros;
#[macro_use] extern crate lazy_static;
#[macro_use] extern crate log;
#[macro_use] extern crate serde_derive;
#[macro_use] extern crate tera;

pub use gci_schools_macros::{test, test_database};

pub use self::cli::main;

pub(crate) use self::config::Config;

#[macro_use] mod macros;

pub mod api;
pub mod apps;
pub mod audit;
pub mod cli;
pub mod config;
pub mod db;
pub mod layout;
pub mod mail;
pub mod models;
pub mod permissions;
pub mod registry;
pub mod site;
pub mod templates;
pub mod utils;

pub type Result<T, E=failure::Error> = std::result::Result<T, E>;
