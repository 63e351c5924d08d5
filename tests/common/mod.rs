mod client;
mod db;
mod support;

pub use self::{
    client::{CONFIG, Client},
    db::{Connection, Database, Pool, Pooled, setup_db},
    support::{Fixture, TestResult, run_test},
};
