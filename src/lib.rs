#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, StoreFairing};
use crate::logging::LoggerFairing;
use crate::model::{
    ballot::BallotSessionsFairing, results::ResultsFairing, user::DirectoryFairing,
};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod scheduled_task;

/// Build the server from `Rocket.toml` and the environment.
pub fn build() -> Rocket<Build> {
    assemble(rocket::build())
}

/// Attach everything the server needs to a bare rocket. Fairing order matters:
/// each one relies on the state managed by those before it.
pub fn assemble(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .attach(DirectoryFairing)
        .attach(BallotSessionsFairing)
        .attach(ResultsFairing)
        .attach(LoggerFairing)
        .mount("/", api::routes())
        .register("/", api::catchers())
}

/// A server with an in-memory store, a throwaway secret and short delays.
#[cfg(test)]
pub(crate) fn test_rocket() -> Rocket<Build> {
    let figment = rocket::figment::Figment::from(rocket::Config::debug_default())
        .merge(("jwt_secret", "test-secret"))
        .merge(("auto_submit_delay_ms", 50))
        .merge(("acknowledge_delay_ms", 50))
        .merge(("persist_delay_ms", 50))
        .merge(("log_level", "off"));
    assemble(rocket::custom(figment))
}
