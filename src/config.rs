use std::path::Path;

use chrono::Duration;
use log::{error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::time::Duration as StdDuration,
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    ballot::{BallotTiming, CountdownSpec},
    store::{FileStore, Storage},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "defaults::auth_ttl")]
    auth_ttl: u32,
    #[serde(default = "defaults::ballot_duration")]
    ballot_duration: u32,
    #[serde(default = "defaults::warning_threshold")]
    warning_threshold: u32,
    #[serde(default = "defaults::critical_threshold")]
    critical_threshold: u32,
    #[serde(default = "defaults::delay_ms")]
    auto_submit_delay_ms: u64,
    #[serde(default = "defaults::delay_ms")]
    acknowledge_delay_ms: u64,
    #[serde(default = "defaults::delay_ms")]
    persist_delay_ms: u64,
    #[serde(default = "defaults::results_refresh")]
    results_refresh: u32,
    #[serde(default)]
    store_path: Option<String>,
    // secrets
    jwt_secret: String,
}

mod defaults {
    pub fn auth_ttl() -> u32 {
        3600
    }

    pub fn ballot_duration() -> u32 {
        30 * 60
    }

    pub fn warning_threshold() -> u32 {
        10 * 60
    }

    pub fn critical_threshold() -> u32 {
        5 * 60
    }

    pub fn delay_ms() -> u64 {
        2000
    }

    pub fn results_refresh() -> u32 {
        120
    }
}

impl Config {
    /// Valid lifetime of session cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign session JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Time allowed to fill in a ballot, and when to warn about it.
    pub fn countdown(&self) -> CountdownSpec {
        CountdownSpec {
            budget: self.ballot_duration,
            warning_at: self.warning_threshold,
            critical_at: self.critical_threshold,
        }
    }

    /// Cosmetic delays while submitting a ballot.
    pub fn timing(&self) -> BallotTiming {
        BallotTiming {
            auto_submit_delay: StdDuration::from_millis(self.auto_submit_delay_ms),
            acknowledge_delay: StdDuration::from_millis(self.acknowledge_delay_ms),
            persist_delay: StdDuration::from_millis(self.persist_delay_ms),
        }
    }

    /// Period of the simulated results refresh.
    pub fn results_refresh(&self) -> StdDuration {
        StdDuration::from_secs(self.results_refresh.into())
    }

    /// Backing file for the key/value store. `None` keeps everything in memory.
    pub fn store_path(&self) -> Option<&Path> {
        self.store_path.as_deref().map(Path::new)
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if config.results_refresh == 0 {
            error!("`results_refresh` must be at least one second");
            return Err(rocket);
        }
        if config.critical_threshold > config.warning_threshold {
            warn!("`critical_threshold` is above `warning_threshold`; the warning stage will be skipped");
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// A fairing that opens the key/value store named by the config and places a
/// `Storage` handle into managed state. Must be attached after `ConfigFairing`.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Key/value store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let path = match rocket.state::<Config>() {
            Some(config) => config.store_path().map(Path::to_path_buf),
            None => {
                error!("Config was not available when opening the store");
                return Err(rocket);
            }
        };
        let storage = match path {
            Some(path) => match FileStore::open(&path) {
                Ok(store) => {
                    info!("Using store at {}", store.path().display());
                    Storage::new(store)
                }
                Err(e) => {
                    error!("Failed to open store at {}: {e}", path.display());
                    return Err(rocket);
                }
            },
            None => {
                warn!("No `store_path` configured, nothing will outlive this process");
                Storage::in_memory()
            }
        };

        // Manage the state.
        rocket = rocket.manage(storage);
        Ok(rocket)
    }
}

#[cfg(test)]
mod tests {
    use rocket::{error::ErrorKind, figment::Figment};

    use super::*;

    fn figment() -> Figment {
        Figment::from(rocket::Config::debug_default())
            .merge(("jwt_secret", "test-secret"))
            .merge(("log_level", "off"))
    }

    #[tokio::test]
    async fn defaults_fill_missing_keys() {
        let rocket = rocket::custom(figment())
            .attach(ConfigFairing)
            .ignite()
            .await
            .unwrap();
        let config = rocket.state::<Config>().unwrap();
        assert_eq!(StdDuration::from_secs(120), config.results_refresh());
        assert_eq!(Duration::seconds(3600), config.auth_ttl());
        assert_eq!(None, config.store_path());
    }

    #[tokio::test]
    async fn zero_refresh_period_aborts_launch() {
        let result = rocket::custom(figment().merge(("results_refresh", 0)))
            .attach(ConfigFairing)
            .ignite()
            .await;
        let error = result.err().unwrap();
        assert!(matches!(error.kind(), ErrorKind::FailedFairings(_)));
    }

    #[tokio::test]
    async fn missing_secret_aborts_launch() {
        let figment = Figment::from(rocket::Config::debug_default()).merge(("log_level", "off"));
        let result = rocket::custom(figment).attach(ConfigFairing).ignite().await;
        let error = result.err().unwrap();
        assert!(matches!(error.kind(), ErrorKind::FailedFairings(_)));
    }
}
