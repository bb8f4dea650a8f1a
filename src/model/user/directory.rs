use log::{debug, error, info};
use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::sync::RwLock,
    Build, Rocket,
};
use thiserror::Error;

use crate::model::store::{Storage, DEMO_DATA_LOADED};

use super::{hash_password, Registration, SessionUser, UserId, UserRecord};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Email already registered")]
    EmailTaken,
    #[error(transparent)]
    Hash(#[from] argon2::Error),
}

/// The in-memory list of registered users.
#[derive(Debug, Default)]
pub struct UserDirectory {
    users: RwLock<Vec<UserRecord>>,
}

/// Demo accounts: (email, password, first name, last name, voter ID, admin).
const DEMO_USERS: [(&str, &str, &str, &str, &str, bool); 2] = [
    (
        "john.doe@example.com",
        "password123",
        "John",
        "Doe",
        "VID123456789",
        false,
    ),
    (
        "admin@securevote.com",
        "admin123",
        "Admin",
        "User",
        "ADMIN001",
        true,
    ),
];

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory holding the demo voter and admin.
    pub fn with_demo_users() -> Result<Self, argon2::Error> {
        let users = DEMO_USERS
            .iter()
            .zip(1..)
            .map(|(&(email, password, first_name, last_name, voter_id, is_admin), id)| {
                Ok(UserRecord {
                    id: UserId(id),
                    email: email.to_string(),
                    password_hash: hash_password(password)?,
                    first_name: first_name.to_string(),
                    last_name: last_name.to_string(),
                    voter_id: voter_id.to_string(),
                    is_admin,
                })
            })
            .collect::<Result<Vec<_>, argon2::Error>>()?;
        Ok(Self {
            users: RwLock::new(users),
        })
    }

    /// Demo credentials, for announcing at startup.
    pub fn demo_credentials() -> impl Iterator<Item = (&'static str, &'static str, bool)> {
        DEMO_USERS
            .into_iter()
            .map(|(email, password, _, _, _, is_admin)| (email, password, is_admin))
    }

    /// Find the user with this email and check their password.
    pub async fn authenticate(&self, email: &str, password: &str) -> Option<SessionUser> {
        let users = self.users.read().await;
        let user = users
            .iter()
            .find(|u| u.email == email)
            .filter(|u| u.verify_password(password));
        match user {
            Some(user) => {
                info!("User {} authenticated", user.id);
                Some(user.profile())
            }
            None => {
                debug!("Failed login attempt for `{email}`");
                None
            }
        }
    }

    /// Add a new user, assigning the next sequential ID.
    pub async fn register(&self, registration: Registration) -> Result<SessionUser, RegistrationError> {
        if registration.password != registration.confirm_password {
            return Err(RegistrationError::PasswordMismatch);
        }
        // Hash outside the lock; it is the slow part.
        let password_hash = hash_password(&registration.password)?;

        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == registration.email) {
            return Err(RegistrationError::EmailTaken);
        }
        let id = UserId(users.len() as u32 + 1);
        let user = UserRecord {
            id,
            email: registration.email,
            password_hash,
            first_name: registration.first_name,
            last_name: registration.last_name,
            voter_id: registration.voter_id,
            is_admin: false,
        };
        let profile = user.profile();
        users.push(user);
        info!("Registered user {id}");
        Ok(profile)
    }

    /// Look up a user's public profile.
    pub async fn find(&self, id: UserId) -> Option<SessionUser> {
        self.users
            .read()
            .await
            .iter()
            .find(|u| u.id == id)
            .map(UserRecord::profile)
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

/// Announce the demo credentials, once per store.
/// Returns whether anything was announced.
pub fn announce_demo_credentials(storage: &Storage) -> bool {
    if storage.load::<bool>(DEMO_DATA_LOADED).unwrap_or(false) {
        return false;
    }
    storage.save(DEMO_DATA_LOADED, &true);
    info!("Demo credentials:");
    for (email, password, is_admin) in UserDirectory::demo_credentials() {
        let role = if is_admin { "Admin" } else { "Voter" };
        info!("{role}: {email} / {password}");
    }
    true
}

/// A fairing that seeds a `UserDirectory` with the demo users and places it
/// into managed state. Must be attached after `StoreFairing`.
pub struct DirectoryFairing;

#[rocket::async_trait]
impl Fairing for DirectoryFairing {
    fn info(&self) -> Info {
        Info {
            name: "User directory",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let directory = match UserDirectory::with_demo_users() {
            Ok(directory) => directory,
            Err(e) => {
                error!("Failed to seed demo users: {e}");
                return Err(rocket);
            }
        };
        match rocket.state::<Storage>() {
            Some(storage) => {
                announce_demo_credentials(storage);
            }
            None => {
                error!("Storage was not available when seeding the directory");
                return Err(rocket);
            }
        }

        // Manage the state.
        rocket = rocket.manage(directory);
        Ok(rocket)
    }
}
