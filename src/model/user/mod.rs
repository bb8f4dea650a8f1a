use std::fmt::{Display, Formatter};

use argon2::Config;
use log::error;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub use directory::{announce_demo_credentials, DirectoryFairing, RegistrationError, UserDirectory};
pub use strength::PasswordStrength;

mod directory;
mod strength;

/// Sequentially assigned user identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered user, as held by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub voter_id: String,
    pub is_admin: bool,
}

impl UserRecord {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or_else(|e| {
            error!("Malformed password hash for user {}: {e}", self.id);
            false
        })
    }

    /// The public profile of this user.
    pub fn profile(&self) -> SessionUser {
        SessionUser {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            voter_id: self.voter_id.clone(),
            is_admin: self.is_admin,
        }
    }
}

/// A user's profile without any secret. This is what gets persisted as the
/// current user and handed back to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "voterID")]
    pub voter_id: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Raw login credentials, received from a user. Never stored.
#[derive(Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// A registration form, received from a user. The password is hashed before
/// anything is stored.
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "voterID")]
    pub voter_id: String,
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, argon2::Error> {
    // 16 bytes is recommended for password hashing:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    argon2::hash_encoded(password.as_bytes(), &salt, &Config::default())
}

/// Example data for tests.
#[cfg(test)]
pub mod examples {
    use super::*;

    impl Credentials {
        pub fn voter() -> Self {
            Self {
                email: "john.doe@example.com".into(),
                password: "password123".into(),
            }
        }

        pub fn admin() -> Self {
            Self {
                email: "admin@securevote.com".into(),
                password: "admin123".into(),
            }
        }
    }

    impl Registration {
        pub fn example() -> Self {
            Self {
                email: "a@x.com".into(),
                password: "pw".into(),
                confirm_password: "pw".into(),
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                voter_id: "VID000000042".into(),
            }
        }
    }
}
