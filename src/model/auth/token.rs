use std::fmt::Display;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{
    errors::Error as JwtError, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use rocket::http::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::{
    config::Config,
    model::user::{SessionUser, UserId},
};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Admin = 1,
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Admin => "admin",
            }
        )
    }
}

/// An authentication token representing a specific user with specific rights.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    id: UserId,
    #[serde(rename = "rgt")]
    rights: Rights,
}

impl AuthToken {
    /// Create a new [`AuthToken`] for the given user, with rights matching
    /// their admin flag.
    pub fn new(user: &SessionUser) -> Self {
        Self {
            id: user.id,
            rights: if user.is_admin {
                Rights::Admin
            } else {
                Rights::Voter
            },
        }
    }

    /// Get the user ID.
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Get the user's rights.
    pub fn rights(&self) -> Rights {
        self.rights
    }

    /// Does this token permit the given rights? Admins may do anything a voter can.
    pub fn permits(&self, target: Rights) -> bool {
        self.rights >= target
    }

    /// Serialize this token into a signed cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>, JwtError> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;

        Ok(Cookie::build((AUTH_TOKEN_COOKIE, token))
            .max_age(rocket::time::Duration::seconds(
                config.auth_ttl().num_seconds(),
            ))
            .same_site(SameSite::Strict)
            .http_only(true)
            .build())
    }

    /// Deserialize a token from a cookie, checking its signature and expiry.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self, JwtError> {
        jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    token: AuthToken,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}
