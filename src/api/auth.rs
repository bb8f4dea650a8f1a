use log::{error, info};
use rocket::{
    http::{CookieJar, Status},
    serde::json::Json,
    Route, State,
};
use serde::Serialize;

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        auth::{AuthToken, Session, AUTH_TOKEN_COOKIE},
        ballot::BallotSessions,
        notice::Notice,
        store::{user_key, Storage, WriteBatch, CURRENT_USER},
        user::{Credentials, PasswordStrength, Registration, SessionUser, UserDirectory},
    },
};

pub fn routes() -> Vec<Route> {
    routes![login, register, session, logout]
}

#[derive(Debug, Serialize)]
pub struct SignedIn {
    pub user: SessionUser,
    pub notice: Notice,
    pub redirect: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StrengthAdvice {
    pub level: PasswordStrength,
    pub label: &'static str,
    pub percentage: u8,
}

impl From<PasswordStrength> for StrengthAdvice {
    fn from(level: PasswordStrength) -> Self {
        Self {
            level,
            label: level.label(),
            percentage: level.percentage(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Registered {
    pub user: SessionUser,
    pub strength: StrengthAdvice,
    pub notice: Notice,
    pub redirect: &'static str,
}

#[post("/auth/login", data = "<credentials>", format = "json")]
pub async fn login(
    credentials: Json<Credentials>,
    cookies: &CookieJar<'_>,
    directory: &State<UserDirectory>,
    storage: &State<Storage>,
    config: &State<Config>,
) -> Result<Json<SignedIn>> {
    let user = directory
        .authenticate(&credentials.email, &credentials.password)
        .await
        .ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "Invalid email or password".to_string(),
            )
        })?;

    let cookie = AuthToken::new(&user).into_cookie(config)?;
    let profile = WriteBatch::default().save(&user_key(user.id, CURRENT_USER), &user)?;
    storage.commit(profile).await?;
    cookies.add(cookie);

    let redirect = if user.is_admin { "/admin" } else { "/ballot" };
    Ok(Json(SignedIn {
        user,
        notice: Notice::success("Login successful!"),
        redirect,
    }))
}

#[post("/auth/register", data = "<registration>", format = "json")]
pub async fn register(
    registration: Json<Registration>,
    directory: &State<UserDirectory>,
) -> Result<Json<Registered>> {
    let strength = PasswordStrength::of(&registration.password);
    let user = directory.register(registration.into_inner()).await?;
    Ok(Json(Registered {
        user,
        strength: strength.into(),
        notice: Notice::success("Registration successful! Please login."),
        redirect: "/",
    }))
}

#[get("/auth/session")]
pub fn session(session: Session) -> Json<SessionUser> {
    Json(session.user)
}

#[delete("/auth/logout")]
pub async fn logout(
    session: Option<Session>,
    cookies: &CookieJar<'_>,
    storage: &State<Storage>,
    sessions: &State<BallotSessions>,
) -> Status {
    if let Some(session) = session {
        let id = session.user.id;
        let forget = WriteBatch::default().remove(&user_key(id, CURRENT_USER));
        if let Err(e) = storage.commit(forget).await {
            error!("Failed to forget the profile of user {id}: {e}");
        }
        sessions.end(id).await;
        info!("User {id} signed out");
    }
    cookies.remove(AUTH_TOKEN_COOKIE);
    Status::Ok
}
