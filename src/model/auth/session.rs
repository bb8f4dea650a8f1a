use log::{debug, error};
use rocket::{
    http::Status,
    outcome::try_outcome,
    request::{FromRequest, Outcome},
    Request,
};

use crate::{
    config::Config,
    model::{
        store::{user_key, Storage, CURRENT_USER},
        user::{SessionUser, UserDirectory},
    },
};

use super::token::{AuthToken, Rights, AUTH_TOKEN_COOKIE};

/// A signed-in user, restored from their session cookie.
///
/// The cookie must carry a valid signature, the user's profile must have been
/// persisted at login, and that profile must still match the directory.
/// Requests failing any of these are forwarded with `401 Unauthorized`.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: SessionUser,
    pub token: AuthToken,
}

impl Session {
    /// Restore the session described by `token`, if it is still current.
    pub async fn restore(
        token: AuthToken,
        storage: &Storage,
        directory: &UserDirectory,
    ) -> Option<Self> {
        let persisted: SessionUser = storage.load(&user_key(token.id(), CURRENT_USER))?;
        let user = directory.find(token.id()).await?;
        if persisted != user {
            debug!("Persisted profile for user {} is stale", user.id);
            return None;
        }
        Some(Self { user, token })
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Session {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let rocket = req.rocket();
        let (Some(config), Some(storage), Some(directory)) = (
            rocket.state::<Config>(),
            rocket.state::<Storage>(),
            rocket.state::<UserDirectory>(),
        ) else {
            error!("Session state is not managed");
            return Outcome::Error((Status::InternalServerError, ()));
        };

        let Some(cookie) = req.cookies().get(AUTH_TOKEN_COOKIE) else {
            return Outcome::Forward(Status::Unauthorized);
        };
        let token = match AuthToken::from_cookie(cookie, config) {
            Ok(token) => token,
            Err(e) => {
                debug!("Rejected session cookie: {e}");
                return Outcome::Forward(Status::Unauthorized);
            }
        };

        match Session::restore(token, storage, directory).await {
            Some(session) => Outcome::Success(session),
            None => Outcome::Forward(Status::Unauthorized),
        }
    }
}

/// A signed-in admin. Voters are forwarded with `403 Forbidden`.
#[derive(Debug, Clone)]
pub struct AdminSession(pub Session);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminSession {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let session = try_outcome!(req.guard::<Session>().await);
        if session.token.permits(Rights::Admin) && session.user.is_admin {
            Outcome::Success(AdminSession(session))
        } else {
            debug!("User {} is not an admin", session.user.id);
            Outcome::Forward(Status::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::user::{Credentials, UserId};

    #[tokio::test]
    async fn restore_needs_a_persisted_profile() {
        let storage = Storage::in_memory();
        let directory = UserDirectory::with_demo_users().unwrap();
        let voter = Credentials::voter();
        let user = directory
            .authenticate(&voter.email, &voter.password)
            .await
            .unwrap();
        let token = AuthToken::new(&user);

        assert!(Session::restore(token, &storage, &directory).await.is_none());

        storage.save(&user_key(user.id, CURRENT_USER), &user);
        let session = Session::restore(token, &storage, &directory).await.unwrap();
        assert_eq!(user, session.user);
    }

    #[tokio::test]
    async fn persisted_profile_alone_is_not_enough() {
        let storage = Storage::in_memory();
        let directory = UserDirectory::new();
        let forged = SessionUser {
            id: UserId(1),
            email: "someone@example.com".into(),
            first_name: "Some".into(),
            last_name: "One".into(),
            voter_id: "VID1".into(),
            is_admin: true,
        };
        storage.save(&user_key(forged.id, CURRENT_USER), &forged);

        let token = AuthToken::new(&forged);
        assert!(Session::restore(token, &storage, &directory).await.is_none());
    }
}
