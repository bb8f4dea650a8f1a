use rocket::{response::Redirect, serde::json::Json, Route};
use serde::Serialize;

use crate::model::{auth::Session, results::SiteStats, user::SessionUser};

pub fn routes() -> Vec<Route> {
    routes![entry, ballot_fallback, admin_fallback]
}

#[derive(Debug, Serialize)]
pub struct EntryView {
    pub stats: SiteStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
}

#[get("/")]
pub fn entry(session: Option<Session>) -> Json<EntryView> {
    Json(EntryView {
        stats: SiteStats::current(),
        user: session.map(|s| s.user),
    })
}

/// Anyone without a session is sent back to the entry page.
#[get("/ballot", rank = 2)]
pub fn ballot_fallback() -> Redirect {
    Redirect::to(uri!(entry))
}

/// Anyone who is not a signed-in admin is sent back to the entry page.
#[get("/admin", rank = 2)]
pub fn admin_fallback() -> Redirect {
    Redirect::to(uri!(entry))
}
