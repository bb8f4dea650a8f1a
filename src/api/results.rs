use chrono::Utc;
use rocket::{serde::json::Json, Route, State};
use serde::Serialize;

use crate::model::{
    auth::Session,
    ballot::BallotSubmission,
    results::{ResultsBoard, ResultsView},
    store::Storage,
};

pub fn routes() -> Vec<Route> {
    routes![results]
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsPage {
    #[serde(flatten)]
    pub results: ResultsView,
    /// The caller's own recorded ballot, if they are signed in and have voted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub your_ballot: Option<BallotSubmission>,
}

#[get("/results")]
pub async fn results(
    session: Option<Session>,
    board: &State<ResultsBoard>,
    storage: &State<Storage>,
) -> Json<ResultsPage> {
    let your_ballot = session.and_then(|s| BallotSubmission::load(storage, s.user.id));
    Json(ResultsPage {
        results: board.view(Utc::now()).await,
        your_ballot,
    })
}
