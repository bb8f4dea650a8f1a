use rocket::{http::Status, serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{
        auth::Session,
        ballot::{BallotSessions, BallotView, OptionId, Position, Review, UnknownPosition},
    },
};

pub fn routes() -> Vec<Route> {
    routes![ballot, select, clear, review, edit, confirm]
}

/// The body of a selection request.
#[derive(Debug, Deserialize, Serialize)]
pub struct Choice {
    pub option: String,
}

#[derive(Debug, Serialize)]
pub struct Reviewed {
    pub review: Review,
    pub ballot: BallotView,
}

fn known(position: std::result::Result<Position, UnknownPosition>) -> Result<Position> {
    position.map_err(|e| Error::Status(Status::NotFound, e.to_string()))
}

#[get("/ballot")]
pub async fn ballot(session: Session, sessions: &State<BallotSessions>) -> Json<BallotView> {
    Json(sessions.view(session.user.id).await)
}

#[put("/ballot/selections/<position>", data = "<choice>", format = "json")]
pub async fn select(
    position: std::result::Result<Position, UnknownPosition>,
    choice: Json<Choice>,
    session: Session,
    sessions: &State<BallotSessions>,
) -> Result<Json<BallotView>> {
    let position = known(position)?;
    let option = OptionId::new(choice.into_inner().option).ok_or_else(|| {
        Error::Status(
            Status::UnprocessableEntity,
            format!("No option chosen for {position}"),
        )
    })?;
    let view = sessions
        .with_workflow(session.user.id, |ballot| -> Result<BallotView> {
            ballot.select(position, option)?;
            Ok(BallotView::render(ballot))
        })
        .await?;
    Ok(Json(view))
}

#[delete("/ballot/selections/<position>")]
pub async fn clear(
    position: std::result::Result<Position, UnknownPosition>,
    session: Session,
    sessions: &State<BallotSessions>,
) -> Result<Json<BallotView>> {
    let position = known(position)?;
    let view = sessions
        .with_workflow(session.user.id, |ballot| -> Result<BallotView> {
            ballot.clear(position)?;
            Ok(BallotView::render(ballot))
        })
        .await?;
    Ok(Json(view))
}

#[post("/ballot/review")]
pub async fn review(session: Session, sessions: &State<BallotSessions>) -> Result<Json<Reviewed>> {
    let reviewed = sessions
        .with_workflow(session.user.id, |ballot| -> Result<Reviewed> {
            let review = ballot.review()?;
            Ok(Reviewed {
                review,
                ballot: BallotView::render(ballot),
            })
        })
        .await?;
    Ok(Json(reviewed))
}

#[post("/ballot/edit")]
pub async fn edit(session: Session, sessions: &State<BallotSessions>) -> Result<Json<BallotView>> {
    let view = sessions
        .with_workflow(session.user.id, |ballot| -> Result<BallotView> {
            ballot.edit()?;
            Ok(BallotView::render(ballot))
        })
        .await?;
    Ok(Json(view))
}

#[post("/ballot/confirm")]
pub async fn confirm(
    session: Session,
    sessions: &State<BallotSessions>,
) -> Result<Json<BallotView>> {
    Ok(Json(sessions.confirm(session.user.id).await?))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::ContentType, local::asynchronous::Client, serde::json::serde_json::json,
        tokio::time::{sleep, Duration},
    };

    use super::*;
    use crate::model::{
        ballot::BallotSubmission,
        notice::Notice,
        store::Storage,
        user::UserId,
    };

    async fn choose(client: &Client, position: &str, option: &str) -> (Status, serde_json::Value) {
        let response = client
            .put(format!("/ballot/selections/{position}"))
            .header(ContentType::JSON)
            .body(json!(Choice { option: option.into() }).to_string())
            .dispatch()
            .await;
        (response.status(), response.into_json().await.unwrap())
    }

    #[backend_test]
    async fn ballot_redirects_without_a_session(client: Client) {
        let response = client.get(uri!(ballot)).dispatch().await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(Some("/"), response.headers().get_one("Location"));
    }

    #[backend_test]
    async fn changes_need_a_session(client: Client) {
        let (status, notice) = choose(&client, "president", "johnson").await;
        assert_eq!(Status::Unauthorized, status);
        assert_eq!("Please sign in to continue", notice["message"]);

        let responses = [
            client.delete("/ballot/selections/president").dispatch().await,
            client.post(uri!(review)).dispatch().await,
            client.post(uri!(edit)).dispatch().await,
            client.post(uri!(confirm)).dispatch().await,
        ];
        for response in responses {
            assert_eq!(Status::Unauthorized, response.status());
            let notice: Notice = response.into_json().await.unwrap();
            assert_eq!(Notice::error("Please sign in to continue"), notice);
        }
    }

    #[backend_test(voter)]
    async fn fresh_ballot(client: Client) {
        let response = client.get(uri!(ballot)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let view: serde_json::Value = response.into_json().await.unwrap();
        assert_eq!("selecting", view["state"]);
        assert_eq!("30:00", view["timer"]["display"]);
        assert_eq!("normal", view["timer"]["urgency"]);
        assert_eq!("0 of 3 positions voted", view["progress"]["text"]);
        assert_eq!(false, view["canSubmit"]);
    }

    #[backend_test(voter)]
    async fn selection_replaces_and_tracks_progress(client: Client) {
        let (status, view) = choose(&client, "president", "johnson").await;
        assert_eq!(Status::Ok, status);
        assert_eq!("johnson", view["selections"]["president"]);
        assert_eq!(
            json!([{ "level": "success", "message": "Vote recorded for president" }]),
            view["notices"]
        );

        let (_, view) = choose(&client, "president", "davis").await;
        assert_eq!("davis", view["selections"]["president"]);
        assert_eq!(1, view["progress"]["selected"]);

        let (_, view) = choose(&client, "senate", "martinez").await;
        assert_eq!(true, view["canSubmit"]);
        assert_eq!("2 of 3 positions voted", view["progress"]["text"]);

        let response = client
            .delete("/ballot/selections/senate")
            .dispatch()
            .await;
        let view: serde_json::Value = response.into_json().await.unwrap();
        assert_eq!(false, view["canSubmit"]);
        assert!(view["selections"].get("senate").is_none());
    }

    #[backend_test(voter)]
    async fn bad_selections_are_rejected(client: Client) {
        let (status, notice) = choose(&client, "governor", "smith").await;
        assert_eq!(Status::NotFound, status);
        assert_eq!("error", notice["level"]);

        let (status, _) = choose(&client, "president", "  ").await;
        assert_eq!(Status::UnprocessableEntity, status);

        let view: serde_json::Value = client
            .get(uri!(ballot))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(0, view["progress"]["selected"]);
    }

    #[backend_test(voter)]
    async fn review_resolves_labels(client: Client) {
        choose(&client, "president", "johnson").await;
        choose(&client, "senate", "martinez").await;
        choose(&client, "proposition", "maybe").await;

        let response = client.post(uri!(review)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let reviewed: serde_json::Value = response.into_json().await.unwrap();
        assert_eq!("reviewing", reviewed["ballot"]["state"]);
        let entries = reviewed["review"]["entries"].as_array().unwrap();
        assert_eq!(3, entries.len());
        assert_eq!("President", entries[0]["title"]);
        assert_eq!(
            json!({ "kind": "known", "label": "Sarah Johnson (Democratic)" }),
            entries[0]["label"]
        );
        assert_eq!(json!({ "kind": "unknown", "label": "maybe" }), entries[2]["label"]);

        // Selecting is closed during review, and reopens on edit.
        let (status, _) = choose(&client, "senate", "thompson").await;
        assert_eq!(Status::Conflict, status);
        let response = client.post(uri!(edit)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let (_, view) = choose(&client, "senate", "thompson").await;
        assert_eq!("thompson", view["selections"]["senate"]);
        assert_eq!("johnson", view["selections"]["president"]);
    }

    #[backend_test(voter)]
    async fn incomplete_ballot_cannot_be_confirmed(client: Client) {
        choose(&client, "president", "johnson").await;
        client.post(uri!(review)).dispatch().await;

        let response = client.post(uri!(confirm)).dispatch().await;
        assert_eq!(Status::UnprocessableEntity, response.status());
        let notice: Notice = response.into_json().await.unwrap();
        assert_eq!("Required positions not selected: senate", notice.message);
    }

    #[backend_test(voter)]
    async fn confirmed_ballot_is_submitted(client: Client, storage: Storage) {
        choose(&client, "president", "johnson").await;
        choose(&client, "senate", "martinez").await;
        client.post(uri!(review)).dispatch().await;

        let response = client.post(uri!(confirm)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let view: serde_json::Value = response.into_json().await.unwrap();
        assert_eq!("submitting", view["state"]);
        assert_eq!("pending", view["phase"]);

        let response = client.post(uri!(confirm)).dispatch().await;
        assert_eq!(Status::Conflict, response.status());

        // The test server uses short submission delays.
        sleep(Duration::from_millis(500)).await;
        let view: serde_json::Value = client
            .get(uri!(ballot))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!("submitted", view["state"]);
        assert_eq!("/results", view["redirect"]);

        let submission = BallotSubmission::load(&storage, UserId(1)).unwrap();
        assert_eq!(2, submission.selections.len());
    }
}
