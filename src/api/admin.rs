use rocket::{serde::json::Json, Route};
use serde::Serialize;

use crate::model::{auth::AdminSession, results::Dashboard, user::SessionUser};

pub fn routes() -> Vec<Route> {
    routes![dashboard]
}

#[derive(Debug, Serialize)]
pub struct DashboardPage {
    pub admin: SessionUser,
    #[serde(flatten)]
    pub dashboard: Dashboard,
}

#[get("/admin")]
pub fn dashboard(admin: AdminSession) -> Json<DashboardPage> {
    Json(DashboardPage {
        admin: admin.0.user,
        dashboard: Dashboard::current(),
    })
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, local::asynchronous::Client};

    use super::*;

    #[backend_test(admin)]
    async fn admin_sees_dashboard(client: Client) {
        let response = client.get(uri!(dashboard)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let body: serde_json::Value = response.into_json().await.unwrap();
        assert_eq!("ADMIN001", body["admin"]["voterID"]);
        assert_eq!(892_456, body["stats"]["ballotsCast"]);
        assert_eq!(3, body["stats"]["activeElections"]);
        assert_eq!(7, body["activity"].as_array().unwrap().len());
    }

    #[backend_test(voter)]
    async fn voters_are_redirected(client: Client) {
        let response = client.get(uri!(dashboard)).dispatch().await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(Some("/"), response.headers().get_one("Location"));
    }

    #[backend_test]
    async fn strangers_are_redirected(client: Client) {
        let response = client.get(uri!(dashboard)).dispatch().await;
        assert_eq!(Status::SeeOther, response.status());
    }
}
