use log::error;
use rocket::{
    http::{Status, StatusClass},
    serde::json::Json,
    Catcher, Request, Route,
};

use crate::{error::UNEXPECTED, model::notice::Notice};

pub mod admin;
pub mod auth;
pub mod ballot;
pub mod pages;
pub mod results;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(pages::routes());
    routes.extend(auth::routes());
    routes.extend(ballot::routes());
    routes.extend(results::routes());
    routes.extend(admin::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![unauthorized, forbidden, not_found, unexpected]
}

#[catch(401)]
fn unauthorized() -> Json<Notice> {
    Json(Notice::error("Please sign in to continue"))
}

#[catch(403)]
fn forbidden() -> Json<Notice> {
    Json(Notice::error("Admin access required"))
}

#[catch(404)]
fn not_found(req: &Request) -> Json<Notice> {
    Json(Notice::error(format!("Nothing found at {}", req.uri())))
}

/// Everything else. Server faults never reveal their cause.
#[catch(default)]
fn unexpected(status: Status, req: &Request) -> (Status, Json<Notice>) {
    let message = if status.class() == StatusClass::ServerError {
        error!("Unhandled {status} for {} {}", req.method(), req.uri());
        UNEXPECTED.to_string()
    } else {
        status.reason_lossy().to_string()
    };
    (status, Json(Notice::error(message)))
}
