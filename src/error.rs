use jsonwebtoken::errors::Error as JwtError;
use log::{error, warn};
use rocket::{
    http::{Status, StatusClass},
    response::Responder,
    serde::json::Json,
    Request,
};
use thiserror::Error;

use crate::model::{
    ballot::WorkflowError, notice::Notice, store::StoreError, user::RegistrationError,
};

pub type Result<T> = std::result::Result<T, Error>;

/// Shown in place of the real message for any server-side fault.
pub const UNEXPECTED: &str = "An unexpected error occurred";

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn status(&self) -> Status {
        match self {
            Self::Status(status, _) => *status,
            Self::Jwt(_) | Self::Store(_) => Status::InternalServerError,
            Self::Workflow(e) => match e {
                WorkflowError::WrongState { .. } => Status::Conflict,
                WorkflowError::Incomplete(_) => Status::UnprocessableEntity,
                WorkflowError::NotPersisted(_) => Status::InternalServerError,
            },
            Self::Registration(e) => match e {
                RegistrationError::PasswordMismatch => Status::BadRequest,
                RegistrationError::EmailTaken => Status::Conflict,
                RegistrationError::Hash(_) => Status::InternalServerError,
            },
        }
    }
}

/// Answer with the status and a JSON error notice. Server-side faults are
/// logged and replaced with a generic message.
impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        let message = if status.class() == StatusClass::ServerError {
            error!("{self}");
            UNEXPECTED.to_string()
        } else {
            warn!("{} {}: {self}", req.method(), req.uri());
            self.to_string()
        };
        (status, Json(Notice::error(message))).respond_to(req)
    }
}
