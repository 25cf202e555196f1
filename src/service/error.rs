use thiserror::Error;

use crate::{
    error::{ErrorMessage, HttpError},
    models::complaintmodel::ComplaintStatus,
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cannot move a complaint from {from} to {to}")]
    InvalidTransition { from: ComplaintStatus, to: ComplaintStatus },

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("The complaint was changed by someone else, please refresh and try again")]
    Conflict,

    #[error("A complaint has already been submitted from this network today. Please try again tomorrow.")]
    RateLimited,

    #[error("Reference number already in use")]
    DuplicateReference,

    #[error("{0}")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Dependency error: {0}")]
    Dependency(String),
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Validation(_)
            | ServiceError::InvalidTransition { .. } => HttpError::bad_request(error.to_string()),

            ServiceError::Unauthorized(_) => HttpError::forbidden(error.to_string()),

            ServiceError::NotFound(_) => HttpError::not_found(error.to_string()),

            ServiceError::Conflict
            | ServiceError::DuplicateReference
            | ServiceError::AlreadyExists(_) => HttpError::conflict(error.to_string()),

            ServiceError::RateLimited => HttpError::too_many_requests(error.to_string()),

            ServiceError::Database(ref e) => {
                tracing::error!("Database failure: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }

            ServiceError::Dependency(_) => HttpError::server_error(error.to_string()),
        }
    }
}
