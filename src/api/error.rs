//! Maps the domain `Error` taxonomy (§7) onto HTTP status codes (§6): a
//! thin collaborator, not a restatement of the core's error policy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::error::{ConfigError, DbError, DeliveryError, Error, FeedbackError, IntakeError, ProfileError, SchedulerError};

/// Wraps `crate::error::Error` so it can implement `IntoResponse` here in
/// the API layer without reaching into the core crate's error module.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

fn profile_status(err: &ProfileError) -> StatusCode {
    match err {
        ProfileError::UnknownUser(_)
        | ProfileError::UnknownRole(_)
        | ProfileError::UnknownPhase(_)
        | ProfileError::UnknownProject(_)
        | ProfileError::UnknownEmbedding(_) => StatusCode::NOT_FOUND,
        ProfileError::AccessDenied => StatusCode::FORBIDDEN,
        ProfileError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn intake_status(err: &IntakeError) -> StatusCode {
    match err {
        IntakeError::InvalidSignature => StatusCode::UNAUTHORIZED,
        IntakeError::MissingSigningSecret => StatusCode::INTERNAL_SERVER_ERROR,
        IntakeError::MissingBody | IntakeError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        IntakeError::DuplicateEvent(_) => StatusCode::OK,
        IntakeError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn feedback_status(err: &FeedbackError) -> StatusCode {
    match err {
        FeedbackError::InvalidAction(_) => StatusCode::BAD_REQUEST,
        FeedbackError::Profile(p) => profile_status(p),
        FeedbackError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn delivery_status(err: &DeliveryError) -> StatusCode {
    match err {
        DeliveryError::ExternalChatFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        DeliveryError::DeliveryDuplicate(_) => StatusCode::OK,
        DeliveryError::WorkspaceNotFound(_) => StatusCode::NOT_FOUND,
        DeliveryError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn scheduler_status(err: &SchedulerError) -> StatusCode {
    match err {
        SchedulerError::UnknownTimezone(_) => StatusCode::OK,
        SchedulerError::UnknownSchedule(_) => StatusCode::NOT_FOUND,
        SchedulerError::Delivery(d) => delivery_status(d),
        SchedulerError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn config_status(err: &ConfigError) -> StatusCode {
    match err {
        ConfigError::Invalid(_) | ConfigError::MissingKey(_) | ConfigError::Other(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn db_status(_: &DbError) -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Config(e) => config_status(e),
            Error::Db(e) => db_status(e),
            Error::Intake(e) => intake_status(e),
            Error::Profile(e) => profile_status(e),
            Error::Feedback(e) => feedback_status(e),
            Error::Delivery(e) => delivery_status(e),
            Error::Scheduler(e) => scheduler_status(e),
            Error::Sqlx(_) | Error::Io(_) | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
