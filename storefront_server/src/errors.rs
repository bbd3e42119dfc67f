use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use payment_reconciler::{ReconciliationError, WebhookError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Invalid query parameters: {0}")]
    InvalidRequestQuery(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request conflicts with the current state. {0}")]
    Conflict(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestQuery(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingApiKey => StatusCode::UNAUTHORIZED,
                AuthError::InvalidApiKey => StatusCode::FORBIDDEN,
                AuthError::AdminDisabled => StatusCode::FORBIDDEN,
                AuthError::ForbiddenPeer => StatusCode::FORBIDDEN,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No X-Admin-Key header was provided.")]
    MissingApiKey,
    #[error("The X-Admin-Key header is invalid.")]
    InvalidApiKey,
    #[error("Admin access is not configured on this server.")]
    AdminDisabled,
    #[error("Requests from this address are not allowed.")]
    ForbiddenPeer,
}

impl From<ReconciliationError> for ServerError {
    fn from(e: ReconciliationError) -> Self {
        match e {
            ReconciliationError::DatabaseError(_) => Self::BackendError(e.to_string()),
            ReconciliationError::NoMatchingOrder { .. } => Self::NoRecordFound(e.to_string()),
            ReconciliationError::PendingNotFound(_) => Self::NoRecordFound(e.to_string()),
            ReconciliationError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            ReconciliationError::AlreadyProcessed(_) => Self::Conflict(e.to_string()),
            ReconciliationError::OrderPaidByOtherCharge { .. } => Self::Conflict(e.to_string()),
        }
    }
}

impl From<WebhookError> for ServerError {
    fn from(e: WebhookError) -> Self {
        match e {
            WebhookError::MalformedPayload(_) => Self::InvalidRequestBody(e.to_string()),
            WebhookError::NoMatchingOrder(_) => Self::NoRecordFound(e.to_string()),
            WebhookError::OrderLookupFailure(_) => Self::BackendError(e.to_string()),
            WebhookError::UpstreamTimeout(_) | WebhookError::UpstreamFailure(_) => Self::Unspecified(e.to_string()),
        }
    }
}
