use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use fulfillment_engine::FulfillmentError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("{0}")]
    Fulfillment(#[from] FulfillmentError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingIdentity(_) => StatusCode::UNAUTHORIZED,
                AuthError::InvalidSignature => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedIdentity(_) => StatusCode::BAD_REQUEST,
            },
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::Fulfillment(e) => match e {
                FulfillmentError::ValidationError(_) => StatusCode::BAD_REQUEST,
                FulfillmentError::NotFound(_) => StatusCode::NOT_FOUND,
                FulfillmentError::InsufficientStock { .. } => StatusCode::CONFLICT,
                FulfillmentError::InvalidTransition(_) => StatusCode::CONFLICT,
                FulfillmentError::PaymentNotConfirmed(_) => StatusCode::CONFLICT,
                FulfillmentError::InsufficientBalance(_) => StatusCode::UNPROCESSABLE_ENTITY,
                FulfillmentError::DriverCapacityExceeded(_) => StatusCode::CONFLICT,
                FulfillmentError::AlreadyProcessed(_) => StatusCode::CONFLICT,
                FulfillmentError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Database details stay in the logs
        let message = match self {
            Self::Fulfillment(FulfillmentError::DatabaseError(_)) => "An internal error occurred.".to_string(),
            _ => self.to_string(),
        };
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": message }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No identity was provided. Missing {0}.")]
    MissingIdentity(String),
    #[error("The identity signature is invalid.")]
    InvalidSignature,
    #[error("The identity is not in the correct format. {0}")]
    PoorlyFormattedIdentity(String),
}
