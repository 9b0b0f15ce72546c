use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use thiserror::Error;
use wallet_engine::traits::{CredentialError, IdentityError, WalletError};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Invalid request. {0}")]
    ValidationFailure(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    InsufficientBalance(String),
    #[error("{0}")]
    Conflict(String),
    #[error("The payment gateway could not complete the request. {0}")]
    ExternalServiceFailure(String),
}

impl ServerError {
    /// A stable, machine-readable error code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationFailure(_) | Self::InvalidRequestBody(_) => "validation_failure",
            Self::NoRecordFound(_) => "not_found",
            Self::AuthenticationError(AuthError::InsufficientPermissions(_)) => "forbidden",
            Self::AuthenticationError(_) => "unauthorized",
            Self::InsufficientBalance(_) => "insufficient_balance",
            Self::Conflict(_) => "conflict",
            Self::ExternalServiceFailure(_) => "external_service_failure",
            Self::InitializeError(_)
            | Self::BackendError(_)
            | Self::IOError(_)
            | Self::ConfigurationError(_)
            | Self::Unspecified(_) => "internal_error",
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationFailure(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingCredentials => StatusCode::UNAUTHORIZED,
                AuthError::InvalidApiKey => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::UNAUTHORIZED,
                AuthError::InvalidSignature => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            },
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientBalance(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ExternalServiceFailure(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string(), "code": self.code() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No credentials were provided.")]
    MissingCredentials,
    #[error("The API key is invalid, revoked or expired.")]
    InvalidApiKey,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Session token is invalid. {0}")]
    ValidationError(String),
    #[error("Session token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Invalid webhook signature.")]
    InvalidSignature,
}

impl From<WalletError> for ServerError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::ValidationFailure(_) => Self::ValidationFailure(e.to_string()),
            WalletError::IdentityNotFound(_) | WalletError::WalletNotFound(_) | WalletError::TransactionNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            WalletError::InsufficientBalance { .. } => Self::InsufficientBalance(e.to_string()),
            WalletError::DuplicateReference(_) | WalletError::TransactionAlreadySettled { .. } => {
                Self::Conflict(e.to_string())
            },
            WalletError::ExternalServiceFailure(_) => Self::ExternalServiceFailure(e.to_string()),
            WalletError::DatabaseError(_) | WalletError::InternalInconsistency(_) => {
                error!("💻️ Wallet backend failure. {e}");
                Self::BackendError(e.to_string())
            },
        }
    }
}

impl From<CredentialError> for ServerError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::TooManyActiveKeys(_)
            | CredentialError::KeyNotExpired(_)
            | CredentialError::KeyInactive(_)
            | CredentialError::InvalidExpiryCode(_)
            | CredentialError::ValidationFailure(_) => Self::ValidationFailure(e.to_string()),
            // Keys that belong to someone else look exactly like keys that do not exist
            CredentialError::KeyNotFound(id) | CredentialError::KeyNotOwned(id) => {
                Self::NoRecordFound(format!("API key {id} does not exist"))
            },
            CredentialError::DuplicateSecret => Self::Conflict(e.to_string()),
            CredentialError::DatabaseError(_) => {
                error!("💻️ Credential backend failure. {e}");
                Self::BackendError(e.to_string())
            },
        }
    }
}

impl From<IdentityError> for ServerError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::ValidationFailure(_) => Self::ValidationFailure(e.to_string()),
            IdentityError::IdentityNotFound(_) => Self::NoRecordFound(e.to_string()),
            IdentityError::IdentityAlreadyExists(_) => Self::Conflict(e.to_string()),
            IdentityError::DatabaseError(_)
            | IdentityError::WalletNumberTaken(_)
            | IdentityError::WalletNumbersExhausted(_) => Self::BackendError(e.to_string()),
        }
    }
}
