// Copyright 2024 FerroStore Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use ferrostore_credentials::AuthError;
use thiserror::Error;
use tonic::Status;

/// Server API error types.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed input: empty list, empty key, bad path.
    #[error("Invalid arguments specified")]
    InvalidArgument,

    /// Duplicate entry in a list that requires unique entries.
    #[error("Duplicate key: \"{key}\" found of count: \"{count}\"")]
    DuplicateKey { key: String, count: usize },

    /// Object layer or configuration not ready at call time.
    #[error("Server not initialized, please try again")]
    ServerNotInitialized,

    /// Missing, malformed or expired bearer token.
    #[error("Invalid token")]
    InvalidToken,

    /// Bucket does not exist.
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    /// Object does not exist.
    #[error("Object not found: {0}/{1}")]
    ObjectNotFound(String, String),

    /// Bucket already exists.
    #[error("Bucket exists: {0}")]
    BucketExists(String),

    /// Credential or token service failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Underlying RPC/network failure, retriable by the caller.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Payload could not be serialized or parsed.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Server API Result type.
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Maps the error onto the gRPC status surfaced to peers.
    pub fn to_status(&self) -> Status {
        match self {
            ApiError::Auth(AuthError::ServerNotInitialized) => Status::unavailable(self.to_string()),
            ApiError::InvalidToken | ApiError::Auth(_) => Status::unauthenticated(self.to_string()),
            ApiError::ServerNotInitialized => Status::unavailable(self.to_string()),
            ApiError::InvalidArgument | ApiError::DuplicateKey { .. } | ApiError::Serde(_) => {
                Status::invalid_argument(self.to_string())
            }
            ApiError::BucketNotFound(_) | ApiError::ObjectNotFound(_, _) => Status::not_found(self.to_string()),
            _ => Status::internal(self.to_string()),
        }
    }

    /// Check if the error is retriable at the transport level.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }
}

impl From<Status> for ApiError {
    fn from(status: Status) -> Self {
        match status.code() {
            tonic::Code::Unauthenticated => ApiError::InvalidToken,
            tonic::Code::Unavailable => ApiError::ServerNotInitialized,
            tonic::Code::InvalidArgument => ApiError::InvalidArgument,
            _ => ApiError::Transport(status.message().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_for_auth() {
        let err = ApiError::InvalidToken;
        let status = err.to_status();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);
        assert!(matches!(ApiError::from(status), ApiError::InvalidToken));
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(ApiError::Transport("connection refused".into()).is_retryable());
        assert!(!ApiError::InvalidArgument.is_retryable());
    }

    #[test]
    fn test_duplicate_key_message() {
        let err = ApiError::DuplicateKey {
            key: "/tmp/1".into(),
            count: 2,
        };
        assert_eq!(err.to_string(), "Duplicate key: \"/tmp/1\" found of count: \"2\"");
    }
}
