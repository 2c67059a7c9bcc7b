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

use thiserror::Error;

/// Authentication and token related error types.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Server configuration has not been loaded yet.
    #[error("Server not initialized")]
    ServerNotInitialized,

    /// Access key violates the access-key charset or length.
    #[error("Invalid access key")]
    InvalidAccessKey,

    /// Secret key violates the secret-key charset or length.
    #[error("Invalid secret key")]
    InvalidSecretKey,

    /// Access key does not match the configured one.
    #[error("The access key ID you provided does not exist in our records.")]
    InvalidAccessKeyId,

    /// Secret key mismatch.
    #[error("Authentication failed, check your access credentials.")]
    Authentication,

    /// Missing, malformed or expired bearer token.
    #[error("Invalid token")]
    InvalidToken,

    /// Password hashing failure.
    #[error("bcrypt error: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
}

/// Auth operation Result type.
pub type Result<T> = std::result::Result<T, AuthError>;
