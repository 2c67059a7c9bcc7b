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

use std::time::Duration;

/// Environment variable carrying the access key.
pub const ENV_ACCESS_KEY: &str = "FERROSTORE_ACCESS_KEY";

/// Environment variable carrying the secret key.
pub const ENV_SECRET_KEY: &str = "FERROSTORE_SECRET_KEY";

/// Exact length of a valid access key.
pub const ACCESS_KEY_LEN: usize = 20;

/// Exact length of a valid secret key.
pub const SECRET_KEY_LEN: usize = 40;

/// Default token expiry for user-facing handlers is one day.
pub const DEFAULT_TOKEN_EXPIRY: Duration = Duration::from_secs(24 * 60 * 60);

/// Inter-node token expiry is 100 years.
pub const INTER_NODE_TOKEN_EXPIRY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);
