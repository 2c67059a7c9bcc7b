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

pub mod globals;

pub use globals::{clear_all_connections, evict_connection, has_cached_connection, GLOBAL_CONN_MAP};

/// Reserved on-disk bucket holding server-internal state.
pub const RESERVED_BUCKET: &str = ".ferrostore.sys";

/// Path prefix inside the reserved bucket for control-plane state.
pub const CONTROL_PATH: &str = "control/";
