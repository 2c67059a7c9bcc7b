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

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Lock type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockType {
    /// Shared lock (read lock).
    #[serde(rename = "RLock")]
    Read,
    /// Exclusive lock (write lock).
    #[serde(rename = "WLock")]
    Write,
}

impl std::fmt::Display for LockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockType::Read => write!(f, "RLock"),
            LockType::Write => write!(f, "WLock"),
        }
    }
}

/// Status of one operation's hold on a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockStatus {
    /// The operation holds the lock.
    Running,
    /// The lock was granted but the operation has not started yet.
    Ready,
    /// The operation is parked waiting for the lock.
    Blocked,
}

impl std::fmt::Display for LockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockStatus::Running => write!(f, "Running"),
            LockStatus::Ready => write!(f, "Ready"),
            LockStatus::Blocked => write!(f, "Blocked"),
        }
    }
}

/// State of a single operation's hold on a `(bucket, object)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsLockState {
    /// Caller-chosen operation ID.
    #[serde(rename = "opsID")]
    pub operation_id: String,
    /// Call site (`file:line`) that acquired the lock. Informational
    /// only; the format is not meant to be parsed.
    #[serde(rename = "lockOrigin")]
    pub lock_origin: String,
    #[serde(rename = "lockType")]
    pub lock_type: LockType,
    pub status: LockStatus,
    /// Time the operation entered its current status.
    #[serde(rename = "statusSince", with = "time::serde::rfc3339")]
    pub since: OffsetDateTime,
    /// Duration since `statusSince`, in nanoseconds.
    #[serde(rename = "statusDuration")]
    pub duration: i64,
}

/// Lock state for one `(bucket, object)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeLockInfo {
    pub bucket: String,
    pub object: String,
    /// All locks blocked + running on this pair.
    #[serde(rename = "locksOnObject")]
    pub locks_on_object: i64,
    /// Count of operations which have acquired the lock but not yet
    /// released it.
    #[serde(rename = "locksAcquiredOnObject")]
    pub locks_acquired_on_object: i64,
    /// Count of operations blocked waiting for the lock.
    #[serde(rename = "locksBlockedOnObject")]
    pub total_blocked_locks: i64,
    #[serde(rename = "lockDetailsOnObject")]
    pub lock_details_on_object: Vec<OpsLockState>,
}

/// Point-in-time lock state of the entire node: total locks held, total
/// calls blocked on locks, and the per-object detail rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemLockState {
    #[serde(rename = "totalLocks")]
    pub total_locks: i64,
    /// Count of operations blocked waiting for a lock to be released.
    #[serde(rename = "totalBlockedLocks")]
    pub total_blocked_locks: i64,
    /// Count of operations which have acquired a lock and are in
    /// progress.
    #[serde(rename = "totalAcquiredLocks")]
    pub total_acquired_locks: i64,
    #[serde(rename = "locksInfoPerObject")]
    pub locks_info_per_object: Vec<VolumeLockInfo>,
}
