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

use crate::types::{LockStatus, LockType, OpsLockState, SystemLockState, VolumeLockInfo};
use std::collections::HashMap;
use std::future::Future;
use std::panic::Location;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// `(volume, path)` pair keying the registry. No ordering is imposed
/// across keys; callers acquiring multiple keys bring their own
/// discipline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LockKey {
    volume: String,
    path: String,
}

/// The guard kept alive while an operation holds the lock. Dropping it
/// releases the underlying primitive.
enum LockHold {
    Read(#[allow(dead_code)] OwnedRwLockReadGuard<()>),
    Write(#[allow(dead_code)] OwnedRwLockWriteGuard<()>),
}

/// Per-operation accounting entry.
struct OpsEntry {
    lock_origin: String,
    lock_type: LockType,
    status: LockStatus,
    since: OffsetDateTime,
}

/// Per-key lock record: the shared primitive plus accounting.
struct LockRecord {
    /// The actual read/write primitive operations park on.
    rw: Arc<RwLock<()>>,
    /// Total waiters + holders.
    ref_count: i64,
    /// Current holders.
    running: i64,
    /// Current waiters. `blocked + running == ref_count`.
    blocked: i64,
    /// Accounting entry per outstanding operation ID.
    ops: HashMap<String, OpsEntry>,
    /// Held guards per operation ID, released on unlock.
    holds: HashMap<String, LockHold>,
}

impl LockRecord {
    fn new() -> Self {
        Self {
            rw: Arc::new(RwLock::new(())),
            ref_count: 0,
            running: 0,
            blocked: 0,
            ops: HashMap::new(),
            holds: HashMap::new(),
        }
    }
}

struct LockMapInner {
    global_lock_counter: i64,
    running_lock_counter: i64,
    blocked_counter: i64,
    registry: HashMap<LockKey, LockRecord>,
}

/// Reference-counted read/write lock registry keyed by `(volume, path)`,
/// with per-operation accounting.
///
/// One registry-wide mutex coordinates the key map and the three global
/// counters; it is only ever held for pointer-chasing and counter
/// updates, never across a parked acquire. The per-key primitive is a
/// tokio `RwLock`, which is write-preferring: once a writer is waiting,
/// later readers queue behind it, so sustained readers cannot starve a
/// writer. Within a key, grant order is the order the primitive imposes.
///
/// Acquires park until granted and cannot be cancelled from outside once
/// parked. Releasing with an operation ID that has no outstanding
/// acquire is a programmer error and panics.
pub struct NsLockMap {
    lock_map: Mutex<LockMapInner>,
}

impl Default for NsLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl NsLockMap {
    pub fn new() -> Self {
        Self {
            lock_map: Mutex::new(LockMapInner {
                global_lock_counter: 0,
                running_lock_counter: 0,
                blocked_counter: 0,
                registry: HashMap::new(),
            }),
        }
    }

    /// Acquires a shared (read) lock on `(volume, path)`.
    ///
    /// `ops_id` is caller-chosen and must be unique per outstanding
    /// acquire on this key; it scopes the matching [`NsLockMap::runlock`].
    #[track_caller]
    pub fn rlock<'a>(&'a self, volume: &str, path: &str, ops_id: &str) -> impl Future<Output = ()> + Send + 'a {
        let origin = caller_origin();
        let (volume, path, ops_id) = (volume.to_owned(), path.to_owned(), ops_id.to_owned());
        async move { self.acquire(volume, path, ops_id, LockType::Read, origin).await }
    }

    /// Acquires an exclusive (write) lock on `(volume, path)`.
    #[track_caller]
    pub fn lock<'a>(&'a self, volume: &str, path: &str, ops_id: &str) -> impl Future<Output = ()> + Send + 'a {
        let origin = caller_origin();
        let (volume, path, ops_id) = (volume.to_owned(), path.to_owned(), ops_id.to_owned());
        async move { self.acquire(volume, path, ops_id, LockType::Write, origin).await }
    }

    /// Releases the shared lock acquired under `ops_id`.
    pub fn runlock(&self, volume: &str, path: &str, ops_id: &str) {
        self.release(volume, path, ops_id, LockType::Read);
    }

    /// Releases the exclusive lock acquired under `ops_id`.
    pub fn unlock(&self, volume: &str, path: &str, ops_id: &str) {
        self.release(volume, path, ops_id, LockType::Write);
    }

    async fn acquire(&self, volume: String, path: String, ops_id: String, lock_type: LockType, origin: String) {
        let key = LockKey { volume, path };

        // Register the waiter and pick up the shared primitive. The
        // registry mutex is released before parking.
        let rw = {
            let mut inner = self.lock_map.lock().expect("lock registry poisoned");
            let record = inner.registry.entry(key.clone()).or_insert_with(LockRecord::new);
            record.ref_count += 1;
            record.blocked += 1;
            debug_assert!(
                !record.ops.contains_key(&ops_id),
                "duplicate operation ID {ops_id} on {}/{}",
                key.volume,
                key.path
            );
            record.ops.insert(
                ops_id.clone(),
                OpsEntry {
                    lock_origin: origin,
                    lock_type,
                    status: LockStatus::Blocked,
                    since: OffsetDateTime::now_utc(),
                },
            );
            let rw = record.rw.clone();
            inner.global_lock_counter += 1;
            inner.blocked_counter += 1;
            rw
        };

        // Park until the primitive is granted. No mutex is held here.
        let hold = match lock_type {
            LockType::Read => LockHold::Read(rw.read_owned().await),
            LockType::Write => LockHold::Write(rw.write_owned().await),
        };

        // Move the operation from blocked to running.
        let mut inner = self.lock_map.lock().expect("lock registry poisoned");
        inner.blocked_counter -= 1;
        inner.running_lock_counter += 1;
        let record = inner
            .registry
            .get_mut(&key)
            .expect("lock record vanished while a waiter was parked");
        record.blocked -= 1;
        record.running += 1;
        let entry = record.ops.get_mut(&ops_id).expect("ops entry vanished while parked");
        entry.status = LockStatus::Running;
        entry.since = OffsetDateTime::now_utc();
        record.holds.insert(ops_id, hold);
    }

    fn release(&self, volume: &str, path: &str, ops_id: &str, lock_type: LockType) {
        let key = LockKey {
            volume: volume.to_owned(),
            path: path.to_owned(),
        };

        let hold;
        {
            let mut inner = self.lock_map.lock().expect("lock registry poisoned");
            let record = inner
                .registry
                .get_mut(&key)
                .unwrap_or_else(|| panic!("unlock of un-locked path {volume}/{path}"));

            let entry = record
                .ops
                .remove(ops_id)
                .unwrap_or_else(|| panic!("unlock with unknown operation ID {ops_id} on {volume}/{path}"));
            assert_eq!(
                entry.lock_type, lock_type,
                "unlock type mismatch for operation ID {ops_id} on {volume}/{path}"
            );

            hold = record
                .holds
                .remove(ops_id)
                .unwrap_or_else(|| panic!("unlock of operation ID {ops_id} on {volume}/{path} that never ran"));

            record.running -= 1;
            record.ref_count -= 1;
            debug_assert!(record.ref_count >= 0 && record.running >= 0);
            if record.ref_count == 0 {
                inner.registry.remove(&key);
            }
            inner.running_lock_counter -= 1;
            inner.global_lock_counter -= 1;
        }
        // Release the primitive outside the registry mutex; a parked
        // waiter re-enters the registry to flip its status.
        drop(hold);
    }

    /// Reads the entire lock state of the node and returns a fully
    /// owned, mutation-safe snapshot.
    pub fn system_lock_state(&self) -> SystemLockState {
        let inner = self.lock_map.lock().expect("lock registry poisoned");
        let now = OffsetDateTime::now_utc();

        let mut state = SystemLockState {
            total_locks: inner.global_lock_counter,
            total_blocked_locks: inner.blocked_counter,
            total_acquired_locks: inner.running_lock_counter,
            locks_info_per_object: Vec::with_capacity(inner.registry.len()),
        };

        for (key, record) in &inner.registry {
            let mut vol_info = VolumeLockInfo {
                bucket: key.volume.clone(),
                object: key.path.clone(),
                locks_on_object: record.ref_count,
                locks_acquired_on_object: record.running,
                total_blocked_locks: record.blocked,
                lock_details_on_object: Vec::with_capacity(record.ops.len()),
            };
            for (ops_id, entry) in &record.ops {
                vol_info.lock_details_on_object.push(OpsLockState {
                    operation_id: ops_id.clone(),
                    lock_origin: entry.lock_origin.clone(),
                    lock_type: entry.lock_type,
                    status: entry.status,
                    since: entry.since,
                    duration: (now - entry.since).whole_nanoseconds() as i64,
                });
            }
            state.locks_info_per_object.push(vol_info);
        }
        state
    }
}

#[track_caller]
fn caller_origin() -> String {
    let loc = Location::caller();
    format!("{}:{}", loc.file(), loc.line())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn assert_counter_invariants(state: &SystemLockState) {
        let mut total = 0;
        let mut running = 0;
        let mut blocked = 0;
        for info in &state.locks_info_per_object {
            assert_eq!(
                info.locks_on_object,
                info.locks_acquired_on_object + info.total_blocked_locks,
                "per-object ref must equal running + blocked"
            );
            total += info.locks_on_object;
            running += info.locks_acquired_on_object;
            blocked += info.total_blocked_locks;
        }
        assert_eq!(state.total_locks, total);
        assert_eq!(state.total_acquired_locks, running);
        assert_eq!(state.total_blocked_locks, blocked);
        assert_eq!(state.total_locks, state.total_acquired_locks + state.total_blocked_locks);
    }

    async fn wait_until(ns: &NsLockMap, cond: impl Fn(&SystemLockState) -> bool) -> SystemLockState {
        for _ in 0..500 {
            let state = ns.system_lock_state();
            if cond(&state) {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("lock state never reached the expected shape: {:?}", ns.system_lock_state());
    }

    #[tokio::test]
    async fn test_read_lock_accounting() {
        let ns = NsLockMap::new();
        for i in 0..10 {
            ns.rlock("my-bucket", "my-object", &i.to_string()).await;
        }

        let state = ns.system_lock_state();
        assert_eq!(state.total_locks, 10);
        assert_eq!(state.total_acquired_locks, 10);
        assert_eq!(state.total_blocked_locks, 0);
        assert_counter_invariants(&state);

        assert_eq!(state.locks_info_per_object.len(), 1);
        let info = &state.locks_info_per_object[0];
        assert_eq!(info.bucket, "my-bucket");
        assert_eq!(info.object, "my-object");
        assert_eq!(info.locks_on_object, 10);
        assert_eq!(info.locks_acquired_on_object, 10);
        assert_eq!(info.total_blocked_locks, 0);
        assert_eq!(info.lock_details_on_object.len(), 10);
        for detail in &info.lock_details_on_object {
            assert_eq!(detail.lock_type, LockType::Read);
            assert_eq!(detail.status, LockStatus::Running);
        }

        for i in 0..10 {
            ns.runlock("my-bucket", "my-object", &i.to_string());
        }
        let state = ns.system_lock_state();
        assert_eq!(state.total_locks, 0);
        assert!(state.locks_info_per_object.is_empty());
    }

    #[tokio::test]
    async fn test_writer_blocks_on_readers_then_unblocks() {
        let ns = Arc::new(NsLockMap::new());
        for i in 0..10 {
            ns.rlock("my-bucket", "my-object", &i.to_string()).await;
        }

        // A writer on the same pair must block until all readers release.
        let writer = {
            let ns = ns.clone();
            tokio::spawn(async move {
                ns.lock("my-bucket", "my-object", "10").await;

                // Once granted, the writer is the only lock left.
                let state = ns.system_lock_state();
                assert_eq!(state.total_locks, 1);
                assert_eq!(state.total_acquired_locks, 1);
                assert_eq!(state.total_blocked_locks, 0);
                let detail = &state.locks_info_per_object[0].lock_details_on_object[0];
                assert_eq!(detail.operation_id, "10");
                assert_eq!(detail.lock_type, LockType::Write);
                assert_eq!(detail.status, LockStatus::Running);

                ns.unlock("my-bucket", "my-object", "10");
            })
        };

        // Observe the blocked writer.
        let state = wait_until(&ns, |s| s.total_blocked_locks == 1).await;
        assert_eq!(state.total_locks, 11);
        assert_eq!(state.total_acquired_locks, 10);
        assert_counter_invariants(&state);
        let info = &state.locks_info_per_object[0];
        assert_eq!(info.locks_on_object, 11);
        assert_eq!(info.locks_acquired_on_object, 10);
        assert_eq!(info.total_blocked_locks, 1);
        let blocked = info
            .lock_details_on_object
            .iter()
            .find(|d| d.operation_id == "10")
            .expect("blocked writer entry missing");
        assert_eq!(blocked.lock_type, LockType::Write);
        assert_eq!(blocked.status, LockStatus::Blocked);

        // Releasing the readers hands the lock to the writer.
        for i in 0..10 {
            ns.runlock("my-bucket", "my-object", &i.to_string());
        }
        writer.await.unwrap();

        let state = ns.system_lock_state();
        assert_eq!(state.total_locks, 0);
        assert_eq!(state.total_acquired_locks, 0);
        assert_eq!(state.total_blocked_locks, 0);
        assert!(state.locks_info_per_object.is_empty());
    }

    #[tokio::test]
    async fn test_disjoint_keys_drain_to_empty() {
        let ns = Arc::new(NsLockMap::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let ns = ns.clone();
            handles.push(tokio::spawn(async move {
                let object = format!("object-{i}");
                let ops_id = format!("ops-{i}");
                if i % 2 == 0 {
                    ns.lock("bucket", &object, &ops_id).await;
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    ns.unlock("bucket", &object, &ops_id);
                } else {
                    ns.rlock("bucket", &object, &ops_id).await;
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    ns.runlock("bucket", &object, &ops_id);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let state = ns.system_lock_state();
        assert_eq!(state.total_locks, 0);
        assert_eq!(state.total_acquired_locks, 0);
        assert_eq!(state.total_blocked_locks, 0);
        assert!(state.locks_info_per_object.is_empty());
    }

    #[tokio::test]
    async fn test_counter_invariants_under_contention() {
        let ns = Arc::new(NsLockMap::new());
        let mut handles = Vec::new();
        for i in 0..24 {
            let ns = ns.clone();
            handles.push(tokio::spawn(async move {
                let ops_id = format!("ops-{i}");
                if i % 3 == 0 {
                    ns.lock("bucket", "hot-object", &ops_id).await;
                    ns.unlock("bucket", "hot-object", &ops_id);
                } else {
                    ns.rlock("bucket", "hot-object", &ops_id).await;
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    ns.runlock("bucket", "hot-object", &ops_id);
                }
            }));
        }

        // Every observation point must satisfy the counter identities.
        for _ in 0..50 {
            assert_counter_invariants(&ns.system_lock_state());
            tokio::time::sleep(Duration::from_micros(200)).await;
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let state = ns.system_lock_state();
        assert_eq!(state.total_locks, 0);
        assert!(state.locks_info_per_object.is_empty());
    }

    #[tokio::test]
    async fn test_lock_origin_points_at_call_site() {
        let ns = NsLockMap::new();
        ns.rlock("bucket", "object", "1").await;
        let state = ns.system_lock_state();
        let origin = &state.locks_info_per_object[0].lock_details_on_object[0].lock_origin;
        assert!(origin.contains("map.rs"), "unexpected lock origin {origin}");
        let line = origin.rsplit(':').next().unwrap();
        assert!(line.parse::<u32>().is_ok(), "lock origin should end in a line number");
        ns.runlock("bucket", "object", "1");
    }

    #[tokio::test]
    async fn test_snapshot_serializes_with_wire_names() {
        let ns = NsLockMap::new();
        ns.lock("my-bucket", "my-object", "42").await;
        let state = ns.system_lock_state();
        let value = serde_json::to_value(&state).unwrap();

        assert_eq!(value["totalLocks"], 1);
        assert_eq!(value["totalAcquiredLocks"], 1);
        assert_eq!(value["totalBlockedLocks"], 0);
        let detail = &value["locksInfoPerObject"][0]["lockDetailsOnObject"][0];
        assert_eq!(detail["opsID"], "42");
        assert_eq!(detail["lockType"], "WLock");
        assert_eq!(detail["status"], "Running");
        assert!(detail["statusSince"].as_str().unwrap().contains('T'));
        assert!(detail["statusDuration"].as_i64().is_some());
        ns.unlock("my-bucket", "my-object", "42");
    }

    #[tokio::test]
    #[should_panic(expected = "unknown operation ID")]
    async fn test_unlock_unknown_ops_id_panics() {
        let ns = NsLockMap::new();
        ns.lock("bucket", "object", "1").await;
        ns.unlock("bucket", "object", "2");
    }

    #[tokio::test]
    #[should_panic(expected = "un-locked path")]
    async fn test_unlock_unknown_path_panics() {
        let ns = NsLockMap::new();
        ns.unlock("bucket", "never-locked", "1");
    }
}
