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

use crate::error::{ApiError, Result};
use crate::notification::{ListenerConfig, NotificationConfig, NotificationEvent};
use crate::server::ServerContext;
use crate::storage::{HealResult, ListObjectsHealInfo};
use ferrostore_lock::SystemLockState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::error;

/// Auth preamble embedded in every RPC argument payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenericArgs {
    #[serde(default)]
    pub token: String,
    /// Whether the receiving node should fan the call out to its peers.
    #[serde(default)]
    pub remote: bool,
}

/// Arguments for the HealObjects RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealObjectArgs {
    #[serde(flatten)]
    pub generic: GenericArgs,
    pub bucket: String,
    pub objects: Vec<String>,
}

/// Arguments for the ListObjectsHeal RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealListArgs {
    #[serde(flatten)]
    pub generic: GenericArgs,
    pub bucket: String,
    pub prefix: String,
    pub marker: String,
    pub delimiter: String,
    pub max_keys: usize,
}

/// Arguments for the SetBucketNotification RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetBucketNotificationArgs {
    #[serde(flatten)]
    pub generic: GenericArgs,
    pub bucket: String,
    pub ncfg: Option<NotificationConfig>,
}

/// Arguments for the SetBucketListener RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetBucketListenerArgs {
    #[serde(flatten)]
    pub generic: GenericArgs,
    pub bucket: String,
    pub lcfg: Vec<ListenerConfig>,
}

/// Arguments for the SetBucketPolicy RPC. The policy change rides as
/// serialized JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetBucketPolicyArgs {
    #[serde(flatten)]
    pub generic: GenericArgs,
    pub bucket: String,
    pub pch_bytes: Vec<u8>,
}

/// Arguments for the Event RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventArgs {
    #[serde(flatten)]
    pub generic: GenericArgs,
    pub events: Vec<NotificationEvent>,
    pub arn: String,
}

/// Fans `RemoteLockInfo` out to every peer concurrently and waits for
/// all of them. Replies land in slots indexed by peer position, so the
/// index-to-peer association is preserved without shared mutation. The
/// first observed error wins; in-flight calls still run to completion
/// and their partial results are discarded.
async fn remote_lock_info_call(ctx: &ServerContext, args: &GenericArgs) -> Result<Vec<Option<SystemLockState>>> {
    let peers = ctx.peers();
    let mut replies: Vec<Option<SystemLockState>> = Vec::with_capacity(peers.len());
    replies.resize_with(peers.len(), || None);

    let mut handles = Vec::with_capacity(peers.len());
    for (index, client) in peers.iter().enumerate() {
        let client = client.clone();
        let args = args.clone();
        handles.push(tokio::spawn(async move { (index, client.remote_lock_info(&args).await) }));
    }

    let mut first_err = None;
    for handle in handles {
        let (index, reply) = handle.await.map_err(|err| ApiError::Transport(err.to_string()))?;
        match reply {
            Ok(state) => replies[index] = Some(state),
            Err(err) => {
                error!(
                    "Unable to initiate control lockInfo request to remote node {}: {}",
                    peers[index].node(),
                    err
                );
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(replies),
    }
}

/// Returns the lock state of the cluster, keyed by node address.
///
/// With `remote` set, the call is forwarded (with `remote` reset) to
/// every peer and the map carries one entry per peer plus the local
/// node; otherwise only the local snapshot is returned.
pub async fn lock_info(ctx: &ServerContext, args: &GenericArgs) -> Result<HashMap<String, SystemLockState>> {
    let mut rep = HashMap::new();

    if args.remote {
        let mut forwarded = args.clone();
        forwarded.remote = false;
        let replies = remote_lock_info_call(ctx, &forwarded).await?;
        for (index, reply) in replies.into_iter().enumerate() {
            if let Some(state) = reply {
                rep.insert(ctx.peers()[index].node().to_owned(), state);
            }
        }
    }

    rep.insert(ctx.local_node().to_owned(), ctx.ns_lock().system_lock_state());
    Ok(rep)
}

/// Heals the backend format and wakes every retry-timer loop so waiting
/// nodes re-read format state immediately.
pub async fn heal_format(ctx: &ServerContext) -> Result<()> {
    let layer = ctx.object_layer().ok_or(ApiError::ServerNotInitialized)?;
    layer.heal_format().await?;
    ctx.send_wakeup();
    Ok(())
}

/// Heals the named objects, collecting a per-object result row.
pub async fn heal_objects(ctx: &ServerContext, args: &HealObjectArgs) -> Result<Vec<HealResult>> {
    let layer = ctx.object_layer().ok_or(ApiError::ServerNotInitialized)?;
    if args.bucket.is_empty() || args.objects.is_empty() {
        return Err(ApiError::InvalidArgument);
    }

    let mut results = Vec::with_capacity(args.objects.len());
    for object in &args.objects {
        let outcome = layer.heal_object(&args.bucket, object).await;
        results.push(HealResult {
            object: object.clone(),
            healed: outcome.is_ok(),
            error: outcome.err().map(|err| err.to_string()),
        });
    }
    Ok(results)
}

/// Lists objects needing heal under the given prefix window.
pub async fn list_objects_heal(ctx: &ServerContext, args: &HealListArgs) -> Result<ListObjectsHealInfo> {
    let layer = ctx.object_layer().ok_or(ApiError::ServerNotInitialized)?;
    if args.bucket.is_empty() {
        return Err(ApiError::InvalidArgument);
    }
    layer
        .list_objects_heal(&args.bucket, &args.prefix, &args.marker, &args.delimiter, args.max_keys)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemObjectStore;
    use bytes::Bytes;
    use std::sync::Arc;

    fn ready_context() -> ServerContext {
        let ctx = ServerContext::new("127.0.0.1:9000", Vec::new());
        ctx.set_object_layer(Arc::new(MemObjectStore::new()));
        ctx
    }

    #[tokio::test]
    async fn test_lock_info_local_only() {
        let ctx = ready_context();
        ctx.ns_lock().rlock("bucket", "object", "1").await;

        let rep = lock_info(&ctx, &GenericArgs::default()).await.unwrap();
        assert_eq!(rep.len(), 1);
        let state = &rep["127.0.0.1:9000"];
        assert_eq!(state.total_locks, 1);
        assert_eq!(state.total_acquired_locks, 1);

        ctx.ns_lock().runlock("bucket", "object", "1");
    }

    #[tokio::test]
    async fn test_heal_requires_object_layer() {
        let ctx = ServerContext::new("127.0.0.1:9000", Vec::new());
        assert!(matches!(heal_format(&ctx).await, Err(ApiError::ServerNotInitialized)));

        let args = HealObjectArgs {
            generic: GenericArgs::default(),
            bucket: "bucket".into(),
            objects: vec!["object".into()],
        };
        assert!(matches!(heal_objects(&ctx, &args).await, Err(ApiError::ServerNotInitialized)));
    }

    #[tokio::test]
    async fn test_heal_format_sends_wakeup() {
        let ctx = ready_context();
        let mut wakeup = ctx.subscribe_wakeup();
        heal_format(&ctx).await.unwrap();
        assert!(wakeup.try_recv().is_ok(), "format heal should wake retry loops");
    }

    #[tokio::test]
    async fn test_heal_objects_reports_per_object_outcome() {
        let ctx = ready_context();
        let layer = ctx.object_layer().unwrap();
        layer.make_bucket("testbucket").await.unwrap();
        layer
            .put_object("testbucket", "testobject1", Bytes::from_static(b"a"))
            .await
            .unwrap();

        let args = HealObjectArgs {
            generic: GenericArgs::default(),
            bucket: "testbucket".into(),
            objects: vec!["testobject1".into(), "missing".into()],
        };
        let results = heal_objects(&ctx, &args).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].healed);
        assert!(!results[1].healed);
        assert!(results[1].error.is_some());

        let empty = HealObjectArgs {
            generic: GenericArgs::default(),
            bucket: "testbucket".into(),
            objects: Vec::new(),
        };
        assert!(matches!(heal_objects(&ctx, &empty).await, Err(ApiError::InvalidArgument)));
    }

    #[tokio::test]
    async fn test_generic_args_flatten_on_the_wire() {
        let args = HealListArgs {
            generic: GenericArgs {
                token: "tok".into(),
                remote: true,
            },
            bucket: "testbucket".into(),
            prefix: "testObj-".into(),
            marker: String::new(),
            delimiter: String::new(),
            max_keys: 100,
        };
        let value = serde_json::to_value(&args).unwrap();
        assert_eq!(value["token"], "tok");
        assert_eq!(value["remote"], true);
        assert_eq!(value["bucket"], "testbucket");

        let parsed: HealListArgs = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.generic.token, "tok");
        assert_eq!(parsed.max_keys, 100);
    }
}
