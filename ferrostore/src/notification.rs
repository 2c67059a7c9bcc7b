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
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Notification target bound to a bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetConfig {
    pub arn: String,
    pub events: Vec<String>,
}

/// Per-bucket notification configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationConfig {
    pub queue_configs: Vec<TargetConfig>,
}

/// Per-bucket listener registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListenerConfig {
    pub arn: String,
    pub events: Vec<String>,
}

/// A single notification event forwarded between peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub event_name: String,
    pub bucket: String,
    pub object: String,
    pub event_time: String,
}

/// In-memory registry of bucket notification and listener
/// configurations, plus the events queued per listener ARN. Delivery to
/// external targets is outside this repository.
#[derive(Default)]
pub struct EventNotifier {
    notification_configs: RwLock<HashMap<String, NotificationConfig>>,
    listener_configs: RwLock<HashMap<String, Vec<ListenerConfig>>>,
    listener_events: RwLock<HashMap<String, Vec<NotificationEvent>>>,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_bucket_notification_config(&self, bucket: &str, config: Option<NotificationConfig>) {
        let mut configs = self.notification_configs.write().await;
        match config {
            Some(config) => {
                debug!("updating notification config for bucket {}", bucket);
                configs.insert(bucket.to_owned(), config);
            }
            None => {
                configs.remove(bucket);
            }
        }
    }

    pub async fn bucket_notification_config(&self, bucket: &str) -> Option<NotificationConfig> {
        self.notification_configs.read().await.get(bucket).cloned()
    }

    pub async fn set_bucket_listener_config(&self, bucket: &str, configs: Vec<ListenerConfig>) -> Result<()> {
        let mut listeners = self.listener_configs.write().await;
        if configs.is_empty() {
            listeners.remove(bucket);
            return Ok(());
        }
        listeners.insert(bucket.to_owned(), configs);
        Ok(())
    }

    pub async fn bucket_listener_config(&self, bucket: &str) -> Option<Vec<ListenerConfig>> {
        self.listener_configs.read().await.get(bucket).cloned()
    }

    /// Queues events for the listener registered under `arn`.
    pub async fn send_listener_event(&self, arn: &str, events: Vec<NotificationEvent>) -> Result<()> {
        let registered = {
            let listeners = self.listener_configs.read().await;
            listeners.values().flatten().any(|config| config.arn == arn)
        };
        if !registered {
            return Err(ApiError::InvalidArgument);
        }
        self.listener_events
            .write()
            .await
            .entry(arn.to_owned())
            .or_default()
            .extend(events);
        Ok(())
    }

    pub async fn listener_events(&self, arn: &str) -> Vec<NotificationEvent> {
        self.listener_events.read().await.get(arn).cloned().unwrap_or_default()
    }
}

/// A bucket policy update shipped between peers, serialized to JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyChange {
    pub is_remove: bool,
    pub policy: Option<serde_json::Value>,
}

/// In-memory bucket policy store.
#[derive(Default)]
pub struct BucketPolicyStore {
    policies: RwLock<HashMap<String, serde_json::Value>>,
}

impl BucketPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_bucket_policy(&self, bucket: &str, change: PolicyChange) -> Result<()> {
        let mut policies = self.policies.write().await;
        if change.is_remove {
            policies.remove(bucket);
            return Ok(());
        }
        let policy = change.policy.ok_or(ApiError::InvalidArgument)?;
        policies.insert(bucket.to_owned(), policy);
        Ok(())
    }

    pub async fn bucket_policy(&self, bucket: &str) -> Option<serde_json::Value> {
        self.policies.read().await.get(bucket).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listener(arn: &str) -> ListenerConfig {
        ListenerConfig {
            arn: arn.to_owned(),
            events: vec!["s3:ObjectCreated:*".to_owned()],
        }
    }

    #[tokio::test]
    async fn test_notification_config_update() {
        let notifier = EventNotifier::new();
        let config = NotificationConfig {
            queue_configs: vec![TargetConfig {
                arn: "arn:ferrostore:sqs::1:target".to_owned(),
                events: vec!["s3:ObjectCreated:*".to_owned()],
            }],
        };

        notifier.set_bucket_notification_config("bucket", Some(config.clone())).await;
        assert_eq!(notifier.bucket_notification_config("bucket").await, Some(config));

        notifier.set_bucket_notification_config("bucket", None).await;
        assert!(notifier.bucket_notification_config("bucket").await.is_none());
    }

    #[tokio::test]
    async fn test_listener_events_require_registration() {
        let notifier = EventNotifier::new();
        let arn = "arn:ferrostore:sqs::1:ws";
        let event = NotificationEvent {
            event_name: "s3:ObjectCreated:Put".to_owned(),
            bucket: "bucket".to_owned(),
            object: "object".to_owned(),
            event_time: "2024-01-01T00:00:00Z".to_owned(),
        };

        // Unregistered ARN is rejected.
        assert!(matches!(
            notifier.send_listener_event(arn, vec![event.clone()]).await,
            Err(ApiError::InvalidArgument)
        ));

        notifier
            .set_bucket_listener_config("bucket", vec![listener(arn)])
            .await
            .unwrap();
        notifier.send_listener_event(arn, vec![event]).await.unwrap();
        assert_eq!(notifier.listener_events(arn).await.len(), 1);

        // An empty config clears the registration.
        notifier.set_bucket_listener_config("bucket", Vec::new()).await.unwrap();
        assert!(notifier.bucket_listener_config("bucket").await.is_none());
    }

    #[tokio::test]
    async fn test_bucket_policy_store() {
        let store = BucketPolicyStore::new();
        let policy = json!({"Version": "2012-10-17", "Statement": []});

        store
            .set_bucket_policy(
                "bucket",
                PolicyChange {
                    is_remove: false,
                    policy: Some(policy.clone()),
                },
            )
            .await
            .unwrap();
        assert_eq!(store.bucket_policy("bucket").await, Some(policy));

        // A non-remove change without a policy body is malformed.
        assert!(matches!(
            store
                .set_bucket_policy(
                    "bucket",
                    PolicyChange {
                        is_remove: false,
                        policy: None,
                    },
                )
                .await,
            Err(ApiError::InvalidArgument)
        ));

        store
            .set_bucket_policy(
                "bucket",
                PolicyChange {
                    is_remove: true,
                    policy: None,
                },
            )
            .await
            .unwrap();
        assert!(store.bucket_policy("bucket").await.is_none());
    }
}
