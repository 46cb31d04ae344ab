// SPDX-License-Identifier: MIT OR Apache-2.0

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How external update requests touching protected fields are handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldUpdatePolicy {
    /// Changes to read-only or inaccessible fields are dropped silently.
    #[default]
    Revert,

    /// Changes to read-only or inaccessible fields fail the whole request.
    Reject,
}

/// Configuration for a document engine instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Maximum length of document names.
    pub max_name_length: usize,

    /// User which passes every permission check.
    pub administrator: String,

    /// Handling of protected fields in `apply_update` requests.
    pub field_update_policy: FieldUpdatePolicy,

    /// Directory holding lock files of queued actions.
    pub lock_dir: PathBuf,

    /// How long to wait for a document lock before giving up, zero fails right away.
    pub lock_timeout: Duration,

    /// Pause between two attempts to acquire a document lock.
    pub lock_retry_interval: Duration,

    /// Publish realtime events after documents changed.
    pub notify_update: bool,

    /// Capacity of the realtime event channel.
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_name_length: 100,
            administrator: "Administrator".into(),
            field_update_policy: FieldUpdatePolicy::default(),
            lock_dir: std::env::temp_dir().join("doclife-locks"),
            lock_timeout: Duration::ZERO,
            lock_retry_interval: Duration::from_secs(1),
            notify_update: true,
            event_capacity: 256,
        }
    }
}
