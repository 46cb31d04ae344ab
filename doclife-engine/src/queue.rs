// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deferred lifecycle actions and the file locks guarding them.
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use doclife_core::Document;
use tokio::fs::{self, OpenOptions};
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, sleep};
use tracing::{debug, trace, warn};

use crate::context::Context;
use crate::engine::{DocumentStore, Engine};
use crate::error::DocumentError;
use crate::permissions;
use crate::transition::Action;

/// Action waiting to be executed against a stored document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedAction {
    pub doctype: String,
    pub name: String,
    pub action: Action,

    /// Lock signature of the document, released before the action runs.
    pub signature: String,
}

/// Result of running a queued action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed(Action),

    /// Action failed and was rolled back, the error was recorded as a comment on the document.
    Failed { error: String },
}

/// Signature of a document used to name its lock file, derived from its creation time.
pub fn lock_signature(doc: &Document) -> Result<String, DocumentError> {
    let creation = doc.creation.ok_or_else(|| {
        DocumentError::Validation(format!(
            "{} {} needs to be saved before it can be locked",
            doc.doctype,
            doc.name()
        ))
    })?;
    let hash = blake3::hash(creation.to_string().as_bytes());
    Ok(hex::encode(hash.as_bytes()))
}

pub(crate) fn lock_path(lock_dir: &Path, signature: &str) -> PathBuf {
    lock_dir.join(format!("{signature}.lock"))
}

/// Create the lock file, retrying every `interval` until `timeout` passed.
pub(crate) async fn acquire_lock(
    lock_dir: &Path,
    doc: &Document,
    timeout: Duration,
    interval: Duration,
) -> Result<String, DocumentError> {
    let signature = lock_signature(doc)?;
    let path = lock_path(lock_dir, &signature);
    fs::create_dir_all(lock_dir).await?;

    let deadline = Instant::now() + timeout;
    loop {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => {
                debug!(doctype = %doc.doctype, name = doc.name(), "acquired document lock");
                return Ok(signature);
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(DocumentError::DocumentLocked {
                        doctype: doc.doctype.clone(),
                        name: doc.name().to_owned(),
                    });
                }
                trace!(doctype = %doc.doctype, name = doc.name(), "document is locked, retry");
                sleep(interval.min(deadline - now)).await;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Remove a lock file, a missing file is not an error.
pub(crate) async fn release_lock(lock_dir: &Path, signature: &str) -> Result<(), DocumentError> {
    match fs::remove_file(lock_path(lock_dir, signature)).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

pub(crate) async fn is_locked(lock_dir: &Path, signature: &str) -> Result<bool, DocumentError> {
    Ok(fs::try_exists(lock_path(lock_dir, signature)).await?)
}

/// Channel of queued actions shared by all clones of an engine.
#[derive(Clone, Debug)]
pub(crate) struct ActionQueue {
    tx: UnboundedSender<QueuedAction>,
    rx: Arc<Mutex<UnboundedReceiver<QueuedAction>>>,
}

impl ActionQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    pub fn push(&self, action: QueuedAction) {
        // The receiver lives as long as the queue itself.
        let _ = self.tx.send(action);
    }

    pub async fn pop(&self) -> Option<QueuedAction> {
        self.rx.lock().await.try_recv().ok()
    }
}

impl<S> Engine<S>
where
    S: DocumentStore,
{
    /// Lock a stored document, waiting up to `timeout` or the configured lock timeout.
    ///
    /// Returns the signature the lock is held under.
    pub async fn lock(
        &self,
        doc: &Document,
        timeout: Option<Duration>,
    ) -> Result<String, DocumentError> {
        acquire_lock(
            &self.config.lock_dir,
            doc,
            timeout.unwrap_or(self.config.lock_timeout),
            self.config.lock_retry_interval,
        )
        .await
    }

    pub async fn unlock(&self, doc: &Document) -> Result<(), DocumentError> {
        release_lock(&self.config.lock_dir, &lock_signature(doc)?).await
    }

    pub async fn is_locked(&self, doc: &Document) -> Result<bool, DocumentError> {
        is_locked(&self.config.lock_dir, &lock_signature(doc)?).await
    }

    /// Lock the document and queue `action` for later execution.
    ///
    /// Fails right away with `DocumentLocked` if another action is queued for it already.
    pub async fn queue_action(
        &self,
        ctx: &Context,
        doc: &Document,
        action: Action,
    ) -> Result<(), DocumentError> {
        if doc.is_new() {
            return Err(DocumentError::Validation(format!(
                "{} needs to be saved before actions can be queued",
                doc.doctype
            )));
        }
        let meta = self.meta(&doc.doctype)?;
        permissions::check_permission(
            &self.config,
            ctx,
            &meta,
            doc.name(),
            action.required_permission(),
        )?;

        let signature = acquire_lock(
            &self.config.lock_dir,
            doc,
            Duration::ZERO,
            self.config.lock_retry_interval,
        )
        .await?;
        debug!(doctype = %doc.doctype, name = doc.name(), %action, "queue action");
        self.queue.push(QueuedAction {
            doctype: doc.doctype.clone(),
            name: doc.name().to_owned(),
            action,
            signature,
        });
        Ok(())
    }

    /// Run every queued action in its own transaction.
    ///
    /// A failing action is rolled back and recorded as a comment on its document instead of
    /// failing the whole run.
    pub async fn run_queued_actions(
        &self,
        ctx: &mut Context,
    ) -> Result<Vec<(QueuedAction, ActionOutcome)>, DocumentError> {
        let mut outcomes = Vec::new();
        while let Some(queued) = self.queue.pop().await {
            let loaded = self.get_doc(&queued.doctype, &queued.name).await;
            release_lock(&self.config.lock_dir, &queued.signature).await?;

            let result = match loaded {
                Ok(mut doc) => self.run_action(ctx, &mut doc, queued.action).await,
                Err(err) => Err(err),
            };
            let outcome = match result {
                Ok(action) => ActionOutcome::Completed(action),
                Err(err) => {
                    warn!(
                        doctype = %queued.doctype,
                        name = %queued.name,
                        action = %queued.action,
                        "queued action failed: {err}"
                    );
                    self.add_comment(
                        ctx,
                        &queued.doctype,
                        &queued.name,
                        "Comment",
                        &format!("Action Failed: {err}"),
                    )
                    .await?;
                    ActionOutcome::Failed {
                        error: err.to_string(),
                    }
                }
            };
            outcomes.push((queued, outcome));
        }
        Ok(outcomes)
    }

    async fn run_action(
        &self,
        ctx: &mut Context,
        doc: &mut Document,
        action: Action,
    ) -> Result<Action, DocumentError> {
        match action {
            Action::Save | Action::UpdateAfterSubmit => self.save(ctx, doc).await,
            Action::Submit => self.submit(ctx, doc).await,
            Action::Cancel => self.cancel(ctx, doc).await,
        }
    }
}
