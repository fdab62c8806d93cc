//! Per-account serialization.
//!
//! Concurrent units of work share one paying account. Every job that reads and then
//! spends from that account goes through an [`AccountQueue`], whose worker task runs
//! jobs one at a time in submission order. Work that does not touch the balance
//! (visibility polls) stays outside the queue.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use forge_types::ForgeError;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Handle to a single-owner mailbox for one account. Clones share the same worker.
#[derive(Clone)]
pub struct AccountQueue {
    account: Arc<str>,
    tx: mpsc::UnboundedSender<Job>,
}

impl AccountQueue {
    /// Spawn the worker task for `account`. Must be called inside a tokio runtime.
    ///
    /// The worker exits once every handle has been dropped.
    pub fn spawn(account: impl Into<String>) -> Self {
        let account: Arc<str> = Arc::from(account.into());
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        let worker_account = Arc::clone(&account);
        tokio::spawn(async move {
            let mut processed = 0u64;
            while let Some(job) = rx.recv().await {
                job.await;
                processed += 1;
                trace!(account = %worker_account, processed, "account job finished");
            }
            debug!(account = %worker_account, processed, "account worker stopped");
        });

        Self { account, tx }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Queue `job` behind every job submitted before it and wait for its output.
    ///
    /// Fails with [`ForgeError::QueueClosed`] when the worker is gone, including
    /// when the job itself panicked.
    pub async fn run<T, Fut>(&self, job: Fut) -> Result<T>
    where
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let wrapped: Job = Box::pin(async move {
            let output = job.await;
            // The caller may have stopped waiting; the job still counts as done.
            let _ = reply_tx.send(output);
        });

        self.tx.send(wrapped).map_err(|_| ForgeError::QueueClosed)?;
        reply_rx.await.map_err(|_| ForgeError::QueueClosed.into())
    }
}

impl std::fmt::Debug for AccountQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountQueue")
            .field("account", &self.account)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}
