use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use sqlx::postgres::PgListener;
use tokio::sync::mpsc::{self, UnboundedSender};

#[derive(Debug, PartialEq)]
pub enum HandleResult {
    HadJob,
    NoJobs,
}

/// Notification payload announcing a freshly enqueued job.
#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct JobNotification {
    pub timestamp: DateTime<Utc>,
    pub table: String,
}

/// Handler is the trait implemented by the job-table-specific task handlers.
/// They need to be `Send` because handler invocations are driven from a
/// multithreaded runtime.
#[async_trait::async_trait]
pub trait Handler: Send {
    /// Attempt to handle the next available job, returning whether an
    /// eligible job was found.
    async fn handle(&mut self, pg_pool: &sqlx::PgPool) -> anyhow::Result<HandleResult>;

    fn table_name(&self) -> &'static str;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

async fn listen_for_jobs(
    task_tx: UnboundedSender<String>,
    table_names: Vec<String>,
    pg_pool: sqlx::PgPool,
) -> anyhow::Result<()> {
    tracing::debug!(?table_names, "listening for job notifications");
    let mut listener = PgListener::connect_with(&pg_pool).await?;
    listener.listen(store_sql::jobs::NOTIFICATION_CHANNEL).await?;

    loop {
        let maybe_notification = listener
            .try_recv()
            .await
            .context("listening for job notifications from the database")?;

        // try_recv returns None when the connection is lost. The listener
        // reconnects on its own, but any NOTIFY sent in between is gone, so
        // wake every handler to look for work.
        let Some(notification) = maybe_notification else {
            tracing::warn!("notification stream lost, waking all handlers and reconnecting");
            for table in &table_names {
                task_tx.send(table.clone())?;
            }
            continue;
        };

        let notification: JobNotification = serde_json::from_str(notification.payload())
            .context("deserializing job notification")?;
        tracing::debug!(table = %notification.table, "received job notification");
        task_tx.send(notification.table)?;
    }
}

#[derive(Debug, PartialEq, Copy, Clone)]
enum Status {
    Poll,
    Idle,
}

struct WrappedHandler {
    status: Status,
    handler: Box<dyn Handler>,
}

impl WrappedHandler {
    async fn handle_next_job(&mut self, pg_pool: &sqlx::PgPool) -> anyhow::Result<()> {
        match self.handler.handle(pg_pool).await {
            Ok(HandleResult::HadJob) => Ok(()),
            Ok(HandleResult::NoJobs) => {
                tracing::debug!(handler = %self.handler.name(), "handler drained its jobs");
                self.status = Status::Idle;
                Ok(())
            }
            Err(err) => {
                tracing::error!(handler = %self.handler.name(), error = ?err, "handler failed");
                Err(err)
            }
        }
    }
}

/// Drive the job handlers until `exit` resolves. Handlers are woken by
/// NOTIFYs from job enqueues and, as a fallback, by a periodic poll which
/// also picks up jobs whose retry backoff has elapsed.
#[tracing::instrument(ret, skip_all)]
pub async fn serve<E>(
    handlers: Vec<Box<dyn Handler>>,
    pg_pool: sqlx::PgPool,
    exit: E,
) -> anyhow::Result<()>
where
    E: std::future::Future<Output = ()> + Send,
{
    let (task_tx, mut task_rx) = mpsc::unbounded_channel::<String>();

    let table_names = handlers
        .iter()
        .map(|h| h.table_name().to_string())
        .collect::<Vec<_>>();

    let mut handlers_by_table = handlers
        .into_iter()
        .map(|handler| {
            (
                handler.table_name().to_string(),
                WrappedHandler {
                    // Every handler might have jobs left over from before
                    // this process started.
                    status: Status::Poll,
                    handler,
                },
            )
        })
        .collect::<HashMap<_, _>>();

    let mut listener = tokio::spawn(listen_for_jobs(
        task_tx.clone(),
        table_names,
        pg_pool.clone(),
    ));

    tokio::pin!(exit);

    loop {
        if (&mut exit).now_or_never().is_some() {
            tracing::info!("caught signal; exiting...");
            return Ok(());
        }
        if let Some(listener_result) = (&mut listener).now_or_never() {
            // The listener loop never returns on its own; reaching here
            // means it failed or panicked.
            anyhow::bail!("job notification listener exited: {listener_result:?}");
        }

        // Drain all notifications that are available right now.
        while let Ok(table) = task_rx.try_recv() {
            let Some(handler) = handlers_by_table.get_mut(&table) else {
                tracing::warn!(%table, "notification names an unknown job table");
                continue;
            };
            handler.status = Status::Poll;
        }

        for handler in handlers_by_table
            .values_mut()
            .filter(|h| h.status == Status::Poll)
        {
            handler.handle_next_job(&pg_pool).await?;
        }

        if handlers_by_table.values().all(|h| h.status == Status::Idle) {
            tokio::select! {
                _ = &mut exit => {
                    tracing::info!("caught signal; exiting...");
                    return Ok(());
                }
                received = task_rx.recv() => {
                    let Some(table) = received else {
                        anyhow::bail!("notification channel closed unexpectedly");
                    };
                    let Some(handler) = handlers_by_table.get_mut(&table) else {
                        tracing::warn!(%table, "notification names an unknown job table");
                        continue;
                    };
                    handler.status = Status::Poll;
                }
                _ = tokio::time::sleep(Duration::from_secs(60)) => {
                    tracing::debug!("periodic poll of all handlers");
                    for handler in handlers_by_table.values_mut() {
                        handler.status = Status::Poll;
                    }
                }
            }
        }
    }
}
