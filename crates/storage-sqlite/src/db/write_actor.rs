use super::{DbConnection, DbPool};
use crate::errors::StorageError;
use diesel::SqliteConnection;
use log::{debug, warn};
use quotecache_core::errors::Result;
use std::any::Any;
use tokio::sync::{mpsc, oneshot};

// Job executed on the writer's connection inside an immediate transaction.
type Job<T> = Box<dyn FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static>;

type ErasedJob = Job<Box<dyn Any + Send + 'static>>;
type Reply = oneshot::Sender<Result<Box<dyn Any + Send + 'static>>>;

/// Pending writes the channel buffers before `exec` waits for room.
const WRITE_QUEUE_DEPTH: usize = 1024;

/// Handle for sending jobs to the writer actor.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<(ErasedJob, Reply)>,
}

impl WriteHandle {
    /// Executes a database job on the writer actor's dedicated connection.
    ///
    /// Jobs run one at a time, each in its own `BEGIN IMMEDIATE` transaction,
    /// so snapshot writes never interleave.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static + Any,
    {
        let (ret_tx, ret_rx) = oneshot::channel();

        self.tx
            .send((
                Box::new(move |c| job(c).map(|v| Box::new(v) as Box<dyn Any + Send>)),
                ret_tx,
            ))
            .await
            .map_err(|_| StorageError::WriterUnavailable("writer actor has stopped".to_string()))?;

        let boxed = ret_rx.await.map_err(|_| {
            StorageError::WriterUnavailable("writer actor dropped the reply".to_string())
        })??;

        boxed.downcast::<T>().map(|v| *v).map_err(|_| {
            StorageError::CoreError("writer actor returned an unexpected type".to_string()).into()
        })
    }
}

/// Spawns a background Tokio task that acts as the single writer to the database.
///
/// The actor owns one connection from the pool for its whole lifetime and
/// stops when every [`WriteHandle`] has been dropped. Fails if no connection
/// can be taken from the pool.
pub fn spawn_writer(pool: &DbPool) -> Result<WriteHandle> {
    let conn: DbConnection = pool.get().map_err(StorageError::from)?;
    let (tx, rx) = mpsc::channel::<(ErasedJob, Reply)>(WRITE_QUEUE_DEPTH);

    tokio::spawn(run_writer(conn, rx));

    Ok(WriteHandle { tx })
}

async fn run_writer(mut conn: DbConnection, mut rx: mpsc::Receiver<(ErasedJob, Reply)>) {
    while let Some((job, reply_tx)) = rx.recv().await {
        let result: Result<Box<dyn Any + Send + 'static>> = conn
            .immediate_transaction::<_, StorageError, _>(|c| job(c).map_err(StorageError::from))
            .map_err(|e: StorageError| e.into());

        if let Err(e) = &result {
            warn!("Write job failed: {}", e);
        }

        // The requester may have gone away; nothing to do then
        let _ = reply_tx.send(result);
    }
    debug!("Writer actor stopped");
}
