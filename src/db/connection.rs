use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::migrate;

/// How long a write waits on another `repcounter` process holding the lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type Job = Box<dyn FnOnce(&mut Connection) + Send>;

/// Thread that owns the connection. It runs jobs in submission order and
/// exits once the queue closes.
struct Worker {
    jobs: Option<mpsc::Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Workout database thread panicked");
            }
        }
    }
}

/// Workout database handle. Clones share one connection thread.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let conn = open_connection(&db_path)?;
        let (jobs, queue) = mpsc::channel::<Job>();
        let thread = thread::Builder::new()
            .name("repcounter-db".into())
            .spawn(move || serve(conn, queue))
            .context("failed to spawn database thread")?;

        info!("Workout database ready at {}", db_path.display());

        Ok(Self {
            worker: Arc::new(Worker {
                jobs: Some(jobs),
                thread: Some(thread),
            }),
        })
    }

    /// Runs `job` on the connection thread and waits for its result.
    pub(crate) async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let jobs = self
            .worker
            .jobs
            .as_ref()
            .ok_or_else(|| anyhow!("workout database is closed"))?;

        let (reply, response) = oneshot::channel();
        jobs.send(Box::new(move |conn| {
            if reply.send(job(conn)).is_err() {
                debug!("Workout query finished after its caller went away");
            }
        }))
        .map_err(|_| anyhow!("workout database thread has stopped"))?;

        response
            .await
            .map_err(|_| anyhow!("workout database thread dropped the request"))?
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open workout database {}", path.display()))?;

    let journal_mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .context("failed to set journal mode")?;
    if !journal_mode.eq_ignore_ascii_case("wal") {
        warn!("Workout database is using {journal_mode} journaling instead of WAL");
    }
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set busy timeout")?;

    migrate(&mut conn)?;
    Ok(conn)
}

fn serve(mut conn: Connection, queue: mpsc::Receiver<Job>) {
    for job in queue {
        job(&mut conn);
    }
    debug!("Workout database thread stopped");
}
