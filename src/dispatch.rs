//! Background execution of update checks and installs.
//!
//! Each [`Job`] runs as its own tokio task and reports back on one channel.
//! Installs are exclusive per application; update checks are read-only and
//! may overlap freely. Abandoning a job aborts its task at the next await
//! point, so a blocking privileged step that already started still finishes.

use crate::error::Result;
use crate::github::{GitHubClient, ReleaseSource};
use crate::install::{Installer, SystemStrategies};
use crate::manager::install_app;
use crate::platform::HostEnv;
use crate::types::{InstallMethod, InstallOutcome, Release};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub type Ticket = u64;

/// What the dispatcher needs from the outside world.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    async fn latest_release(&self, repo_url: &str) -> Result<Release>;

    async fn install(&self, release: &Release, app_name: &str, method: InstallMethod)
        -> InstallOutcome;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    CheckUpdate {
        app: String,
        repo_url: String,
    },
    Install {
        app: String,
        repo_url: String,
        method: InstallMethod,
    },
}

impl Job {
    pub fn app(&self) -> &str {
        match self {
            Job::CheckUpdate { app, .. } | Job::Install { app, .. } => app,
        }
    }
}

#[derive(Debug)]
pub struct InstallReport {
    pub release: Release,
    pub outcome: InstallOutcome,
}

#[derive(Debug)]
pub enum Message {
    UpdateChecked {
        ticket: Ticket,
        app: String,
        result: Result<Release>,
    },
    /// `result` is an error only when the release lookup failed and nothing
    /// was attempted.
    InstallFinished {
        ticket: Ticket,
        app: String,
        result: Result<InstallReport>,
    },
}

impl Message {
    pub fn ticket(&self) -> Ticket {
        match self {
            Message::UpdateChecked { ticket, .. } | Message::InstallFinished { ticket, .. } => {
                *ticket
            }
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DispatchError {
    #[error("{0} is already being installed or updated")]
    Busy(String),
}

struct PendingJob {
    app: String,
    handle: JoinHandle<()>,
}

pub struct Dispatcher<B> {
    backend: Arc<B>,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    next_ticket: Ticket,
    /// In-flight tickets, the application each belongs to and its task.
    pending: HashMap<Ticket, PendingJob>,
    /// Applications with an install in flight.
    busy: HashMap<String, Ticket>,
}

impl<B: Backend> Dispatcher<B> {
    pub fn new(backend: B) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            backend: Arc::new(backend),
            tx,
            rx,
            next_ticket: 1,
            pending: HashMap::new(),
            busy: HashMap::new(),
        }
    }

    pub fn is_busy(&self, app: &str) -> bool {
        self.busy.contains_key(app)
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Starts `job` in the background and returns its ticket.
    pub fn dispatch(&mut self, job: Job) -> std::result::Result<Ticket, DispatchError> {
        let app = job.app().to_string();
        if matches!(job, Job::Install { .. }) && self.is_busy(&app) {
            return Err(DispatchError::Busy(app));
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        if matches!(job, Job::Install { .. }) {
            self.busy.insert(app.clone(), ticket);
        }

        tracing::debug!("Dispatching job {} for {}", ticket, app);
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let message = run_job(backend.as_ref(), ticket, job).await;
            // The receiver only goes away with the dispatcher itself.
            let _ = tx.send(message);
        });
        self.pending.insert(ticket, PendingJob { app, handle });
        Ok(ticket)
    }

    /// Aborts every pending job of `app`. Results that were already sent are
    /// dropped on arrival and the application can be dispatched again
    /// immediately.
    pub fn abandon(&mut self, app: &str) -> usize {
        self.busy.remove(app);
        let before = self.pending.len();
        self.pending.retain(|_, job| {
            if job.app == app {
                job.handle.abort();
                false
            } else {
                true
            }
        });
        let dropped = before - self.pending.len();
        if dropped > 0 {
            tracing::debug!("Abandoned {} job(s) for {}", dropped, app);
        }
        dropped
    }

    /// Next completion of a job that is still wanted, or `None` once nothing
    /// is in flight.
    pub async fn next(&mut self) -> Option<Message> {
        while !self.pending.is_empty() {
            let message = self.rx.recv().await?;
            let ticket = message.ticket();
            let Some(job) = self.pending.remove(&ticket) else {
                tracing::debug!("Dropping result of abandoned job {}", ticket);
                continue;
            };
            if self.busy.get(&job.app) == Some(&ticket) {
                self.busy.remove(&job.app);
            }
            return Some(message);
        }
        None
    }
}

async fn run_job<B: Backend + ?Sized>(backend: &B, ticket: Ticket, job: Job) -> Message {
    match job {
        Job::CheckUpdate { app, repo_url } => {
            let result = backend.latest_release(&repo_url).await;
            Message::UpdateChecked {
                ticket,
                app,
                result,
            }
        }
        Job::Install {
            app,
            repo_url,
            method,
        } => {
            let result = match backend.latest_release(&repo_url).await {
                Ok(release) => {
                    let outcome = backend.install(&release, &app, method).await;
                    Ok(InstallReport { release, outcome })
                }
                Err(e) => Err(e),
            };
            Message::InstallFinished {
                ticket,
                app,
                result,
            }
        }
    }
}

/// Backend talking to GitHub and installing onto this host.
pub struct LiveBackend {
    source: GitHubClient,
    installer: Installer<SystemStrategies>,
}

impl LiveBackend {
    pub fn new(env: HostEnv, api_base: &str) -> Result<Self> {
        let source = GitHubClient::new(api_base)?;
        let strategies = SystemStrategies::new(env, source.http().clone());
        Ok(Self {
            source,
            installer: Installer::new(strategies),
        })
    }
}

#[async_trait]
impl Backend for LiveBackend {
    async fn latest_release(&self, repo_url: &str) -> Result<Release> {
        self.source.latest_release(repo_url).await
    }

    async fn install(
        &self,
        release: &Release,
        app_name: &str,
        method: InstallMethod,
    ) -> InstallOutcome {
        install_app(&self.installer, release, app_name, method).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InstallError;
    use crate::types::Strategy;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    /// Installs block until the test hands out a permit.
    struct GatedBackend {
        gate: Semaphore,
        installs: AtomicUsize,
    }

    impl GatedBackend {
        fn new() -> Self {
            Self {
                gate: Semaphore::new(0),
                installs: AtomicUsize::new(0),
            }
        }

        fn installs(&self) -> usize {
            self.installs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Backend for GatedBackend {
        async fn latest_release(&self, repo_url: &str) -> Result<Release> {
            if repo_url.contains("missing") {
                return Err(InstallError::ReleaseNotFound(repo_url.to_string()));
            }
            Ok(Release {
                tag_name: "v1.0.0".to_string(),
                name: None,
                assets: vec![],
            })
        }

        async fn install(&self, release: &Release, _: &str, _: InstallMethod) -> InstallOutcome {
            self.gate.acquire().await.unwrap().forget();
            self.installs.fetch_add(1, Ordering::SeqCst);
            InstallOutcome::success(Strategy::Binary, release.version(), None, "done")
        }
    }

    fn install_job(app: &str) -> Job {
        Job::Install {
            app: app.to_string(),
            repo_url: format!("https://github.com/o/{}", app),
            method: InstallMethod::Auto,
        }
    }

    fn check_job(app: &str) -> Job {
        Job::CheckUpdate {
            app: app.to_string(),
            repo_url: format!("https://github.com/o/{}", app),
        }
    }

    #[tokio::test]
    async fn test_second_install_for_same_app_is_refused() {
        let mut dispatcher = Dispatcher::new(GatedBackend::new());

        let first = dispatcher.dispatch(install_job("tool")).unwrap();
        assert!(dispatcher.is_busy("tool"));
        assert_eq!(
            dispatcher.dispatch(install_job("tool")),
            Err(DispatchError::Busy("tool".to_string()))
        );
        // Other apps and read-only checks are unaffected.
        dispatcher.dispatch(install_job("other")).unwrap();
        dispatcher.dispatch(check_job("tool")).unwrap();
        assert_eq!(dispatcher.in_flight(), 3);

        dispatcher.backend.gate.add_permits(2);
        let mut finished = Vec::new();
        while let Some(message) = dispatcher.next().await {
            finished.push(message.ticket());
        }
        finished.sort();
        assert_eq!(finished, vec![first, first + 1, first + 2]);
        assert!(!dispatcher.is_busy("tool"));
        assert!(dispatcher.dispatch(install_job("tool")).is_ok());
    }

    #[tokio::test]
    async fn test_update_check_reports_release() {
        let mut dispatcher = Dispatcher::new(GatedBackend::new());
        let ticket = dispatcher.dispatch(check_job("tool")).unwrap();
        let missing = dispatcher.dispatch(check_job("missing")).unwrap();

        let mut seen = 0;
        while let Some(message) = dispatcher.next().await {
            match message {
                Message::UpdateChecked { ticket: t, result, .. } if t == ticket => {
                    assert_eq!(result.unwrap().version(), "1.0.0");
                }
                Message::UpdateChecked { ticket: t, result, .. } if t == missing => {
                    assert!(matches!(result, Err(InstallError::ReleaseNotFound(_))));
                }
                other => panic!("unexpected {:?}", other),
            }
            seen += 1;
        }
        assert_eq!(seen, 2);
    }

    #[tokio::test]
    async fn test_retry_after_abandon_installs_once() {
        let mut dispatcher = Dispatcher::new(GatedBackend::new());

        let abandoned = dispatcher.dispatch(install_job("tool")).unwrap();
        assert_eq!(dispatcher.abandon("tool"), 1);
        assert!(!dispatcher.is_busy("tool"));

        let retry = dispatcher.dispatch(install_job("tool")).unwrap();
        assert_ne!(abandoned, retry);

        dispatcher.backend.gate.add_permits(2);
        let message = dispatcher.next().await.unwrap();
        assert_eq!(message.ticket(), retry);
        match message {
            Message::InstallFinished { result, .. } => {
                let report = result.unwrap();
                assert!(report.outcome.succeeded);
                assert_eq!(report.release.tag_name, "v1.0.0");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(dispatcher.next().await.is_none());

        tokio::task::yield_now().await;
        assert_eq!(dispatcher.backend.installs(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_install_never_runs() {
        let mut dispatcher = Dispatcher::new(GatedBackend::new());

        dispatcher.dispatch(install_job("tool")).unwrap();
        assert_eq!(dispatcher.abandon("tool"), 1);
        assert_eq!(dispatcher.in_flight(), 0);

        dispatcher.backend.gate.add_permits(1);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(dispatcher.backend.installs(), 0);
        assert!(dispatcher.next().await.is_none());
    }

    #[tokio::test]
    async fn test_install_with_failed_lookup_reports_error() {
        let mut dispatcher = Dispatcher::new(GatedBackend::new());
        dispatcher.dispatch(install_job("missing")).unwrap();

        match dispatcher.next().await.unwrap() {
            Message::InstallFinished { app, result, .. } => {
                assert_eq!(app, "missing");
                assert!(result.is_err());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!dispatcher.is_busy("missing"));
    }
}
