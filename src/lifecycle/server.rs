//! Embedded server management
//!
//! Four ways to run an [`Application`]:
//!
//! ```text
//! serve_blocking   own multi-thread runtime, blocks until Ctrl+C / SIGTERM
//! serve            caller's runtime, runs until Ctrl+C / SIGTERM
//! start_background own thread + current-thread runtime, returns once bound
//! start            caller's runtime, spawned task, returns once bound
//! ```
//!
//! The last two are stopped with [`Application::stop`] or
//! [`Application::shutdown`]. When a serve loop exits, the application's
//! container is closed.

use super::application::{resolve_parts, Application, ResolveInputs};
use super::shutdown::shutdown_signal;
use crate::di::Container;
use crate::error::{AutowireError, Result};
use crate::web::ShutdownHook;
use axum::Router;
use serde::{Deserialize, Deserializer};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Listener configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// How long `stop` waits for a background server to finish, in seconds
    /// when deserialised.
    #[serde(deserialize_with = "seconds")]
    pub stop_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            stop_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Duration, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

/// Outcome of a stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStatus {
    /// No server was running
    NotRunning,
    /// The server finished within the stop timeout
    Stopped,
    /// The stop signal was sent; the serve task finishes on its own runtime
    Signalled,
    /// The server did not finish within the stop timeout
    TimedOut,
}

/// A running listener. Dropping it signals the server to stop.
pub(crate) enum ServerHandle {
    Task {
        addr: SocketAddr,
        stop: oneshot::Sender<()>,
        task: JoinHandle<()>,
        timeout: Duration,
    },
    Thread {
        addr: SocketAddr,
        stop: oneshot::Sender<()>,
        done: mpsc::Receiver<()>,
        thread: thread::JoinHandle<()>,
        timeout: Duration,
    },
}

impl ServerHandle {
    fn addr(&self) -> SocketAddr {
        match self {
            ServerHandle::Task { addr, .. } | ServerHandle::Thread { addr, .. } => *addr,
        }
    }

    fn stop(self) -> StopStatus {
        match self {
            ServerHandle::Task { addr, stop, .. } => {
                tracing::info!("Stopping server on {}", addr);
                let _ = stop.send(());
                StopStatus::Signalled
            }
            ServerHandle::Thread {
                addr,
                stop,
                done,
                thread,
                timeout,
            } => {
                tracing::info!("Stopping server thread on {}", addr);
                let _ = stop.send(());
                match done.recv_timeout(timeout) {
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                        if thread.join().is_err() {
                            tracing::error!("Server thread on {} panicked", addr);
                        }
                        StopStatus::Stopped
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        tracing::warn!(
                            "Server thread on {} did not stop within {:?}",
                            addr,
                            timeout
                        );
                        StopStatus::TimedOut
                    }
                }
            }
        }
    }

    async fn shutdown(self) -> StopStatus {
        match self {
            ServerHandle::Task {
                addr,
                stop,
                task,
                timeout,
            } => {
                tracing::info!("Shutting down server on {}", addr);
                let _ = stop.send(());
                let abort = task.abort_handle();
                match tokio::time::timeout(timeout, task).await {
                    Ok(_) => StopStatus::Stopped,
                    Err(_) => {
                        tracing::warn!("Server on {} did not stop within {:?}", addr, timeout);
                        abort.abort();
                        StopStatus::TimedOut
                    }
                }
            }
            thread @ ServerHandle::Thread { .. } => tokio::task::spawn_blocking(move || thread.stop())
                .await
                .unwrap_or_else(|err| {
                    tracing::error!("Failed to wait for server thread: {}", err);
                    StopStatus::Signalled
                }),
        }
    }
}

enum Prepared {
    Ready(Router, ShutdownHook),
    Pending(ResolveInputs),
}

async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr).await.map_err(|source| AutowireError::Bind {
        addr: addr.to_string(),
        source,
    })
}

async fn run<F>(listener: TcpListener, router: Router, signal: F, hook: ShutdownHook)
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Err(err) = axum::serve(listener, router)
        .with_graceful_shutdown(signal)
        .await
    {
        tracing::error!("Server error: {}", err);
    }
    tracing::info!("Server stopped");
    hook.run().await;
}

impl Application {
    /// Address of the running listener, if any
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(ServerHandle::addr)
    }

    pub fn is_serving(&self) -> bool {
        self.server.is_some()
    }

    /// A server may start only when none is running and the container, if
    /// any, is still open. A serve loop closes the container when it exits.
    fn ensure_idle(&self) -> Result<()> {
        if let Some(addr) = self.local_addr() {
            return Err(AutowireError::AlreadyServing {
                addr: addr.to_string(),
            });
        }
        if self.container().is_some_and(Container::is_closed) {
            return Err(AutowireError::ContainerClosed);
        }
        Ok(())
    }

    fn timeout_for(&self, config: &ServerConfig) -> Duration {
        self.stop_timeout().unwrap_or(config.stop_timeout)
    }

    fn serving_parts(&self) -> Result<(Router, ShutdownHook)> {
        let router = self.router().ok_or(AutowireError::NotResolved)?.clone();
        Ok((router, self.web().shutdown_hook()))
    }

    /// Serve on a dedicated multi-thread runtime until a shutdown signal arrives.
    ///
    /// Must not be called from within an async context; use [`serve`](Self::serve) there.
    pub fn serve_blocking(&mut self, config: &ServerConfig) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.serve(config))
    }

    /// Serve on the current runtime until a shutdown signal arrives
    pub async fn serve(&mut self, config: &ServerConfig) -> Result<()> {
        self.ensure_idle()?;
        self.resolve().await?;
        let (router, hook) = self.serving_parts()?;

        let listener = bind(&config.address()).await?;
        tracing::info!("{} listening on {}", self.info().title, listener.local_addr()?);

        run(listener, router, shutdown_signal(), hook).await;
        Ok(())
    }

    /// Start serving as a task on the current runtime.
    ///
    /// Returns once the listener is bound.
    pub async fn start(&mut self, config: &ServerConfig) -> Result<SocketAddr> {
        self.ensure_idle()?;
        self.resolve().await?;
        let (router, hook) = self.serving_parts()?;

        let listener = bind(&config.address()).await?;
        let addr = listener.local_addr()?;
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(run(
            listener,
            router,
            async move {
                let _ = stopped.await;
            },
            hook,
        ));

        tracing::info!("{} listening on {}", self.info().title, addr);
        self.server = Some(ServerHandle::Task {
            addr,
            stop,
            task,
            timeout: self.timeout_for(config),
        });
        Ok(addr)
    }

    /// Start serving on a dedicated thread with its own runtime.
    ///
    /// Resolution, if still pending, happens on that runtime. Returns once the
    /// listener is bound; resolution and bind errors are returned here.
    pub fn start_background(&mut self, config: &ServerConfig) -> Result<SocketAddr> {
        self.ensure_idle()?;

        let prepared = match self.serving_parts() {
            Ok((router, hook)) => Prepared::Ready(router, hook),
            Err(_) => Prepared::Pending(self.resolve_inputs()),
        };
        let address = config.address();
        let (ready_tx, ready_rx) = mpsc::channel();
        let (done_tx, done) = mpsc::channel::<()>();
        let (stop, stopped) = oneshot::channel::<()>();

        let thread = thread::Builder::new()
            .name("axum-autowire-server".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        let _ = ready_tx.send(Err(AutowireError::Io(err)));
                        return;
                    }
                };

                runtime.block_on(async move {
                    let (router, hook, resolved) = match prepared {
                        Prepared::Ready(router, hook) => (router, hook, None),
                        Prepared::Pending(inputs) => match resolve_parts(inputs).await {
                            Ok(resolved) => (
                                resolved.router.clone(),
                                resolved.web.shutdown_hook(),
                                Some(resolved),
                            ),
                            Err(err) => {
                                let _ = ready_tx.send(Err(err));
                                return;
                            }
                        },
                    };

                    let listener = match bind(&address).await {
                        Ok(listener) => listener,
                        Err(err) => {
                            if resolved.is_some() {
                                hook.run().await;
                            }
                            let _ = ready_tx.send(Err(err));
                            return;
                        }
                    };
                    let addr = match listener.local_addr() {
                        Ok(addr) => addr,
                        Err(err) => {
                            let _ = ready_tx.send(Err(AutowireError::Io(err)));
                            return;
                        }
                    };

                    if ready_tx.send(Ok((addr, resolved))).is_err() {
                        return;
                    }
                    run(
                        listener,
                        router,
                        async move {
                            let _ = stopped.await;
                        },
                        hook,
                    )
                    .await;
                });

                let _ = done_tx.send(());
            })?;

        let (addr, resolved) = ready_rx.recv().map_err(|_| {
            AutowireError::Internal("server thread exited before binding".to_string())
        })??;
        if let Some(resolved) = resolved {
            self.commit(resolved);
        }

        tracing::info!("{} listening on {} (background)", self.info().title, addr);
        self.server = Some(ServerHandle::Thread {
            addr,
            stop,
            done,
            thread,
            timeout: self.timeout_for(config),
        });
        Ok(addr)
    }

    /// Signal the running server to stop.
    ///
    /// A background thread is waited for up to the stop timeout. A server
    /// started with [`start`](Self::start) runs on the caller's runtime, so
    /// this only signals it; use [`shutdown`](Self::shutdown) to wait.
    pub fn stop(&mut self) -> StopStatus {
        match self.server.take() {
            Some(handle) => handle.stop(),
            None => {
                tracing::debug!("Stop requested but no server is running");
                StopStatus::NotRunning
            }
        }
    }

    /// Stop the server, waiting up to the stop timeout, then close the container
    pub async fn shutdown(&mut self) -> StopStatus {
        let status = match self.server.take() {
            Some(handle) => handle.shutdown().await,
            None => StopStatus::NotRunning,
        };
        self.close().await;
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::ApiRouter;
    use crate::{Inject, Provider};
    use axum::routing::get;
    use std::time::Instant;

    fn app() -> Application {
        let router = ApiRouter::with_prefix("/ping")
            .route("/", get(|| async { "pong" }))
            .into_handle();
        Application::new("Ping", "1.0.0", [Provider::new("Ping").router(&router)])
    }

    /// Signals each request that reached the slow handler.
    struct Arrivals(mpsc::Sender<()>);

    async fn slow(Inject(arrivals): Inject<Arrivals>) -> &'static str {
        let _ = arrivals.0.send(());
        tokio::time::sleep(Duration::from_secs(10)).await;
        "late"
    }

    fn slow_app() -> (Application, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel();
        let router = ApiRouter::with_prefix("/slow")
            .route("/", get(slow))
            .into_handle();
        let provider = Provider::new("Slow").provide(Arrivals(tx)).router(&router);
        (Application::new("Slow", "1.0.0", [provider]), rx)
    }

    /// Issue a request from a detached thread; it stays open while the handler sleeps.
    fn hold_request(addr: SocketAddr) {
        thread::spawn(move || {
            let _ = reqwest::blocking::get(format!("http://{addr}/slow"));
        });
    }

    fn local() -> ServerConfig {
        ServerConfig::default().with_port(0)
    }

    #[test]
    fn test_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "127.0.0.1:8000");
        assert_eq!(config.stop_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_deserialises_partial_input() {
        let config: ServerConfig =
            serde_json::from_str(r#"{ "port": 9001, "stop_timeout": 0.5 }"#).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9001);
        assert_eq!(config.stop_timeout, Duration::from_millis(500));

        assert!(serde_json::from_str::<ServerConfig>(r#"{ "stop_timeout": -1 }"#).is_err());
    }

    #[test]
    fn test_stop_without_server() {
        let mut app = app();
        assert_eq!(app.stop(), StopStatus::NotRunning);
        assert_eq!(app.stop(), StopStatus::NotRunning);
    }

    #[tokio::test]
    async fn test_start_then_shutdown() {
        let mut app = app();
        let addr = app.start(&local()).await.unwrap();

        assert_ne!(addr.port(), 0);
        assert_eq!(app.local_addr(), Some(addr));
        assert!(matches!(
            app.start(&local()).await,
            Err(AutowireError::AlreadyServing { .. })
        ));

        assert_eq!(app.shutdown().await, StopStatus::Stopped);
        assert!(!app.is_serving());
        assert!(app.container().unwrap().is_closed());
    }

    #[tokio::test]
    async fn test_start_reports_bind_errors() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();
        let mut app = app();

        let err = app.start(&local().with_port(port)).await.unwrap_err();

        assert!(matches!(err, AutowireError::Bind { .. }));
        assert!(!app.is_serving());
    }

    #[tokio::test]
    async fn test_restart_after_shutdown_is_rejected() {
        let mut app = app();
        app.start(&local()).await.unwrap();
        assert_eq!(app.shutdown().await, StopStatus::Stopped);

        assert!(matches!(
            app.start(&local()).await,
            Err(AutowireError::ContainerClosed)
        ));
        assert!(!app.is_serving());
    }

    #[test]
    fn test_background_restart_after_stop_is_rejected() {
        let mut app = app();
        app.start_background(&local()).unwrap();
        assert_eq!(app.stop(), StopStatus::Stopped);

        assert!(matches!(
            app.start_background(&local()),
            Err(AutowireError::ContainerClosed)
        ));
        assert!(!app.is_serving());
        assert_eq!(app.stop(), StopStatus::NotRunning);
    }

    #[test]
    fn test_background_stop_times_out_on_busy_request() {
        let (mut app, arrivals) = slow_app();
        let addr = app
            .start_background(&local().with_stop_timeout(Duration::from_millis(300)))
            .unwrap();

        hold_request(addr);
        arrivals.recv_timeout(Duration::from_secs(5)).unwrap();

        let started = Instant::now();
        assert_eq!(app.stop(), StopStatus::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!app.is_serving());
    }

    #[tokio::test]
    async fn test_task_shutdown_times_out_and_aborts() {
        let (mut app, arrivals) = slow_app();
        let addr = app
            .start(&local().with_stop_timeout(Duration::from_millis(300)))
            .await
            .unwrap();

        hold_request(addr);
        tokio::task::spawn_blocking(move || arrivals.recv_timeout(Duration::from_secs(5)))
            .await
            .unwrap()
            .unwrap();

        let started = Instant::now();
        assert_eq!(app.shutdown().await, StopStatus::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!app.is_serving());
        assert!(app.container().unwrap().is_closed());
    }

    #[test]
    fn test_background_thread_stops() {
        let mut app = app();
        let addr = app.start_background(&local()).unwrap();

        assert!(app.is_resolved());
        assert_eq!(app.local_addr(), Some(addr));
        assert_eq!(app.stop(), StopStatus::Stopped);
        assert!(app.container().unwrap().is_closed());
    }
}
