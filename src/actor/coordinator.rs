//! Actor Coordinator - Wires up the Live Reload Actor System
//!
//! `LiveReload` is the service value owning every component of the loop:
//! - `new` binds the reload endpoint and subscribes the watcher
//! - `run` starts all tasks and returns once every one of them has stopped
//! - `start` does the same on a dedicated runtime thread
//! - cancelling the token (or `LiveReloadHandle::shutdown`) stops everything
//! - any task ending on its own, panics included, cancels the token too

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle as TaskHandle;
use tokio_util::sync::CancellationToken;

use super::build::BuildActor;
use super::fs::{FsActor, describe_roots};
use super::messages::WatchEvent;
use super::ws::WsActor;
use crate::config::SiteConfig;
use crate::reload::queue::NotificationQueue;
use crate::reload::registry::ConnectionRegistry;
use crate::reload::server::ReloadServer;

/// Fired events waiting for the BuildActor, which coalesces whatever piled
/// up while it was building.
const TRIGGER_BUFFER: usize = 64;

/// Live reload service - wires up and runs the actor system.
pub struct LiveReload {
    fs: FsActor,
    build: BuildActor,
    ws: WsActor,
    server: ReloadServer,
    registry: Arc<ConnectionRegistry>,
    token: CancellationToken,
}

impl LiveReload {
    /// Bind the reload endpoint and start watching (events buffer until `run`).
    pub fn new(config: &SiteConfig) -> Result<Self> {
        let server = ReloadServer::bind(config.serve.interface, config.reload.port)
            .context("failed to bind live reload endpoint")?;

        let (trigger_tx, trigger_rx) = mpsc::channel::<WatchEvent>(TRIGGER_BUFFER);
        let (notify_tx, notify_rx) = NotificationQueue::new(config.reload.queue_capacity);
        let registry = Arc::new(ConnectionRegistry::new());

        let fs = FsActor::new(&config.reload, trigger_tx).context("failed to start file watcher")?;
        let build = BuildActor::new(
            trigger_rx,
            config.build.clone(),
            config.get_root().to_path_buf(),
            notify_tx,
        );
        let ws = WsActor::new(notify_rx, Arc::clone(&registry));

        crate::debug!("watch"; "watching {}", describe_roots(&config.reload.watch));

        Ok(Self {
            fs,
            build,
            ws,
            server,
            registry,
            token: CancellationToken::new(),
        })
    }

    /// Address of the WebSocket endpoint.
    pub fn addr(&self) -> SocketAddr {
        self.server.addr()
    }

    /// Token that stops the whole service when cancelled.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    #[cfg(test)]
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Run every component until the token is cancelled or one of them stops.
    ///
    /// Returns only after all tasks and the acceptor have stopped.
    pub async fn run(self) -> Result<()> {
        let Self {
            fs,
            build,
            ws,
            server,
            registry,
            token,
        } = self;

        crate::debug!("actor"; "start");

        let fs_handle = spawn_linked(&token, fs.run(token.clone()));
        let build_handle = spawn_linked(&token, build.run(token.clone()));
        let ws_handle = spawn_linked(&token, ws.run(token.clone()));

        let acceptor = {
            let token = token.clone();
            let guard = token.clone().drop_guard();
            tokio::task::spawn_blocking(move || {
                let _guard = guard;
                server.run(&registry, &token);
            })
        };

        let results = [
            fs_handle.await,
            build_handle.await,
            ws_handle.await,
            acceptor.await,
        ];

        crate::debug!("actor"; "stopped");

        for result in results {
            result.context("live reload task failed")?;
        }
        Ok(())
    }

    /// Run on a dedicated thread with its own tokio runtime.
    pub fn start(self) -> Result<LiveReloadHandle> {
        let token = self.token();
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("kittens-reload")
            .enable_all()
            .build()
            .context("failed to create tokio runtime")?;

        let thread = thread::Builder::new()
            .name("kittens-reload".into())
            .spawn(move || {
                if let Err(e) = rt.block_on(self.run()) {
                    crate::log!("error"; "live reload: {:#}", e);
                }
            })
            .context("failed to spawn live reload thread")?;

        Ok(LiveReloadHandle { token, thread })
    }
}

/// Spawn a task that cancels `token` when it ends, however it ends.
fn spawn_linked<F>(token: &CancellationToken, task: F) -> TaskHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let guard = token.clone().drop_guard();
    tokio::spawn(async move {
        let _guard = guard;
        task.await;
    })
}

/// Handle to a service started with `LiveReload::start`
pub struct LiveReloadHandle {
    token: CancellationToken,
    thread: JoinHandle<()>,
}

impl LiveReloadHandle {
    /// Ask every task to stop without waiting.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the runtime thread to exit.
    pub fn join(self) {
        if self.thread.join().is_err() {
            crate::log!("error"; "live reload thread panicked");
        }
    }

    /// Cancel the service and wait for every task to stop.
    pub fn shutdown(self) {
        self.cancel();
        self.join();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::reload::message::NotificationMessage;
    use crate::reload::registry::testing::{Behavior, MockSink};
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;
    use tempfile::TempDir;

    fn make_config(root: &std::path::Path) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.root = root.to_path_buf();
        config.serve.interface = IpAddr::V4(Ipv4Addr::LOCALHOST);
        config.reload.port = 0;
        config.reload.watch = vec![root.join("web")];
        config.reload.debounce_ms = 150;
        config.build.command = vec!["sh".into(), "-c".into(), "echo x >> count".into()];
        config
    }

    async fn wait_for<F: Fn() -> bool>(cond: F) -> bool {
        for _ in 0..200 {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        false
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_burst_builds_once_and_notifies_everyone() {
        let temp = TempDir::new().unwrap();
        let web = temp.path().join("web");
        std::fs::create_dir_all(&web).unwrap();
        let styles = web.join("styles.css");
        std::fs::write(&styles, "body {}").unwrap();

        let config = make_config(temp.path());
        let service = LiveReload::new(&config).unwrap();
        let registry = service.registry();
        let token = service.token();

        let sinks: Vec<_> = (0..2).map(|_| MockSink::new(Behavior::Ok)).collect();
        let received: Vec<_> = sinks.iter().map(|s| Arc::clone(&s.received)).collect();
        for sink in sinks {
            registry.register(Box::new(sink)).unwrap();
        }

        let handle = tokio::spawn(service.run());
        // Let the watcher settle before writing.
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::write(&styles, "body { color: red }").unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        std::fs::write(&styles, "body { color: blue }").unwrap();

        let delivered = wait_for(|| received.iter().all(|r| !r.lock().is_empty())).await;
        assert!(delivered, "no notification delivered");

        // Nothing else arrives after the window
        tokio::time::sleep(Duration::from_millis(500)).await;

        let count = std::fs::read_to_string(temp.path().join("count")).unwrap();
        assert_eq!(count.lines().count(), 1);

        let first = received[0].lock().clone();
        let second = received[1].lock().clone();
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);

        // Some platforms report the canonical path.
        let canonical = std::fs::canonicalize(&styles).unwrap();
        let expected: Vec<_> = [styles.as_path(), canonical.as_path()]
            .into_iter()
            .map(|p| NotificationMessage::file_modified(p).to_json().unwrap())
            .collect();
        assert!(expected.contains(&first[0]), "unexpected {}", first[0]);

        token.cancel();
        handle.await.unwrap().unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_build_output_under_watch_root_builds_once() {
        let temp = TempDir::new().unwrap();
        let web = temp.path().join("web");
        std::fs::create_dir_all(web.join("static/css")).unwrap();
        let source = web.join("styles.css");
        std::fs::write(&source, "body {}").unwrap();

        let mut config = make_config(temp.path());
        config.build.command = vec![
            "sh".into(),
            "-c".into(),
            "echo x >> count && cp web/styles.css web/static/css/styles.css".into(),
        ];
        config.reload.ignore = vec![web.join("static")];

        let service = LiveReload::new(&config).unwrap();
        let token = service.token();
        let handle = tokio::spawn(service.run());
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::write(&source, "body { color: red }").unwrap();

        let count_path = temp.path().join("count");
        assert!(wait_for(|| count_path.exists()).await, "build never ran");
        // Several debounce windows: a rebuild loop would have fired again.
        tokio::time::sleep(Duration::from_millis(800)).await;

        let count = std::fs::read_to_string(&count_path).unwrap();
        assert_eq!(count.lines().count(), 1);
        assert!(web.join("static/css/styles.css").exists());

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_linked_task_end_cancels_token() {
        let token = CancellationToken::new();
        let handle = spawn_linked(&token, async {});
        handle.await.unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_linked_task_panic_cancels_token() {
        let token = CancellationToken::new();
        let waiter = token.clone();
        let sibling = spawn_linked(&token, async move { waiter.cancelled().await });
        let failing = spawn_linked(&token, async { panic!("task exploded") });

        assert!(failing.await.is_err());
        assert!(token.is_cancelled());
        let joined = tokio::time::timeout(Duration::from_secs(1), sibling).await;
        assert!(joined.is_ok(), "sibling kept running");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_joins_everything() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("web")).unwrap();

        let config = make_config(temp.path());
        let service = LiveReload::new(&config).unwrap();
        let token = service.token();
        let handle = tokio::spawn(service.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        let joined = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(joined.is_ok(), "service did not stop");
    }

    #[test]
    fn test_start_then_shutdown() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("web")).unwrap();

        let mut config = make_config(temp.path());
        config.build.enable = false;
        let service = LiveReload::new(&config).unwrap();
        let addr = service.addr();

        let handle = service.start().unwrap();
        let (mut client, response) = tungstenite::connect(format!("ws://{}/ws", addr)).unwrap();
        assert_eq!(response.status().as_u16(), 101);
        assert!(client.read().unwrap().is_text());

        handle.shutdown();

        // Closed by the broadcaster, or dropped with the registry
        if let tungstenite::stream::MaybeTlsStream::Plain(stream) = client.get_ref() {
            stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        }
        match client.read() {
            Ok(message) => assert!(message.is_close(), "unexpected {message:?}"),
            Err(_) => {}
        }
    }
}
