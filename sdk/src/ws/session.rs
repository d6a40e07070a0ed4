//! Realtime session.
//!
//! A [`RealtimeSession`] owns one push connection for as long as the view
//! that started it is alive. A single driver task connects, subscribes,
//! feeds messages to the [`EventRouter`] one at a time and reconnects on
//! close until the retry budget runs out.

use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::config::WsConfig;
use super::error::WsError;
use super::messages::ClientMessage;
use super::state::{CloseDecision, ConnectionMachine, ConnectionState, ConnectionStatus};
use crate::metrics::SyncMetrics;
use crate::notify::Notifier;
use crate::router::EventRouter;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// How one connection cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleEnd {
    /// Closed by the server, the network or a failed connect.
    Closed,
    /// Closed on request.
    Shutdown,
}

/// Handle to a running push connection.
#[derive(Debug)]
pub struct RealtimeSession {
    config: WsConfig,
    status: watch::Receiver<ConnectionStatus>,
    shutdown: watch::Sender<bool>,
    metrics: Arc<SyncMetrics>,
    task: Option<JoinHandle<()>>,
}

impl RealtimeSession {
    /// Validates `config` and spawns the connection driver.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn start(
        config: WsConfig,
        router: Arc<EventRouter>,
        notifier: Notifier,
    ) -> Result<Self, WsError> {
        config.validate()?;

        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let metrics = router.cache().metrics();

        let driver = Driver {
            machine: ConnectionMachine::new(
                config.max_reconnect_attempts,
                config.reconnect_delay,
            ),
            config: config.clone(),
            router,
            notifier,
            status: status_tx,
            metrics: Arc::clone(&metrics),
        };
        let task = tokio::spawn(driver.run(shutdown_rx));

        Ok(Self {
            config,
            status: status_rx,
            shutdown: shutdown_tx,
            metrics,
            task: Some(task),
        })
    }

    /// Returns the session configuration.
    #[must_use]
    pub fn config(&self) -> &WsConfig {
        &self.config
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.status().state
    }

    /// Returns true if the connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Returns consecutive closes since the last successful open.
    #[must_use]
    pub fn connection_attempts(&self) -> u32 {
        self.status().attempts
    }

    /// Returns a receiver that observes every status change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Returns the shared metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<SyncMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Returns true once the driver has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Closes the connection and waits for the driver to stop.
    ///
    /// A pending reconnect wait is cancelled.
    pub async fn close(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "realtime driver ended abnormally");
            }
        }
    }
}

impl Drop for RealtimeSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Resolves once shutdown is requested or the session handle is gone.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

struct Driver {
    config: WsConfig,
    machine: ConnectionMachine,
    router: Arc<EventRouter>,
    notifier: Notifier,
    status: watch::Sender<ConnectionStatus>,
    metrics: Arc<SyncMetrics>,
}

impl Driver {
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            match self.machine.begin_connect() {
                Ok(status) => self.publish(status),
                Err(e) => {
                    tracing::warn!(error = %e, "realtime driver stopping");
                    break;
                }
            }

            if self.cycle(&mut shutdown).await == CycleEnd::Shutdown {
                break;
            }

            match self.machine.closed() {
                CloseDecision::Reconnect { attempt, delay } => {
                    self.metrics.record_reconnect();
                    self.publish(self.machine.status());
                    self.notifier.warn(format!(
                        "Realtime connection lost, reconnecting ({}/{})",
                        attempt, self.config.max_reconnect_attempts
                    ));

                    tokio::select! {
                        _ = shutdown_requested(&mut shutdown) => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                CloseDecision::GiveUp { attempts } => {
                    self.publish(self.machine.status());
                    self.notifier.error(format!(
                        "Realtime updates unavailable after {} attempts",
                        attempts
                    ));
                    return;
                }
            }
        }

        let status = self.machine.shutdown();
        self.publish(status);
        tracing::info!(url = %self.config.url, "realtime session closed");
    }

    /// Runs one connect-subscribe-read cycle.
    async fn cycle(&mut self, shutdown: &mut watch::Receiver<bool>) -> CycleEnd {
        let url = self.config.connection_url();
        let connected = tokio::select! {
            _ = shutdown_requested(shutdown) => return CycleEnd::Shutdown,
            result = tokio_tungstenite::connect_async(url.as_str()) => result,
        };

        let ws_stream = match connected {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                self.errored(&WsError::Connection(e.to_string()));
                return CycleEnd::Closed;
            }
        };

        let (mut sink, mut source) = ws_stream.split();
        let status = self.machine.opened();
        self.publish(status);
        tracing::info!(url = %self.config.url, "realtime connection open");

        if let Err(e) = self.subscribe_all(&mut sink).await {
            self.errored(&e);
            return CycleEnd::Closed;
        }

        loop {
            tokio::select! {
                _ = shutdown_requested(shutdown) => {
                    let _ = sink.send(Message::Close(None)).await;
                    return CycleEnd::Shutdown;
                }
                next = source.next() => match next {
                    Some(Ok(Message::Text(text))) => {
                        self.router.route(text.as_str()).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!(?frame, "server closed realtime connection");
                        return CycleEnd::Closed;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        self.errored(&WsError::from(e));
                        return CycleEnd::Closed;
                    }
                    None => return CycleEnd::Closed,
                }
            }
        }
    }

    /// Sends one subscribe message per configured event.
    async fn subscribe_all(&self, sink: &mut WsSink) -> Result<(), WsError> {
        for event in &self.config.events {
            let msg = ClientMessage::subscribe(event.as_str());
            let json =
                serde_json::to_string(&msg).map_err(|e| WsError::Serialization(e.to_string()))?;
            sink.send(Message::Text(json.into()))
                .await
                .map_err(|e| WsError::SendFailed(e.to_string()))?;
        }
        tracing::debug!(count = self.config.events.len(), "subscribed to events");
        Ok(())
    }

    /// Surfaces a transport error. The following close decides on retry.
    fn errored(&mut self, err: &WsError) {
        if self.machine.errored() {
            self.notifier
                .error(format!("Realtime connection error: {}", err));
        }
    }

    fn publish(&self, status: ConnectionStatus) {
        tracing::debug!(state = %status.state, attempts = status.attempts, "connection status");
        self.status.send_replace(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryFetcher, QueryCache, QueryFetcher};
    use std::time::Duration;

    fn router() -> Arc<EventRouter> {
        let fetcher: Arc<dyn QueryFetcher> = Arc::new(MemoryFetcher::new());
        Arc::new(EventRouter::new(Arc::new(QueryCache::new(fetcher))))
    }

    #[tokio::test]
    async fn test_session_invalid_config() {
        let result = RealtimeSession::start(WsConfig::new(""), router(), Notifier::default());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_session_unreachable_server_fails_after_budget() {
        let config = WsConfig::new("ws://127.0.0.1:9/ws")
            .with_reconnect_delay(Duration::from_millis(5))
            .with_max_reconnect_attempts(2);
        let notifier = Notifier::default();
        let mut notices = notifier.subscribe();
        let session = RealtimeSession::start(config, router(), notifier).expect("session");

        let mut status = session.watch();
        let failed = tokio::time::timeout(
            Duration::from_secs(5),
            status.wait_for(ConnectionStatus::is_failed),
        )
        .await
        .is_ok();
        assert!(failed);

        assert_eq!(session.connection_attempts(), 2);
        assert!(!session.is_connected());
        assert_eq!(session.metrics().reconnects(), 1);

        let mut last = None;
        while let Ok(notice) = notices.try_recv() {
            last = Some(notice);
        }
        let last = last.expect("notice");
        assert!(last.message.contains("unavailable after 2 attempts"));
        session.close().await;
    }

    #[tokio::test]
    async fn test_session_close_cancels_reconnect_wait() {
        let config = WsConfig::new("ws://127.0.0.1:9/ws")
            .with_reconnect_delay(Duration::from_secs(3600));
        let session = RealtimeSession::start(config, router(), Notifier::default())
            .expect("session");

        let mut status = session.watch();
        let waiting = tokio::time::timeout(
            Duration::from_secs(5),
            status.wait_for(|s| s.state == ConnectionState::Reconnecting),
        )
        .await
        .is_ok();
        assert!(waiting);

        let closed = tokio::time::timeout(Duration::from_secs(1), session.close()).await;
        assert!(closed.is_ok());
    }
}
