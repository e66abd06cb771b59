//! Crashline production server.
//!
//! Wraps [`crashline_core`]'s Sans-IO round engine with framed TCP and a
//! single-owner tokio runtime.
//!
//! # Architecture
//!
//! [`ServerDriver`] is pure logic: events in, actions out. [`serve`] runs
//! one actor task that owns the driver and `select!`s over three sources:
//! new connections, an inbox fed by per-connection reader tasks, and a
//! fixed-interval ticker. Every mutation of players and rounds therefore
//! happens on that one task, one event at a time.
//!
//! Outbound frames go to per-connection writer tasks through bounded
//! queues. The actor only ever `try_send`s, so a slow client is dropped and
//! unregistered instead of stalling the tick for everyone else.
//!
//! # Components
//!
//! - [`ServerDriver`]: action-based router (pure logic, no I/O)
//! - [`SessionRegistry`]: sessions, players, bots
//! - [`serve`] / [`Server`]: runtime executing driver actions
//! - [`transport`]: frame reader/writer and the [`Acceptor`] seam
//! - [`SystemEnv`]: production environment (tokio clock, OS RNG)

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod driver;
mod error;
mod registry;
mod server_error;
mod system_env;
#[cfg(test)]
mod test_env;
pub mod transport;

use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    net::SocketAddr,
    time::Duration,
};

use bytes::Bytes;
use crashline_core::Environment;
use crashline_proto::Frame;
pub use driver::{DriverConfig, LogLevel, ServerAction, ServerDriver, ServerEvent};
pub use error::ServerError;
pub use registry::{LoginError, SessionInfo, SessionRegistry};
pub use server_error::DriverError;
pub use system_env::SystemEnv;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
    time::MissedTickBehavior,
};
pub use transport::Acceptor;

/// Capacity of the actor inbox shared by all reader tasks.
const INBOX_CAPACITY: usize = 1024;

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (e.g., "0.0.0.0:9933")
    pub bind_address: String,
    /// Round clock tick interval
    pub tick_interval: Duration,
    /// Frames buffered per connection before it counts as slow
    pub outbound_queue: usize,
    /// Longest a single socket write may take
    pub write_timeout: Duration,
    /// Driver configuration
    pub driver: DriverConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9933".to_string(),
            tick_interval: Duration::from_millis(100),
            outbound_queue: 256,
            write_timeout: Duration::from_secs(2),
            driver: DriverConfig::default(),
        }
    }
}

/// Production Crashline server.
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
}

impl Server {
    /// Validate configuration and bind the listener.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.driver.engine.validate()?;
        if config.tick_interval.is_zero() || config.outbound_queue == 0 {
            return Err(ServerError::Config("tick interval and outbound queue must be non-zero".to_string()));
        }
        let listener = transport::bind(&config.bind_address).await?;
        Ok(Self { listener, config })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Run until the process is killed.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Run until `shutdown` completes.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<(), ServerError> {
        serve(self.listener, SystemEnv::new(), self.config, shutdown).await
    }
}

/// Run the server actor on `acceptor` until `shutdown` completes.
///
/// On shutdown the ticker is dropped, so no further round tick is
/// scheduled, and every connection's queue is closed.
pub async fn serve<A, E>(
    acceptor: A,
    env: E,
    config: ServerConfig,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServerError>
where
    A: Acceptor,
    E: Environment,
{
    tracing::info!(addr = ?acceptor.local_addr().ok(), "server starting");

    let (inbox_tx, mut inbox) = mpsc::channel(INBOX_CAPACITY);
    let mut ticker = tokio::time::interval(config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut runtime = Runtime {
        driver: ServerDriver::new(env, config.driver.clone()),
        connections: HashMap::new(),
        inbox_tx,
        config,
        next_session: 1,
    };

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            () = &mut shutdown => break,
            accepted = acceptor.accept() => match accepted {
                Ok((stream, peer)) => runtime.open(stream, peer),
                Err(e) => tracing::error!(error = %e, "accept failed"),
            },
            Some(inbound) = inbox.recv() => runtime.handle(inbound),
            _ = ticker.tick() => runtime.dispatch(ServerEvent::Tick),
        }
    }

    runtime.shutdown();
    Ok(())
}

/// Messages from connection tasks to the actor.
#[derive(Debug)]
enum Inbound {
    Frame { session_id: u64, frame: Frame },
    Closed { session_id: u64, reason: String },
}

struct Connection {
    outbound: mpsc::Sender<Bytes>,
    reader: JoinHandle<()>,
}

/// Actor state: the driver plus the I/O handles it cannot own itself.
struct Runtime<E: Environment> {
    driver: ServerDriver<E>,
    connections: HashMap<u64, Connection>,
    inbox_tx: mpsc::Sender<Inbound>,
    config: ServerConfig,
    next_session: u64,
}

impl<E: Environment> Runtime<E> {
    fn open<S>(&mut self, stream: S, peer: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let session_id = self.next_session;
        self.next_session += 1;

        let (read_half, write_half) = tokio::io::split(stream);
        let (outbound, queue) = mpsc::channel(self.config.outbound_queue);
        tokio::spawn(write_loop(session_id, write_half, queue, self.config.write_timeout, self.inbox_tx.clone()));
        let reader = tokio::spawn(read_loop(session_id, read_half, self.inbox_tx.clone()));
        self.connections.insert(session_id, Connection { outbound, reader });

        tracing::debug!(session_id, %peer, "connection opened");
        self.dispatch(ServerEvent::ConnectionAccepted { session_id });
    }

    fn handle(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Frame { session_id, frame } => {
                if self.connections.contains_key(&session_id) {
                    self.dispatch(ServerEvent::FrameReceived { session_id, frame });
                }
            },
            Inbound::Closed { session_id, reason } => {
                if self.close(session_id) {
                    self.dispatch(ServerEvent::ConnectionClosed { session_id, reason });
                }
            },
        }
    }

    /// Feed `event` to the driver and execute the resulting actions,
    /// including closes discovered while sending.
    fn dispatch(&mut self, event: ServerEvent) {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            match self.driver.process_event(event) {
                Ok(actions) => {
                    for action in actions {
                        self.execute(action, &mut pending);
                    }
                },
                Err(e) => tracing::warn!(error = %e, "event dropped"),
            }
        }
    }

    fn execute(&mut self, action: ServerAction, pending: &mut VecDeque<ServerEvent>) {
        match action {
            ServerAction::SendToSession { session_id, frame } => match frame.to_bytes() {
                Ok(bytes) => self.send(session_id, bytes, pending),
                Err(e) => tracing::error!(session_id, error = %e, "failed to encode frame"),
            },
            ServerAction::Broadcast { frame } => match frame.to_bytes() {
                Ok(bytes) => {
                    let targets: Vec<u64> = self.driver.broadcast_sessions().collect();
                    for session_id in targets {
                        self.send(session_id, bytes.clone(), pending);
                    }
                },
                Err(e) => tracing::error!(error = %e, "failed to encode broadcast"),
            },
            ServerAction::CloseConnection { session_id, reason } => {
                tracing::info!(session_id, %reason, "closing connection");
                if self.close(session_id) {
                    pending.push_back(ServerEvent::ConnectionClosed { session_id, reason });
                }
            },
            ServerAction::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{message}"),
                LogLevel::Info => tracing::info!("{message}"),
                LogLevel::Warn => tracing::warn!("{message}"),
                LogLevel::Error => tracing::error!("{message}"),
            },
        }
    }

    fn send(&mut self, session_id: u64, bytes: Bytes, pending: &mut VecDeque<ServerEvent>) {
        let Some(connection) = self.connections.get(&session_id) else { return };
        if let Err(e) = connection.outbound.try_send(bytes) {
            let reason = match e {
                TrySendError::Full(_) => "outbound queue full",
                TrySendError::Closed(_) => "outbound queue closed",
            };
            tracing::warn!(session_id, reason, "dropping slow client");
            if self.close(session_id) {
                pending.push_back(ServerEvent::ConnectionClosed { session_id, reason: reason.to_string() });
            }
        }
    }

    /// Forget a connection. Dropping its queue sender lets the writer drain
    /// and shut the socket down.
    fn close(&mut self, session_id: u64) -> bool {
        match self.connections.remove(&session_id) {
            Some(connection) => {
                connection.reader.abort();
                true
            },
            None => false,
        }
    }

    fn shutdown(mut self) {
        let open = self.connections.len();
        for (_, connection) in self.connections.drain() {
            connection.reader.abort();
        }
        tracing::info!(open, round = self.driver.engine().round().id, "server stopped");
    }
}

async fn read_loop<R>(session_id: u64, mut reader: R, inbox: mpsc::Sender<Inbound>)
where
    R: AsyncRead + Unpin,
{
    let reason = loop {
        match transport::read_frame(&mut reader).await {
            Ok(Some(frame)) => {
                if inbox.send(Inbound::Frame { session_id, frame }).await.is_err() {
                    return;
                }
            },
            Ok(None) => break "peer closed".to_string(),
            Err(e) => break e.to_string(),
        }
    };
    let _ = inbox.send(Inbound::Closed { session_id, reason }).await;
}

async fn write_loop<W>(
    session_id: u64,
    mut writer: W,
    mut queue: mpsc::Receiver<Bytes>,
    write_timeout: Duration,
    inbox: mpsc::Sender<Inbound>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(bytes) = queue.recv().await {
        let reason = match tokio::time::timeout(write_timeout, transport::write_frame(&mut writer, &bytes)).await {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => format!("write failed: {e}"),
            Err(_) => "write timed out".to_string(),
        };
        let _ = inbox.send(Inbound::Closed { session_id, reason }).await;
        return;
    }
    let _ = writer.shutdown().await;
}
