//! End-to-end tests over loopback TCP.
//!
//! These run the real runtime: actor loop, reader and writer tasks, and the
//! frame transport. Rounds are shortened so a full cycle fits in a test.

use std::{net::SocketAddr, time::Duration};

use crashline_core::{BotConfig, CrashPoint, EngineConfig, Money};
use crashline_proto::{ActionCode, Controller, ExtensionCall, Message, WireObject};
use crashline_server::{DriverConfig, Server, ServerConfig, ServerError, transport};
use tokio::{net::TcpStream, sync::oneshot, task::JoinHandle};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn fast_config(crash_at: f64) -> ServerConfig {
    let engine = EngineConfig {
        ready_duration: Duration::from_millis(50),
        bet_duration: Duration::from_millis(400),
        settle_duration: Duration::from_millis(50),
        crash: CrashPoint::Fixed(crash_at),
        starting_balance: Money::from_major(100),
        bots: BotConfig { min_count: 0, max_count: 0, ..BotConfig::default() },
        ..EngineConfig::default()
    };
    ServerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        tick_interval: Duration::from_millis(10),
        driver: DriverConfig { engine, ..DriverConfig::default() },
        ..ServerConfig::default()
    }
}

struct Running {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), ServerError>>,
}

async fn start(config: ServerConfig) -> Running {
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(server.run_until(async {
        let _ = stopped.await;
    }));
    Running { addr, stop, task }
}

struct Client {
    stream: TcpStream,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        Self { stream: TcpStream::connect(addr).await.unwrap() }
    }

    async fn send(&mut self, message: &Message) {
        let bytes = message.to_frame().unwrap().to_bytes().unwrap();
        transport::write_frame(&mut self.stream, &bytes).await.unwrap();
    }

    async fn recv(&mut self) -> Message {
        let frame = tokio::time::timeout(RECV_TIMEOUT, transport::read_frame(&mut self.stream))
            .await
            .expect("timed out waiting for frame")
            .unwrap()
            .expect("server closed connection");
        let (root, _) = frame.root().unwrap().into_result().unwrap();
        Message::from_object(&root).unwrap()
    }

    /// Skip frames until an extension message named `command` arrives.
    async fn recv_command(&mut self, command: &str) -> WireObject {
        loop {
            let message = self.recv().await;
            if message.payload.get_str("c") == Some(command) {
                return message.payload.get_object("p").cloned().unwrap_or_default();
            }
        }
    }

    async fn login(&mut self, username: &str) -> WireObject {
        self.send(&Message::new(ActionCode::Handshake, Controller::SYSTEM, WireObject::new())).await;
        let handshake = self.recv().await;
        assert_eq!(handshake.action_code(), Some(ActionCode::Handshake));

        let params = WireObject::new().with("zn", "CRASHLINE_ZONE").with("un", username);
        self.send(&Message::new(ActionCode::Login, Controller::SYSTEM, params)).await;
        let reply = self.recv().await;
        assert_eq!(reply.action_code(), Some(ActionCode::Login));
        reply.payload
    }
}

fn call(command: &str, params: WireObject, request_id: i64) -> Message {
    ExtensionCall { command: command.to_string(), params, request_id: Some(request_id) }.into_message()
}

#[tokio::test]
async fn handshake_advertises_limits() {
    let running = start(fast_config(2.0)).await;
    let mut client = Client::connect(running.addr).await;

    client.send(&Message::new(ActionCode::Handshake, Controller::SYSTEM, WireObject::new())).await;
    let reply = client.recv().await;

    assert_eq!(reply.action_code(), Some(ActionCode::Handshake));
    assert_eq!(reply.payload.get_i64("ct"), Some(i64::from(i32::MAX)));
    assert_eq!(reply.payload.get_i64("ms"), Some(65535));
    assert_eq!(reply.payload.get_str("tk").map(str::len), Some(32));

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn login_is_followed_by_init() {
    let running = start(fast_config(2.0)).await;
    let mut client = Client::connect(running.addr).await;

    let reply = client.login("alice").await;
    assert_eq!(reply.get_i64("rs"), Some(0));
    assert_eq!(reply.get_str("un"), Some("alice"));

    let init = client.recv_command("init").await;
    assert_eq!(init.get_i64("code"), Some(200));
    assert_eq!(init.get_object("user").and_then(|u| u.get_f64("balance")), Some(100.0));

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn duplicate_username_is_refused() {
    let running = start(fast_config(2.0)).await;
    let mut first = Client::connect(running.addr).await;
    let mut second = Client::connect(running.addr).await;

    assert_eq!(first.login("bob").await.get_i64("rs"), Some(0));
    assert_eq!(second.login("bob").await.get_i64("rs"), Some(1));

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn heartbeat_is_echoed() {
    let running = start(fast_config(2.0)).await;
    let mut client = Client::connect(running.addr).await;

    client.send(&Message::new(ActionCode::PingPong, Controller::SYSTEM, WireObject::new())).await;
    let reply = client.recv().await;

    assert_eq!(reply.action_code(), Some(ActionCode::PingPong));
    assert!(reply.payload.is_empty());

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn bet_round_trip_through_full_cycle() {
    let running = start(fast_config(2.0)).await;
    let mut client = Client::connect(running.addr).await;
    client.login("carol").await;

    loop {
        let state = client.recv_command("changeState").await;
        if state.get_i64("newStateId") == Some(1) {
            break;
        }
    }

    let params = WireObject::new().with("bet", 10.0f64).with("betId", 1i32);
    client.send(&call("betHandler", params, 42)).await;

    let bet = loop {
        let message = client.recv().await;
        if message.payload.get_str("c") == Some("bet") {
            break message;
        }
    };
    assert_eq!(bet.payload.get_i64("r"), Some(42));
    let body = bet.payload.get_object("p").unwrap();
    assert_eq!(body.get_i64("code"), Some(200));
    assert_eq!(body.get_i64("betId"), Some(1));

    let balance = client.recv_command("newBalance").await;
    assert_eq!(balance.get_f64("newBalance"), Some(90.0));

    // A lone stake cannot cover any raise, so the round settles at 1.0.
    let crash = client.recv_command("crashX").await;
    assert_eq!(crash.get_f64("crashX"), Some(1.0));

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn bind_rejects_bad_address() {
    let config = ServerConfig { bind_address: "not an address".to_string(), ..ServerConfig::default() };

    let err = Server::bind(config).await.err().unwrap();

    assert!(matches!(err, ServerError::Config(_)));
}

#[tokio::test]
async fn bind_rejects_invalid_engine_config() {
    let mut config = fast_config(2.0);
    config.driver.engine.min_bet = Money::ZERO;

    let err = Server::bind(config).await.err().unwrap();

    assert!(matches!(err, ServerError::Config(_)));
}
