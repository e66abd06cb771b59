//! Turmoil network adapters.
//!
//! [`SimListener`] lets the production runtime (`crashline_server::serve`)
//! accept from turmoil's simulated network, and [`SimClient`] speaks the
//! framed protocol over a simulated stream.

use std::{io, net::SocketAddr, time::Duration};

use crashline_proto::{ActionCode, Controller, ExtensionCall, Message, WireObject};
use crashline_server::{Acceptor, transport};
use turmoil::net::{TcpListener, TcpStream};

/// Turmoil listener usable as an [`Acceptor`].
pub struct SimListener(TcpListener);

impl SimListener {
    /// Bind on the current turmoil host.
    pub async fn bind(address: &str) -> io::Result<Self> {
        Ok(Self(TcpListener::bind(address).await?))
    }
}

impl Acceptor for SimListener {
    type Stream = TcpStream;

    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        self.0.accept().await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.0.local_addr()
    }
}

/// Protocol client over a turmoil stream.
pub struct SimClient {
    stream: TcpStream,
    timeout: Duration,
}

impl SimClient {
    /// Connect to `address` (e.g. `"server:9933"`).
    pub async fn connect(address: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(address).await?;
        Ok(Self { stream, timeout: Duration::from_secs(30) })
    }

    /// Send one message.
    pub async fn send(&mut self, message: &Message) -> io::Result<()> {
        let bytes = message
            .to_frame()
            .and_then(|frame| frame.to_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        transport::write_frame(&mut self.stream, &bytes).await
    }

    /// Receive one message, or `None` once the server closed the stream.
    pub async fn recv(&mut self) -> io::Result<Option<Message>> {
        let read = tokio::time::timeout(self.timeout, transport::read_frame(&mut self.stream))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "no frame before timeout"))?;
        let Some(frame) = read.map_err(io::Error::other)? else { return Ok(None) };

        let decoded = frame.root().map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let (root, _) = decoded.into_result().map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Message::from_object(&root).map(Some).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Receive until an extension message named `command` arrives and
    /// return its body.
    pub async fn recv_command(&mut self, command: &str) -> io::Result<WireObject> {
        loop {
            let Some(message) = self.recv().await? else {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, format!("closed before `{command}`")));
            };
            if message.payload.get_str("c") == Some(command) {
                return Ok(message.payload.get_object("p").cloned().unwrap_or_default());
            }
        }
    }

    /// Handshake and log in. Returns the login reply payload.
    pub async fn login(&mut self, username: &str) -> io::Result<WireObject> {
        self.send(&Message::new(ActionCode::Handshake, Controller::SYSTEM, WireObject::new())).await?;
        self.expect_action(ActionCode::Handshake).await?;

        let params = WireObject::new().with("un", username);
        self.send(&Message::new(ActionCode::Login, Controller::SYSTEM, params)).await?;
        Ok(self.expect_action(ActionCode::Login).await?.payload)
    }

    /// Call an extension command.
    pub async fn call(&mut self, command: &str, params: WireObject, request_id: Option<i64>) -> io::Result<()> {
        let call = ExtensionCall { command: command.to_string(), params, request_id };
        self.send(&call.into_message()).await
    }

    async fn expect_action(&mut self, action: ActionCode) -> io::Result<Message> {
        loop {
            match self.recv().await? {
                Some(message) if message.action_code() == Some(action) => return Ok(message),
                Some(_) => {},
                None => return Err(io::Error::new(io::ErrorKind::UnexpectedEof, format!("closed before {action:?}"))),
            }
        }
    }
}
