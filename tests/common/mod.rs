#![allow(dead_code)]

use std::{net::SocketAddr, time::Duration};

use futures_util::{SinkExt, StreamExt};
use rover_signal::{config::ServerConfig, server::{self, Health}, Frame};
use tokio::{net::TcpListener, net::TcpStream, sync::oneshot, time::timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long to wait before deciding nothing is coming.
pub const QUIET: Duration = Duration::from_millis(300);

pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start() -> TestServer {
        Self::start_with(ServerConfig::default()).await
    }

    pub async fn start_with(config: ServerConfig) -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(server::serve(listener, config, async {
            let _ = rx.await;
        }));
        TestServer {
            addr,
            shutdown: Some(tx),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn health(&self) -> Health {
        reqwest::get(self.url("/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    /// Wait until the relay has registered exactly `n` connections.
    pub async fn wait_for_connections(&self, n: usize) {
        timeout(Duration::from_secs(5), async {
            while self.health().await.connections != n {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("relay never reached {} connections", n));
    }

    pub async fn connect(&self) -> Socket {
        let (socket, _) = connect_async(format!("ws://{}/signal", self.addr))
            .await
            .unwrap();
        socket
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub async fn send(socket: &mut Socket, text: &str) {
    socket.send(Message::text(text)).await.unwrap();
}

/// Next signaling frame, or `None` if nothing arrives within [`QUIET`].
pub async fn recv(socket: &mut Socket) -> Option<Frame> {
    loop {
        match timeout(QUIET, socket.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return Some(Frame::parse(text.as_str()).unwrap()),
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            Ok(Some(Ok(other))) => panic!("unexpected message: {:?}", other),
            Ok(Some(Err(e))) => panic!("socket error: {}", e),
            Ok(None) | Err(_) => return None,
        }
    }
}
