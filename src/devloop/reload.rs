// src/devloop/reload.rs

//! Live-reload broadcast over websockets.
//!
//! Browsers connect to the reload port and receive a `"reload"` text message
//! whenever a rebuild completes. Connections are accepted on a dedicated
//! thread; broadcasting walks the client list and drops broken sockets.

use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info};
use tungstenite::WebSocket;

use crate::errors::{BuildpipeError, Result};

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

/// Broadcast hub for connected live-reload clients.
///
/// A disabled hub (from `--no-reload`) accepts nothing and broadcasts are
/// no-ops.
pub struct ReloadHub {
    clients: Option<Clients>,
}

impl std::fmt::Debug for ReloadHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadHub")
            .field("enabled", &self.clients.is_some())
            .finish()
    }
}

impl ReloadHub {
    pub fn disabled() -> Self {
        Self { clients: None }
    }

    /// Bind the reload port and start accepting websocket clients.
    pub fn start(port: u16) -> Result<Self> {
        let listener =
            TcpListener::bind(("127.0.0.1", port)).map_err(BuildpipeError::IoError)?;
        let clients: Clients = Arc::new(Mutex::new(Vec::new()));

        let accept_clients = Arc::clone(&clients);
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                match tungstenite::accept(stream) {
                    Ok(socket) => {
                        debug!("live-reload client connected");
                        if let Ok(mut clients) = accept_clients.lock() {
                            clients.push(socket);
                        }
                    }
                    Err(err) => debug!(error = %err, "websocket handshake failed"),
                }
            }
        });

        info!(port, "live-reload channel listening");
        Ok(Self {
            clients: Some(clients),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.clients.is_some()
    }

    /// Tell every connected client to reload.
    pub fn broadcast(&self) {
        let Some(clients) = &self.clients else { return };
        let Ok(mut clients) = clients.lock() else { return };

        let mut broken = Vec::new();
        for (i, socket) in clients.iter_mut().enumerate() {
            match socket.send("reload".into()) {
                Ok(()) => {}
                Err(tungstenite::error::Error::Io(e))
                    if e.kind() == std::io::ErrorKind::BrokenPipe =>
                {
                    broken.push(i);
                }
                Err(err) => error!(error = %err, "live-reload send failed"),
            }
        }
        for i in broken.into_iter().rev() {
            clients.remove(i);
        }
        debug!(clients = clients.len(), "reload broadcast");
    }
}
