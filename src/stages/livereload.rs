// src/stages/livereload.rs

//! Minimal LiveReload-protocol server over WebSocket.
//!
//! Two threads: one accepts browser connections and greets them with the
//! protocol's `hello`, the other broadcasts `reload` commands. Connections
//! that fail a send are dropped.

use std::fmt;
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{debug, info, warn};
use tungstenite::WebSocket;

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

const PROTOCOL: &str = "http://livereload.com/protocols/official-7";

/// Cheap, cloneable sender of reload requests.
#[derive(Clone)]
pub struct LiveReloadHandle {
    tx: Sender<String>,
    port: u16,
}

impl fmt::Debug for LiveReloadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveReloadHandle")
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl LiveReloadHandle {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Ask every connected browser to reload `path`.
    pub fn reload(&self, path: &str) {
        let msg = json!({
            "command": "reload",
            "path": path,
            "liveCSS": true,
        });
        if self.tx.send(msg.to_string()).is_err() {
            debug!("live-reload broadcaster is gone");
        }
    }
}

/// Bind `127.0.0.1:port` (0 picks a free port) and start both threads.
pub fn start(port: u16) -> Result<LiveReloadHandle> {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .with_context(|| format!("binding live-reload port {port}"))?;
    let port = listener.local_addr()?.port();

    let clients: Clients = Arc::new(Mutex::new(Vec::new()));
    spawn_accept_thread(listener, Arc::clone(&clients))?;
    let tx = spawn_broadcast_thread(clients)?;

    info!(port, "live-reload server listening");
    Ok(LiveReloadHandle { tx, port })
}

fn lock(clients: &Clients) -> MutexGuard<'_, Vec<WebSocket<TcpStream>>> {
    clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn hello() -> String {
    json!({
        "command": "hello",
        "protocols": [PROTOCOL],
        "serverName": "assetdag",
    })
    .to_string()
}

fn spawn_accept_thread(server: TcpListener, clients: Clients) -> Result<()> {
    thread::Builder::new()
        .name("livereload-accept".into())
        .spawn(move || {
            for stream in server.incoming() {
                let stream = match stream {
                    Ok(s) => s,
                    Err(err) => {
                        warn!(error = %err, "live-reload accept failed");
                        continue;
                    }
                };
                match tungstenite::accept(stream) {
                    Ok(mut socket) => {
                        if socket.send(hello().into()).is_ok() {
                            debug!("live-reload client connected");
                            lock(&clients).push(socket);
                        }
                    }
                    Err(err) => debug!(error = %err, "live-reload handshake failed"),
                }
            }
        })
        .context("spawning live-reload accept thread")?;
    Ok(())
}

fn spawn_broadcast_thread(clients: Clients) -> Result<Sender<String>> {
    let (tx, rx) = mpsc::channel::<String>();

    thread::Builder::new()
        .name("livereload-broadcast".into())
        .spawn(move || {
            while let Ok(msg) = rx.recv() {
                let mut clients = lock(&clients);
                let before = clients.len();
                clients.retain_mut(|socket| socket.send(msg.as_str().into()).is_ok());
                debug!(
                    sent = clients.len(),
                    dropped = before - clients.len(),
                    "broadcast live-reload message"
                );
            }
        })
        .context("spawning live-reload broadcast thread")?;

    Ok(tx)
}
