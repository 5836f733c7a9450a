// Crate
use crate::error::{ConfigError, TransportError};
use crate::memory::RegisterTable;
use crate::net::{Service, Transport};

// External
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_modbus::server::tcp::{Server as TcpServer, accept_tcp_connection};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// The interface to listen on.
    pub ip: String,

    /// The port to listen on.
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ip: String::from("0.0.0.0"),
            port: 502,
        }
    }
}

impl Config {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.ip, self.port);
        addr.parse().map_err(|_| ConfigError::InvalidSocketAddr(addr))
    }
}

pub(crate) async fn bind(config: &Config) -> Result<TcpListener, TransportError> {
    let addr = config.socket_addr()?;
    TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::TransportStart {
            addr: addr.to_string(),
            source,
        })
}

/// Connection stream that reads EOF once the listener is stopped, so the
/// per-connection tasks of the server end together with the listener.
struct Guarded {
    stream: TcpStream,
    closed: Option<Pin<Box<dyn Future<Output = ()> + Send>>>,
}

impl Guarded {
    fn new(stream: TcpStream, mut shutdown: watch::Receiver<bool>) -> Self {
        let closed = Box::pin(async move {
            // Also resolves when the sender is gone
            let _ = shutdown.wait_for(|stop| *stop).await;
        });
        Self {
            stream,
            closed: Some(closed),
        }
    }

    fn is_closed(&mut self, cx: &mut Context<'_>) -> bool {
        match self.closed.as_mut() {
            Some(closed) => {
                if closed.as_mut().poll(cx).is_ready() {
                    self.closed = None;
                    true
                } else {
                    false
                }
            }
            None => true,
        }
    }
}

impl Debug for Guarded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guarded")
            .field("stream", &self.stream)
            .field("closed", &self.closed.is_none())
            .finish()
    }
}

impl AsyncRead for Guarded {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.is_closed(cx) {
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for Guarded {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.is_closed(cx) {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

/// Serve the table on an already bound listener until the task is aborted or
/// accepting fails. Open connections are closed once `shutdown` turns true.
pub(crate) fn spawn(
    listener: TcpListener,
    table: Arc<RegisterTable>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<Result<(), anyhow::Error>> {
    let server = TcpServer::new(listener);
    tokio::task::spawn(async move {
        let new_service = |_socket_addr| Ok(Some(Service::new(Transport::Tcp, table.clone())));
        let on_connected = |stream: TcpStream, socket_addr: SocketAddr| {
            let shutdown = shutdown.clone();
            async move {
                tracing::debug!("TCP: Connection from {}", socket_addr);
                accept_tcp_connection(stream, socket_addr, new_service).map(|accepted| {
                    accepted.map(|(service, stream)| (service, Guarded::new(stream, shutdown)))
                })
            }
        };
        let on_process_error = |err| {
            tracing::warn!("TCP: Server processing failed. [{}]", err);
        };
        server
            .serve(&on_connected, on_process_error)
            .await
            .map_err(|e| {
                tracing::error!("TCP: Serving stopped. [{}]", e);
                anyhow!("{}", e)
            })
    })
}
