mod listener;

pub use listener::{Listener, State};

use crate::error::TransportError;
use crate::memory::RegisterTable;
use crate::net::{Transport, rtu, tcp};

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_serial::SerialStream;

/// Owns the TCP and RTU listeners serving one shared register table.
///
/// The listeners are independent: a failed start of one never affects the
/// other. All serve tasks are aborted when the manager is dropped.
pub struct TransportManager {
    table: Arc<RegisterTable>,
    tcp: Listener,
    rtu: Listener,
}

impl TransportManager {
    pub fn new(table: Arc<RegisterTable>) -> Self {
        Self {
            table,
            tcp: Listener::new(Transport::Tcp),
            rtu: Listener::new(Transport::Rtu),
        }
    }

    fn listener(&self, transport: Transport) -> &Listener {
        match transport {
            Transport::Tcp => &self.tcp,
            Transport::Rtu => &self.rtu,
        }
    }

    fn listener_mut(&mut self, transport: Transport) -> &mut Listener {
        match transport {
            Transport::Tcp => &mut self.tcp,
            Transport::Rtu => &mut self.rtu,
        }
    }

    pub fn state(&self, transport: Transport) -> State {
        self.listener(transport).state()
    }

    fn ensure_unstarted(&self, transport: Transport) -> Result<(), TransportError> {
        match self.state(transport) {
            State::Unstarted => Ok(()),
            _ => Err(TransportError::AlreadyStarted(transport)),
        }
    }

    fn record<T>(&mut self, transport: Transport, res: &Result<T, TransportError>) {
        if let Err(e) = res {
            tracing::error!("{} listener failed to start. [{}]", transport, e);
            self.listener_mut(transport).failed();
        }
    }

    /// Bind the TCP listener and start accepting connections. Returns the
    /// bound address, which differs from the configured one for port 0.
    pub async fn start_tcp(&mut self, config: &tcp::Config) -> Result<SocketAddr, TransportError> {
        self.ensure_unstarted(Transport::Tcp)?;
        let res = tcp::bind(config).await.and_then(|listener| {
            listener
                .local_addr()
                .map(|addr| (listener, addr))
                .map_err(|source| TransportError::TransportStart {
                    addr: format!("{}:{}", config.ip, config.port),
                    source,
                })
        });
        self.record(Transport::Tcp, &res);
        let (listener, addr) = res?;

        let (shutdown, closed) = watch::channel(false);
        let handle = tcp::spawn(listener, self.table.clone(), closed);
        self.tcp.listening(handle, Some(shutdown));
        tracing::info!("Modbus TCP server listening on {}", addr);
        Ok(addr)
    }

    /// Open the configured serial device and start serving RTU requests.
    pub fn start_rtu(&mut self, config: &rtu::Config) -> Result<(), TransportError> {
        self.ensure_unstarted(Transport::Rtu)?;
        let res = rtu::open(config);
        self.record(Transport::Rtu, &res);
        self.start_rtu_stream(&config.to_string(), res?)
    }

    /// Serve RTU requests on an already opened serial stream.
    pub fn start_rtu_stream(&mut self, name: &str, stream: SerialStream) -> Result<(), TransportError> {
        self.ensure_unstarted(Transport::Rtu)?;
        let handle = rtu::spawn(stream, self.table.clone());
        self.rtu.listening(handle, None);
        tracing::info!("Modbus RTU server listening on {}", name);
        Ok(())
    }

    /// Stop every listener. Safe to call repeatedly and after failed starts.
    pub async fn stop_all(&mut self) {
        self.tcp.stop().await;
        self.rtu.stop().await;
    }
}
