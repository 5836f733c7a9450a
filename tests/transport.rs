//! End-to-end tests of the listeners.
//!
//! A real Modbus client talks to the TCP listener, and on Linux to the RTU
//! listener through a pseudo terminal, while the simulator mutates the shared
//! table underneath.

use modbus_sim::error::TransportError;
use modbus_sim::instance::{State, TransportManager};
use modbus_sim::memory::{Bank, RegisterTable};
use modbus_sim::net::Transport;
use modbus_sim::net::tcp::Config as TcpConfig;
use modbus_sim::sim::Simulator;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_modbus::prelude::*;

const TIMEOUT: Duration = Duration::from_secs(5);

fn local() -> TcpConfig {
    TcpConfig {
        ip: String::from("127.0.0.1"),
        port: 0,
    }
}

async fn start_tcp(table: Arc<RegisterTable>) -> (TransportManager, SocketAddr) {
    let mut manager = TransportManager::new(table);
    let addr = manager.start_tcp(&local()).await.unwrap();
    (manager, addr)
}

#[tokio::test]
async fn test_tcp_reads_static_values() -> Result<(), Box<dyn std::error::Error>> {
    let table = Arc::new(RegisterTable::new());
    table.init(Bank::DiscreteInput, 0, 1)?;
    table.init(Bank::Coil, 1, 1)?;
    table.init(Bank::InputRegister, 0, 30000)?;
    table.init(Bank::InputRegister, 1, 40000)?;
    table.init(Bank::HoldingRegister, 0, 100)?;
    table.init(Bank::HoldingRegister, 1, 200)?;
    let (mut manager, addr) = start_tcp(table).await;

    let mut ctx = tcp::connect(addr).await?;
    assert_eq!(ctx.read_discrete_inputs(0, 2).await??, vec![true, false]);
    assert_eq!(ctx.read_coils(0, 2).await??, vec![false, true]);
    assert_eq!(ctx.read_input_registers(0, 3).await??, vec![30000, 40000, 0]);
    assert_eq!(ctx.read_holding_registers(0, 2).await??, vec![100, 200]);
    ctx.disconnect().await?;

    manager.stop_all().await;
    Ok(())
}

#[tokio::test]
async fn test_tcp_write_then_read() -> Result<(), Box<dyn std::error::Error>> {
    let table = Arc::new(RegisterTable::new());
    let (mut manager, addr) = start_tcp(table.clone()).await;

    let mut ctx = tcp::connect(addr).await?;
    ctx.write_single_register(2, 999).await??;
    ctx.write_multiple_registers(3, &[1, 2, 3]).await??;
    ctx.write_single_coil(4, true).await??;
    assert_eq!(ctx.read_holding_registers(2, 4).await??, vec![999, 1, 2, 3]);
    assert_eq!(ctx.read_coils(4, 1).await??, vec![true]);
    ctx.disconnect().await?;

    assert_eq!(table.read(Bank::HoldingRegister, 2), Ok(999));
    manager.stop_all().await;
    Ok(())
}

#[tokio::test]
async fn test_tcp_out_of_range_is_an_exception() -> Result<(), Box<dyn std::error::Error>> {
    let table = Arc::new(RegisterTable::with_capacity(100));
    let (mut manager, addr) = start_tcp(table).await;

    let mut ctx = tcp::connect(addr).await?;
    let res = ctx.read_holding_registers(99, 2).await?;
    assert_eq!(res, Err(ExceptionCode::IllegalDataAddress));

    // The connection is still usable
    assert_eq!(ctx.read_holding_registers(98, 2).await??, vec![0, 0]);
    ctx.disconnect().await?;

    manager.stop_all().await;
    Ok(())
}

#[tokio::test]
async fn test_tcp_observes_simulation() -> Result<(), Box<dyn std::error::Error>> {
    let table = Arc::new(RegisterTable::new());
    let mut simulator = Simulator::new(table.clone());
    simulator.load(Bank::HoldingRegister, 10, vec![0, 1, 1, 0])?;
    simulator.load(Bank::InputRegister, 2, vec![0, 10, 20, 30, 40])?;
    let (mut manager, addr) = start_tcp(table).await;

    let mut ctx = tcp::connect(addr).await?;
    assert_eq!(ctx.read_holding_registers(10, 1).await??, vec![0]);
    for _ in 0..5 {
        simulator.advance();
    }
    assert_eq!(ctx.read_holding_registers(10, 1).await??, vec![1]);
    assert_eq!(ctx.read_input_registers(2, 1).await??, vec![0]);

    // A client write lasts until the next tick
    ctx.write_single_register(10, 1234).await??;
    assert_eq!(ctx.read_holding_registers(10, 1).await??, vec![1234]);
    simulator.advance();
    assert_eq!(ctx.read_holding_registers(10, 1).await??, vec![1]);
    ctx.disconnect().await?;

    manager.stop_all().await;
    Ok(())
}

#[tokio::test]
async fn test_tcp_concurrent_clients() -> Result<(), Box<dyn std::error::Error>> {
    let table = Arc::new(RegisterTable::new());
    let (mut manager, addr) = start_tcp(table).await;

    let mut clients = Vec::new();
    for i in 0..4u16 {
        clients.push(tokio::spawn(async move {
            let mut ctx = tcp::connect(addr).await.unwrap();
            for v in 0..20u16 {
                ctx.write_single_register(i, v).await.unwrap().unwrap();
                let read = ctx.read_holding_registers(i, 1).await.unwrap().unwrap();
                assert_eq!(read, vec![v]);
            }
            ctx.disconnect().await.unwrap();
        }));
    }
    for client in clients {
        timeout(TIMEOUT, client).await??;
    }

    manager.stop_all().await;
    Ok(())
}

#[tokio::test]
async fn test_tcp_stop_ends_service() -> Result<(), Box<dyn std::error::Error>> {
    let table = Arc::new(RegisterTable::new());
    let (mut manager, addr) = start_tcp(table).await;

    let mut ctx = tcp::connect(addr).await?;
    assert_eq!(ctx.read_holding_registers(0, 1).await??, vec![0]);

    manager.stop_all().await;
    assert_eq!(manager.state(Transport::Tcp), State::Stopped);

    // Open connections are closed and new ones refused
    let res = timeout(TIMEOUT, ctx.read_holding_registers(0, 1)).await?;
    assert!(!matches!(res, Ok(Ok(_))));
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_tcp_bind_failure_is_reported() {
    let blocker = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut manager = TransportManager::new(Arc::new(RegisterTable::new()));

    let res = manager
        .start_tcp(&TcpConfig {
            ip: String::from("127.0.0.1"),
            port: blocker.local_addr().unwrap().port(),
        })
        .await;
    assert!(matches!(res, Err(TransportError::TransportStart { .. })));
    assert_eq!(manager.state(Transport::Tcp), State::Stopped);
    manager.stop_all().await;
}

#[cfg(target_os = "linux")]
mod rtu_over_pty {
    use super::{TIMEOUT, start_tcp};
    use modbus_sim::error::TransportError;
    use modbus_sim::instance::{State, TransportManager};
    use modbus_sim::memory::RegisterTable;
    use modbus_sim::net::Transport;
    use modbus_sim::net::rtu::Config as RtuConfig;
    use modbus_sim::net::tcp::Config as TcpConfig;
    use std::sync::Arc;
    use tokio::time::timeout;
    use tokio_modbus::prelude::*;
    use tokio_serial::{SerialPort, SerialStream};

    /// Open a pseudo terminal pair. Returns the master side for the client
    /// and a listener config pointing at the slave device.
    fn pty() -> (SerialStream, RtuConfig) {
        let (master, slave) = SerialStream::pair().expect("failed to open pseudo terminal");
        let path = slave.name().expect("pseudo terminal without name");
        // The listener opens the device itself
        drop(slave);
        let config = RtuConfig {
            path,
            baud_rate: 9600,
            timeout_s: 1,
            ..RtuConfig::default()
        };
        (master, config)
    }

    #[tokio::test]
    async fn test_rtu_and_tcp_share_table() -> Result<(), Box<dyn std::error::Error>> {
        let table = Arc::new(RegisterTable::new());
        let (mut manager, addr) = start_tcp(table).await;
        let (master, config) = pty();
        manager.start_rtu(&config)?;
        assert_eq!(manager.state(Transport::Rtu), State::Listening);

        let mut tcp_ctx = tcp::connect(addr).await?;
        let mut rtu_ctx = rtu::attach_slave(master, Slave(1));

        // TCP write, RTU read
        tcp_ctx.write_single_register(7, 4242).await??;
        let read = timeout(TIMEOUT, rtu_ctx.read_holding_registers(7, 1)).await???;
        assert_eq!(read, vec![4242]);

        // RTU write, TCP read
        timeout(TIMEOUT, rtu_ctx.write_single_coil(3, true)).await???;
        assert_eq!(tcp_ctx.read_coils(3, 1).await??, vec![true]);

        tcp_ctx.disconnect().await?;
        manager.stop_all().await;
        assert_eq!(manager.state(Transport::Rtu), State::Stopped);
        Ok(())
    }

    #[tokio::test]
    async fn test_rtu_starts_when_tcp_fails() -> Result<(), Box<dyn std::error::Error>> {
        let blocker = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let mut manager = TransportManager::new(Arc::new(RegisterTable::new()));

        let res = manager
            .start_tcp(&TcpConfig {
                ip: String::from("127.0.0.1"),
                port: blocker.local_addr()?.port(),
            })
            .await;
        assert!(matches!(res, Err(TransportError::TransportStart { .. })));

        let (_master, config) = pty();
        manager.start_rtu(&config)?;
        assert_eq!(manager.state(Transport::Tcp), State::Stopped);
        assert_eq!(manager.state(Transport::Rtu), State::Listening);

        manager.stop_all().await;
        Ok(())
    }
}
