use crate::sim::Simulator;

use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Background task calling [`Simulator::advance`] once per period.
///
/// The first tick fires one period after spawning. Dropping the ticker stops
/// the task as well.
pub struct Ticker {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Simulator>,
}

impl Ticker {
    pub fn spawn(mut simulator: Simulator, period: Duration) -> Self {
        let (stop, mut stopped) = oneshot::channel::<()>();
        let handle = tokio::task::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!(
                "Simulation ticker started with {} schedules every {:?}",
                simulator.len(),
                period
            );
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = interval.tick() => simulator.advance(),
                }
            }
            tracing::debug!("Simulation ticker stopped");
            simulator
        });
        Self {
            stop: Some(stop),
            handle,
        }
    }

    /// Stop ticking and hand the simulator back.
    pub async fn stop(mut self) -> Option<Simulator> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        (&mut self.handle).await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::Ticker;
    use crate::memory::{Bank, RegisterTable};
    use crate::sim::Simulator;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn ut_ticker_advances_once_per_period() {
        let table = Arc::new(RegisterTable::new());
        let mut sim = Simulator::new(table.clone());
        sim.load(Bank::HoldingRegister, 10, vec![0, 1, 1, 0]).unwrap();
        sim.load(Bank::Coil, 3, vec![1, 0]).unwrap();

        let ticker = Ticker::spawn(sim, Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(5500)).await;
        let sim = ticker.stop().await.unwrap();

        assert_eq!(sim.cursor(Bank::HoldingRegister, 10), Some(1));
        assert_eq!(table.read(Bank::HoldingRegister, 10), Ok(1));
        assert_eq!(table.read(Bank::Coil, 3), Ok(0));
    }

    #[tokio::test(start_paused = true)]
    async fn ut_ticker_stops() {
        let table = Arc::new(RegisterTable::new());
        let mut sim = Simulator::new(table.clone());
        sim.load(Bank::InputRegister, 0, vec![1, 2, 3]).unwrap();

        let ticker = Ticker::spawn(sim, Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let sim = ticker.stop().await.unwrap();
        assert_eq!(sim.cursor(Bank::InputRegister, 0), Some(1));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(table.read(Bank::InputRegister, 0), Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn ut_ticker_drop_stops() {
        let table = Arc::new(RegisterTable::new());
        let mut sim = Simulator::new(table.clone());
        sim.load(Bank::HoldingRegister, 7, vec![1, 2, 3]).unwrap();

        let ticker = Ticker::spawn(sim, Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        drop(ticker);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(table.read(Bank::HoldingRegister, 7), Ok(2));
        // The task ended and released its simulator
        assert_eq!(Arc::strong_count(&table), 1);
    }
}
