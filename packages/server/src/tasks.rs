use crate::broadcast::BroadcastHub;
use crate::models::{GeoBounds, Taxi};
use crate::Result;
use rand::Rng;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Largest per-tick move in either axis, in degrees.
pub const MAX_STEP_DEGREES: f64 = 0.001;

pub const DEFAULT_TICK: Duration = Duration::from_secs(5);

/// Random walk applied to the simulated taxi.
#[derive(Debug)]
pub struct LocationSimulator<R> {
    rng: R,
    bounds: Option<GeoBounds>,
}

impl<R: Rng> LocationSimulator<R> {
    pub fn new(rng: R, bounds: Option<GeoBounds>) -> Self {
        Self { rng, bounds }
    }

    /// Draws the latitude then longitude offset for one tick.
    pub fn next_offset(&mut self) -> (f64, f64) {
        let dlat = self.rng.gen_range(-MAX_STEP_DEGREES..=MAX_STEP_DEGREES);
        let dlng = self.rng.gen_range(-MAX_STEP_DEGREES..=MAX_STEP_DEGREES);
        (dlat, dlng)
    }

    pub fn step(&mut self, taxi: &Taxi) -> Taxi {
        let (dlat, dlng) = self.next_offset();
        let (mut lat, mut lng) = (taxi.lat + dlat, taxi.lng + dlng);
        if let Some(bounds) = &self.bounds {
            (lat, lng) = bounds.clamp(lat, lng);
        }
        Taxi {
            lat,
            lng,
            ..taxi.clone()
        }
    }
}

/// Running simulator task. The loop ends on [`SimulatorHandle::shutdown`] or
/// when the handle is dropped.
#[derive(Debug)]
pub struct SimulatorHandle {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl SimulatorHandle {
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        self.handle.await?;
        Ok(())
    }
}

/// Spawns the only writer of the taxi record. Every `period` it moves the
/// taxi, stores the new snapshot in `taxi_tx` and publishes it to `hub`.
/// The first move happens one full period after spawning.
pub fn spawn_location_simulator<R>(
    mut simulator: LocationSimulator<R>,
    taxi_tx: watch::Sender<Taxi>,
    hub: BroadcastHub,
    period: Duration,
) -> SimulatorHandle
where
    R: Rng + Send + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    let handle = tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(?period, "location simulator started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let next = simulator.step(&taxi_tx.borrow());
                    taxi_tx.send_replace(next.clone());
                    let delivered = hub.publish(&next);
                    debug!(lat = next.lat, lng = next.lng, delivered, "taxi moved");
                }
                _ = &mut shutdown_rx => break,
            }
        }

        info!("location simulator stopped");
    });

    SimulatorHandle {
        shutdown_tx,
        handle,
    }
}
