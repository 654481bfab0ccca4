use std::time::Duration;

use muster::logging;
use muster::thread::{BootstrapConfig, RegionLoader};
use muster::{
    SetupError, ThreadWorkerSpawner, WorkerContext, WorkerId, WorkerPoolBootstrapper, WorkerRoutine,
};
use tracing::info;

/// Sums the bytes of each job and writes the result into its own slot of the
/// shared region.
struct Summer {
    slot: usize,
}

impl WorkerRoutine for Summer {
    fn setup(&mut self, ctx: &WorkerContext) -> Result<(), SetupError> {
        // Pretend to open a device
        std::thread::sleep(Duration::from_millis(20 * ctx.id().index() as u64));
        self.slot = ctx.id().index();
        ctx.resource().store(self.slot, 0)?;
        Ok(())
    }

    fn handle(&mut self, ctx: &WorkerContext, job: Vec<u8>) -> Option<Vec<u8>> {
        let sum = job.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        ctx.resource().store(self.slot, sum).ok()?;
        Some(vec![sum])
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_development();

    let config = BootstrapConfig::default()
        .with_worker_count(4)
        .with_timeout(Duration::from_millis(500));
    let spawner = ThreadWorkerSpawner::with_config(|| Summer { slot: 0 }, &config);
    let bootstrapper = WorkerPoolBootstrapper::new(spawner);

    let loader = RegionLoader::new(config.worker_count).with_image(vec![0xff; config.worker_count]);
    let mut pool = bootstrapper
        .bootstrap_with_loader(&loader, config.worker_count, config.per_worker_timeout)
        .await?;
    info!(pool = %pool.id(), workers = pool.len(), "pool is up");

    pool.broadcast(&[1, 2, 3])?;
    for id in pool.ids() {
        if let Some(output) = pool.recv_from(id).await {
            info!(worker = %id, output = ?output, "job done");
        }
    }
    pool.send_to(WorkerId::new(0), vec![40, 2])?;
    let answer = pool.recv_from(WorkerId::new(0)).await;
    info!(answer = ?answer, region = ?pool.resource().snapshot(), "shared region after jobs");

    pool.shutdown(config.join_timeout).await?;
    info!(active = bootstrapper.spawner().active_workers(), "done");
    Ok(())
}
