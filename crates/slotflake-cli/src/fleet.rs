//! A fleet of simulated processes sharing one in-memory coordination
//! namespace.
//!
//! Each simulated process owns its own session and its own
//! [`GeneratorRegistry`], exactly as a real process would, and boots through
//! [`bootstrap`]. Dropping a process ends its session, which frees its
//! identity for the next wave.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, bail};
use slotflake::{
    GeneratorRegistry, Identity, LockSnowflakeGenerator, MemoryNamespace, MemorySession,
    NamespaceLayout, SnowflakeId, SystemClock, TimeSource, bootstrap,
};
use tracing::{info, info_span};

use crate::config::CliConfig;

pub struct SimulatedProcess {
    // Field order matters: the generator is dropped before the session that
    // reserves its identity.
    generator: Arc<LockSnowflakeGenerator<SystemClock>>,
    _registry: GeneratorRegistry<SystemClock>,
    session: MemorySession,
}

impl SimulatedProcess {
    pub fn boot(
        namespace: &MemoryNamespace,
        layout: &NamespaceLayout,
        clock: SystemClock,
    ) -> anyhow::Result<Self> {
        let session = namespace.session();
        let _span = info_span!("process", session = session.id()).entered();
        let registry = GeneratorRegistry::new();
        let generator = bootstrap(&session, layout.clone(), &registry, clock)
            .context("failed to bootstrap simulated process")?;
        Ok(Self {
            generator,
            _registry: registry,
            session,
        })
    }

    pub fn identity(&self) -> anyhow::Result<Identity> {
        Ok(Identity::from_parts(
            self.generator.node_id(),
            self.generator.datacenter_id(),
        )?)
    }

    pub fn session_id(&self) -> u64 {
        self.session.id()
    }

    pub fn generate(&self, count: usize) -> anyhow::Result<Vec<SnowflakeId>> {
        (0..count)
            .map(|_| self.generator.next_id().map_err(anyhow::Error::from))
            .collect()
    }
}

pub struct Wave {
    pub processes: Vec<SimulatedProcess>,
    pub ids: Vec<(Identity, SnowflakeId)>,
}

/// Boots `count` processes on separate threads, then has each generate
/// `ids_per_process` IDs.
pub fn boot_wave(
    namespace: &MemoryNamespace,
    layout: &NamespaceLayout,
    clock: SystemClock,
    count: u64,
    ids_per_process: usize,
) -> anyhow::Result<Wave> {
    let results: Vec<anyhow::Result<(SimulatedProcess, Vec<SnowflakeId>)>> =
        thread::scope(|s| {
            let handles: Vec<_> = (0..count)
                .map(|_| {
                    s.spawn(|| -> anyhow::Result<(SimulatedProcess, Vec<SnowflakeId>)> {
                        let process = SimulatedProcess::boot(namespace, layout, clock)?;
                        let ids = process.generate(ids_per_process)?;
                        Ok((process, ids))
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(result) => result,
                    Err(_) => Err(anyhow::anyhow!("simulated process panicked")),
                })
                .collect()
        });

    let mut wave = Wave {
        processes: Vec::with_capacity(results.len()),
        ids: Vec::new(),
    };
    for result in results {
        let (process, ids) = result?;
        let identity = process.identity()?;
        wave.ids.extend(ids.into_iter().map(|id| (identity, id)));
        wave.processes.push(process);
    }
    wave.processes.sort_by_key(|p| {
        (p.generator.datacenter_id() << SnowflakeId::NODE_ID_BITS) | p.generator.node_id()
    });
    Ok(wave)
}

pub struct FleetReport {
    pub first_wave: Vec<Identity>,
    pub crashed: Vec<Identity>,
    pub replacements: Vec<Identity>,
    pub ids: Vec<(Identity, SnowflakeId)>,
}

/// Runs the whole simulation: first wave, crashes, replacement wave.
pub fn run(config: &CliConfig) -> anyhow::Result<FleetReport> {
    let namespace = MemoryNamespace::new();
    let clock = SystemClock::with_epoch(config.epoch)?;

    let mut first = boot_wave(
        &namespace,
        &config.layout,
        clock,
        config.processes,
        config.ids_per_process,
    )?;
    let first_wave = identities(&first.processes)?;
    info!(identities = ?first_wave, "first wave booted");

    let crashed_processes: Vec<_> = first.processes.drain(..config.crash as usize).collect();
    let crashed = identities(&crashed_processes)?;
    for process in crashed_processes {
        info!(session = process.session_id(), "simulating crash");
        drop(process);
    }

    // A replacement reclaims a crashed identity with a fresh sequence, so it
    // must not start within a millisecond the crashed process already used.
    let last_crashed_millis = first
        .ids
        .iter()
        .filter(|(identity, _)| crashed.contains(identity))
        .map(|(_, id)| id.timestamp())
        .max();
    if let Some(last) = last_crashed_millis {
        wait_past(&clock, last);
    }

    let second = boot_wave(
        &namespace,
        &config.layout,
        clock,
        config.crash,
        config.ids_per_process,
    )?;
    let replacements = identities(&second.processes)?;
    info!(identities = ?replacements, "replacement wave booted");

    let mut ids = first.ids;
    ids.extend(second.ids);
    let mut seen = HashSet::with_capacity(ids.len());
    for (_, id) in &ids {
        if !seen.insert(*id) {
            bail!("duplicate id {id} across the fleet");
        }
    }

    Ok(FleetReport {
        first_wave,
        crashed,
        replacements,
        ids,
    })
}

/// Spins until `clock` reads strictly later than `millis`.
fn wait_past(clock: &impl TimeSource, millis: u64) {
    while clock.current_millis() <= millis {
        std::hint::spin_loop();
    }
}

fn identities(processes: &[SimulatedProcess]) -> anyhow::Result<Vec<Identity>> {
    processes.iter().map(SimulatedProcess::identity).collect()
}
