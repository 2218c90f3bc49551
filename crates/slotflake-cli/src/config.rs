use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use slotflake::{DEFAULT_EPOCH, MAX_IDENTITY, NamespaceLayout};

/// Runtime configuration for the `slotflake-cli` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first), with defaults that boot a small fleet.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "slotflake-cli",
    version,
    about = "Simulates a fleet of processes claiming identities and minting Snowflake IDs"
)]
pub struct CliArgs {
    /// Root of the coordination namespace. Markers live under
    /// `<root>/work/all` and `<root>/work/now`.
    ///
    /// Environment variable: `SLOTFLAKE_NAMESPACE`
    #[arg(long, env = "SLOTFLAKE_NAMESPACE", default_value_t = String::from(NamespaceLayout::DEFAULT_ROOT))]
    pub namespace: String,

    /// Number of simulated processes booted in the first wave.
    ///
    /// Environment variable: `SIMULATED_PROCESSES`
    #[arg(long, env = "SIMULATED_PROCESSES", default_value_t = 4)]
    pub processes: u64,

    /// Number of IDs each simulated process generates.
    ///
    /// Environment variable: `IDS_PER_PROCESS`
    #[arg(long, env = "IDS_PER_PROCESS", default_value_t = 3)]
    pub ids_per_process: usize,

    /// Number of first-wave processes that crash (lose their session) before
    /// an equal number of replacements boot and reclaim their identities.
    ///
    /// Environment variable: `CRASHED_PROCESSES`
    #[arg(long, env = "CRASHED_PROCESSES", default_value_t = 1)]
    pub crash: u64,

    /// Epoch for ID timestamps, in milliseconds since the Unix epoch.
    ///
    /// Environment variable: `EPOCH_MS`
    #[arg(long, env = "EPOCH_MS", default_value_t = DEFAULT_EPOCH.as_millis() as u64)]
    pub epoch_ms: u64,
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub layout: NamespaceLayout,
    pub processes: u64,
    pub ids_per_process: usize,
    pub crash: u64,
    pub epoch: Duration,
}

impl TryFrom<CliArgs> for CliConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.processes == 0 {
            bail!("SIMULATED_PROCESSES must be greater than 0");
        }

        if args.processes > MAX_IDENTITY {
            bail!(
                "SIMULATED_PROCESSES ({}) exceeds the identity space (max = {})",
                args.processes,
                MAX_IDENTITY
            );
        }

        if args.crash > args.processes {
            bail!(
                "CRASHED_PROCESSES ({}) exceeds SIMULATED_PROCESSES ({})",
                args.crash,
                args.processes
            );
        }

        Ok(Self {
            layout: NamespaceLayout::new(&args.namespace),
            processes: args.processes,
            ids_per_process: args.ids_per_process,
            crash: args.crash,
            epoch: Duration::from_millis(args.epoch_ms),
        })
    }
}
