use std::env;
use std::str::FromStr;
use std::time::Duration;

use derive_builder::Builder;
use log::warn;

/// Execution options recognised by the coordinator and fragment executors.
#[derive(Builder, Debug, Clone)]
pub struct ExecConfig {
    /// Number of simulated worker backends; 0 runs everything in-process on the coordinator.
    #[builder(default = "0")]
    pub(crate) num_backends: usize,
    /// Row batches a channel buffers before its senders block.
    #[builder(default = "8")]
    pub(crate) channel_capacity: usize,
    #[builder(default = "1024")]
    pub(crate) batch_size: usize,
    /// Fold constant sub-expressions of the select list once per query.
    #[builder(default = "true")]
    pub(crate) codegen_enabled: bool,
    /// Maximum number of distinct messages kept in an instance's error log.
    #[builder(default = "100")]
    pub(crate) max_errors: usize,
    /// Bytes of queued row batches an instance may hold; unlimited when `None`.
    #[builder(default = "None")]
    pub(crate) mem_limit: Option<usize>,
    #[builder(default = "Duration::from_secs(30)")]
    pub(crate) shutdown_timeout: Duration,
}

impl Default for ExecConfig {
    fn default() -> Self {
        ExecConfig {
            num_backends: 0,
            channel_capacity: 8,
            batch_size: 1024,
            codegen_enabled: true,
            max_errors: 100,
            mem_limit: None,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

fn env_var<T: FromStr>(name: &str) -> Option<T> {
    let value = env::var(name).ok()?;
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring invalid value {:?} of {}", value, name);
            None
        }
    }
}

impl ExecConfig {
    /// Defaults overridden by `DISTEXEC_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = ExecConfig::default();
        if let Some(v) = env_var("DISTEXEC_NUM_BACKENDS") {
            config.num_backends = v;
        }
        if let Some(v) = env_var::<usize>("DISTEXEC_CHANNEL_CAPACITY") {
            config.channel_capacity = v.max(1);
        }
        if let Some(v) = env_var::<usize>("DISTEXEC_BATCH_SIZE") {
            config.batch_size = v.max(1);
        }
        if let Some(v) = env_var::<bool>("DISTEXEC_DISABLE_CODEGEN") {
            config.codegen_enabled = !v;
        }
        config
    }

    pub fn num_backends(&self) -> usize {
        self.num_backends
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    pub fn codegen_enabled(&self) -> bool {
        self.codegen_enabled
    }
}
