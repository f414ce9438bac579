// network_tools/model
use sysinfo::{NetworksExt, System, SystemExt};

pub mod host_result;
pub mod prober;

// Re-export main types for convenience
pub use host_result::{parse_ping_output, HostResult, ProbeDetails, RoundTripStats};
pub use prober::{ProbeConfig, ProbeError, Prober, ResultTable, StatusSummary};

/// Names of the network interfaces present on this machine.
pub fn interface_names() -> Vec<String> {
    let mut system = System::new();
    system.refresh_networks_list();
    system.networks().iter().map(|(name, _)| name.clone()).collect()
}
