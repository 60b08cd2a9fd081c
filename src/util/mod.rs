use local_ip_address::list_afinet_netifas;
use std::net::{IpAddr, Ipv4Addr};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` wins over `debug`.
pub fn init_log(debug: bool) {
    let default_directive = if debug {
        "rover_signal=debug,tower_http=debug,info"
    } else {
        "rover_signal=info,tower_http=info,warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

/// IPv4 addresses other devices on the network can reach this host on.
///
/// Skips loopback and link-local interfaces. Returns an empty list when the
/// interfaces cannot be enumerated.
pub fn lan_addresses() -> Vec<Ipv4Addr> {
    let mut addresses = vec![];
    if let Ok(network_interfaces) = list_afinet_netifas() {
        for (name, ip) in network_interfaces {
            debug!("iface: {} / {:?}", name, ip);
            if let IpAddr::V4(ip4) = ip {
                if !ip4.is_loopback() && !ip4.is_link_local() && !addresses.contains(&ip4) {
                    addresses.push(ip4);
                }
            }
        }
    }
    addresses
}
