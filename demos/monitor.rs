//! Listens for node telemetry and logs what it learns
//!
//! ``` text
//! cargo run --features std --example monitor -- 0.0.0.0:3333
//! ```

use std::{
    env,
    net::UdpSocket,
};

use log::{debug, error, info, warn};

use uwb_relay::monitor::{Monitor, Report};


fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let bind = env::args().nth(1).unwrap_or_else(|| "0.0.0.0:3333".into());
    let socket = UdpSocket::bind(&bind)?;
    info!("UDP server listening on {}", bind);

    let mut monitor: Monitor = Monitor::new();
    let mut buf = [0; 1024];

    loop {
        let (len, source) = socket.recv_from(&mut buf)?;
        let datagram = &buf[..len];
        debug!("Received raw data from {}: {:?}", source, String::from_utf8_lossy(datagram));

        let (report, observation) = match monitor.ingest(datagram) {
            Ok(result) => result,
            Err(err) => {
                error!("Dropping datagram from {}: {}", source, err);
                continue;
            }
        };

        if let Some((from, to)) = observation.role_change {
            info!("Device {} changed role from {} to {}", report.device_address(), from, to);
        }

        match report {
            Report::RoleChange { device_address, role, timestamp } => {
                info!("{} is now {} (t={} ms)", device_address, role, timestamp.millis());
            }
            Report::TimeSync { device_address, timestamp } => {
                info!("{} clock at {} ms", device_address, timestamp.millis());
            }
            Report::RangeSnapshot { device_address, role, range_data, .. } => {
                match observation.range {
                    Some(entry) => info!(
                        "{} ({}): {} peers, {:04X} at {} m",
                        device_address, role, range_data.len(), entry.address, entry.range,
                    ),
                    None => warn!(
                        "{} ({}): no plausible range among {} peers",
                        device_address, role, range_data.len(),
                    ),
                }
            }
        }
    }
}
