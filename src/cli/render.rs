use std::fmt::Write;

use crate::device::constants::SIGNAL_BARS;
use crate::device::types::DeviceObservation;
use crate::export::csv::representable_instant;
use crate::scan::controller::ScanStatus;

const NAME_WIDTH: usize = 24;

pub fn device_count_text(count: usize) -> String {
    format!("{} {} found", count, if count == 1 { "device" } else { "devices" })
}

pub fn status_text(status: ScanStatus) -> &'static str {
    match status {
        ScanStatus::Idle => "Idle",
        ScanStatus::Scanning => "Scanning…",
    }
}

/// `▮▮▮▯▯ -75 dBm (Fair)`, or `N/A` without a signal strength
pub fn signal_text(observation: &DeviceObservation) -> String {
    let (Some(rssi), Some(quality)) = (observation.signal_strength, observation.signal_quality()) else {
        return "N/A".to_string();
    };

    let filled = quality.bars();
    format!(
        "{}{} {} dBm ({})",
        "▮".repeat(filled),
        "▯".repeat(SIGNAL_BARS - filled),
        rssi,
        quality,
    )
}

fn name_column(observation: &DeviceObservation) -> String {
    let name = observation.display_name().unwrap_or("Unknown Device");

    if name.chars().count() > NAME_WIDTH {
        let truncated: String = name.chars().take(NAME_WIDTH - 1).collect();
        format!("{}…", truncated)
    } else {
        name.to_string()
    }
}

/// One line per device, in the given order.
pub fn render_table(snapshot: &[DeviceObservation]) -> String {
    if snapshot.is_empty() {
        return "No Devices Found\nRun \"beacon-scan scan\" to search for nearby Bluetooth LE devices.\n".to_string();
    }

    let mut table = String::new();
    // writing to a String can not fail
    let _ = writeln!(table, "{:<w$}  {:<20}  {:<28}  {:>4}  {}", "NAME", "ID", "RSSI", "TX", "SEEN", w = NAME_WIDTH);

    for observation in snapshot {
        let transmit_power = match observation.transmit_power {
            Some(power) => power.to_string(),
            None => "N/A".to_string(),
        };

        let _ = writeln!(
            table,
            "{:<w$}  {:<20}  {:<28}  {:>4}  {}",
            name_column(observation),
            observation.id,
            signal_text(observation),
            transmit_power,
            humantime::format_rfc3339_seconds(representable_instant(observation.observed_at)),
            w = NAME_WIDTH,
        );
    }

    let _ = writeln!(table, "{}", device_count_text(snapshot.len()));
    table
}
