use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::device::constants::MAX_TIMESTAMP_MILLIS;
use crate::device::types::DeviceObservation;

pub const CSV_HEADER: &str = "Name,ID,RSSI,TX Power,Timestamp";
pub const CSV_MIME_TYPE: &str = "text/csv";
const NOT_AVAILABLE: &str = "N/A";

/// Clamps `time` to the range an ISO-8601 instant can represent (years 1970 to 9999).
pub fn representable_instant(time: SystemTime) -> SystemTime {
    let latest = UNIX_EPOCH + Duration::from_millis(MAX_TIMESTAMP_MILLIS);
    time.clamp(UNIX_EPOCH, latest)
}

/// Renders `time` as an ISO-8601 UTC instant with millisecond precision,
/// e.g. `2023-11-14T22:13:20.000Z`.
pub fn format_instant(time: SystemTime) -> String {
    humantime::format_rfc3339_millis(representable_instant(time)).to_string()
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn optional_number(value: Option<i16>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

fn row(observation: &DeviceObservation) -> String {
    let name = match observation.display_name() {
        Some(name) => quote(name),
        None => NOT_AVAILABLE.to_string(),
    };

    format!(
        "{},{},{},{},{}",
        name,
        observation.id,
        optional_number(observation.signal_strength),
        optional_number(observation.transmit_power),
        format_instant(observation.observed_at),
    )
}

/// Renders a header line followed by one row per observation, in the given order.
/// Rows are separated by `\n`, there is no trailing newline after the last row.
pub fn to_delimited_text(snapshot: &[DeviceObservation]) -> String {
    let rows: Vec<String> = snapshot.iter().map(row).collect();
    format!("{}\n{}", CSV_HEADER, rows.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(id: &str, name: Option<&str>, rssi: Option<i16>, tx: Option<i16>) -> DeviceObservation {
        DeviceObservation {
            id: id.to_string(),
            name: name.map(str::to_string),
            signal_strength: rssi,
            transmit_power: tx,
            observed_at: UNIX_EPOCH + Duration::from_millis(1_700_000_000_000),
        }
    }

    #[test]
    fn unnamed_device_row() {
        let text = to_delimited_text(&[observation("AA:BB", None, Some(-65), None)]);
        let lines: Vec<&str> = text.split('\n').collect();

        assert_eq!(lines, vec![
            "Name,ID,RSSI,TX Power,Timestamp",
            "N/A,AA:BB,-65,N/A,2023-11-14T22:13:20.000Z",
        ]);
    }

    #[test]
    fn quotes_in_names_are_doubled() {
        let text = to_delimited_text(&[observation("AA:BB", Some("Bob's \"Tag\""), None, Some(4))]);

        assert_eq!(
            text,
            "Name,ID,RSSI,TX Power,Timestamp\n\"Bob's \"\"Tag\"\"\",AA:BB,N/A,4,2023-11-14T22:13:20.000Z",
        );
    }

    #[test]
    fn names_with_commas_stay_in_one_field() {
        let text = to_delimited_text(&[observation("1", Some("Kitchen, left"), Some(-1), None)]);
        assert!(text.ends_with("\"Kitchen, left\",1,-1,N/A,2023-11-14T22:13:20.000Z"));
    }

    #[test]
    fn empty_name_is_not_available() {
        let text = to_delimited_text(&[observation("1", Some(""), Some(-70), None)]);
        assert!(text.ends_with("\nN/A,1,-70,N/A,2023-11-14T22:13:20.000Z"));
    }

    #[test]
    fn rows_keep_input_order() {
        let text = to_delimited_text(&[
            observation("weak", None, Some(-90), None),
            observation("strong", None, Some(-30), None),
        ]);
        let ids: Vec<&str> = text
            .lines()
            .skip(1)
            .map(|line| line.split(',').nth(1).unwrap())
            .collect();

        assert_eq!(ids, vec!["weak", "strong"]);
    }

    #[test]
    fn instants_before_the_epoch_are_clamped() {
        let before = UNIX_EPOCH - Duration::from_secs(10);
        assert_eq!(format_instant(before), "1970-01-01T00:00:00.000Z");
    }
}
