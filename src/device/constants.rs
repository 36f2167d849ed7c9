/**
 * The store key under which the registry snapshot is persisted, unless configured otherwise.
 */
pub const DEFAULT_SNAPSHOT_KEY: &str = "ble-devices";

/**
 * Number of bars used to display the signal quality of a device.
 */
pub const SIGNAL_BARS: usize = 5;

/**
 * How often (milliseconds) the scan command checks the session and reports progress.
 */
pub const POLL_DELAY: u64 = 2000;

/**
 * Capacity of the channel between the platform scanner and the scan session controller.
 */
pub const EVENT_BUFFER: usize = 64;

/**
 * Largest timestamp accepted from a persisted snapshot: 9999-12-31T23:59:59.999Z.
 * ISO-8601 instants can not represent anything later.
 */
pub const MAX_TIMESTAMP_MILLIS: u64 = 253_402_300_799_999;
