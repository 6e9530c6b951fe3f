/// Default quiet period before an aggregated batch is flushed (milliseconds)
pub const DEFAULT_DEBOUNCE_MS: u64 = 250;
/// Prefix used when naming bridge worker threads
pub const DEFAULT_BRIDGE_THREAD_PREFIX: &str = "conduit-bridge";
/// Name given to the debounce scheduler thread of aggregated notificators
pub const AGGREGATOR_THREAD_PREFIX: &str = "conduit-debounce";
