use biometrics::{Collector, Counter};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("duplex.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("duplex.client.request_errors");

pub(crate) static STREAM_CHUNKS: Counter = Counter::new("duplex.stream.chunks");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("duplex.stream.errors");

pub(crate) static SESSIONS_STARTED: Counter = Counter::new("duplex.sessions.started");
pub(crate) static STALE_UPDATES: Counter = Counter::new("duplex.sessions.stale_updates");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);

    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_ERRORS);

    collector.register_counter(&SESSIONS_STARTED);
    collector.register_counter(&STALE_UPDATES);
}
