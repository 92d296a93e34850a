//! Metrics emitted by the client
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! application installs a recorder.

pub(crate) mod labels {
    pub const MODE_LAZY: &str = "lazy";
    pub const MODE_EAGER: &str = "eager";
}

pub(crate) mod counters {
    pub fn connection_opened(mode: &'static str) {
        ::metrics::counter!("gpcore_client_connections_total", "mode" => mode).increment(1);
    }

    pub fn connection_failed(category: &'static str) {
        ::metrics::counter!("gpcore_client_connection_errors_total", "category" => category)
            .increment(1);
    }

    pub fn stub_created(service: &'static str) {
        ::metrics::counter!("gpcore_client_stubs_created_total", "service" => service).increment(1);
    }
}

pub(crate) mod histograms {
    use std::time::Duration;

    pub fn connect_duration(elapsed: Duration) {
        ::metrics::histogram!("gpcore_client_connect_duration_ms").record(elapsed.as_millis() as f64);
    }
}
