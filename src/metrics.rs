//! Observability hooks.
//!
//! `tracing_helpers` (feature `tracing`) builds the spans wrapped around statements,
//! connection checkout and transactions. `METRICS` (feature `metrics`) holds the
//! OpenTelemetry instruments, exported through a Prometheus registry.

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    pub fn execute_query_span(sql: &str) -> Span {
        info_span!("xplus.execute_query", db.system = "postgresql", db.statement = %sql)
    }

    pub fn acquire_connection_span() -> Span {
        info_span!("xplus.acquire_connection")
    }

    pub fn open_connection_span() -> Span {
        info_span!("xplus.open_connection", db.system = "postgresql")
    }

    pub fn begin_transaction_span() -> Span {
        info_span!("xplus.begin_transaction")
    }

    pub fn commit_transaction_span() -> Span {
        info_span!("xplus.commit_transaction")
    }

    pub fn rollback_transaction_span() -> Span {
        info_span!("xplus.rollback_transaction")
    }
}

#[cfg(feature = "metrics")]
pub use prom::{XplusMetrics, METRICS};

#[cfg(feature = "metrics")]
mod prom {
    use once_cell::sync::Lazy;
    use opentelemetry::metrics::{Counter, Histogram, MeterProvider};
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::{Encoder, Registry, TextEncoder};
    use std::time::Duration;

    pub static METRICS: Lazy<XplusMetrics> = Lazy::new(XplusMetrics::init);

    pub struct XplusMetrics {
        pub registry: Registry,
        pub queries_total: Counter<u64>,
        pub query_errors_total: Counter<u64>,
        pub query_duration: Histogram<f64>,
        pub connection_wait_duration: Histogram<f64>,
        _provider: SdkMeterProvider,
    }

    impl XplusMetrics {
        pub fn init() -> Self {
            let registry = Registry::new();
            let exporter = opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
                .expect("failed to build prometheus exporter");
            let provider = SdkMeterProvider::builder().with_reader(exporter).build();
            let meter = provider.meter("xplus");

            let queries_total = meter
                .u64_counter("xplus_queries_total")
                .with_description("Total statements executed")
                .build();

            let query_errors_total = meter
                .u64_counter("xplus_query_errors_total")
                .with_description("Statements that returned an error")
                .build();

            let query_duration = meter
                .f64_histogram("xplus_query_duration_seconds")
                .with_description("Duration of statements")
                .build();

            let connection_wait_duration = meter
                .f64_histogram("xplus_connection_wait_seconds")
                .with_description("Time spent checking a connection out of the pool")
                .build();

            Self {
                registry,
                queries_total,
                query_errors_total,
                query_duration,
                connection_wait_duration,
                _provider: provider,
            }
        }

        pub fn record_query_duration(&self, elapsed: Duration) {
            self.queries_total.add(1, &[]);
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.add(1, &[]);
        }

        pub fn record_connection_wait(&self, elapsed: Duration) {
            self.connection_wait_duration
                .record(elapsed.as_secs_f64(), &[]);
        }

        /// Render all collected metrics in the Prometheus text format.
        pub fn gather_text(&self) -> String {
            let mut buffer = Vec::new();
            if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
                log::warn!("failed to encode metrics: {e}");
            }
            String::from_utf8_lossy(&buffer).into_owned()
        }
    }
}
