use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::metric_names::{
    METRIC_COUNTER_INCREMENT_TOTAL, METRIC_FIND_FALLBACK_TOTAL, METRIC_READ_HIT_TOTAL,
    METRIC_READ_MISS_TOTAL, METRIC_STORE_EVICT_TOTAL,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_READ_HIT_TOTAL,
            Unit::Count,
            "Total number of snapshot reads served from the cache."
        );
        describe_counter!(
            METRIC_READ_MISS_TOTAL,
            Unit::Count,
            "Total number of snapshot reads that missed the cache."
        );
        describe_counter!(
            METRIC_FIND_FALLBACK_TOTAL,
            Unit::Count,
            "Total number of finds that fell back to the record store."
        );
        describe_counter!(
            METRIC_STORE_EVICT_TOTAL,
            Unit::Count,
            "Total number of memory store evictions due to capacity."
        );
        describe_counter!(
            METRIC_COUNTER_INCREMENT_TOTAL,
            Unit::Count,
            "Total number of cached counter increments."
        );
    });
}
