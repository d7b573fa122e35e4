use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::{METRIC_FACTORY, METRIC_FACTORY_MS, METRIC_HIT, METRIC_MISS};
use crate::config::{LogFormat, LoggingSettings};
use crate::scoping::METRIC_SCOPE_EXIT;

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
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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

/// Register descriptions for every metric the crate emits. Runs once per process.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_HIT,
            Unit::Count,
            "Total number of application cache hits."
        );
        describe_counter!(
            METRIC_MISS,
            Unit::Count,
            "Total number of application cache misses."
        );
        describe_counter!(
            METRIC_FACTORY,
            Unit::Count,
            "Total number of factory invocations on cache misses."
        );
        describe_histogram!(
            METRIC_FACTORY_MS,
            Unit::Milliseconds,
            "Factory latency in milliseconds."
        );
        describe_counter!(
            METRIC_SCOPE_EXIT,
            Unit::Count,
            "Total number of scope exits by outcome."
        );
    });
}
