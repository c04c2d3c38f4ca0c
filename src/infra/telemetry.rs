use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::artifacts::METRIC_RETENTION_DELETED;
use crate::application::render::{
    METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_ENGINE_MS, METRIC_RENDER_FAILED,
};
use crate::config::{LogFormat, LoggingSettings};

use super::{error::InfraError, uploads::METRIC_UPLOAD_SAVED};

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

/// Register metric descriptions with the installed recorder. Safe to call more than once.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT,
            Unit::Count,
            "Render requests answered from an existing artifact."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Cache-enabled render requests that had to invoke the engine."
        );
        describe_histogram!(
            METRIC_ENGINE_MS,
            Unit::Milliseconds,
            "Render engine invocation latency in milliseconds."
        );
        describe_counter!(
            METRIC_RENDER_FAILED,
            Unit::Count,
            "Render requests that failed after validation."
        );
        describe_counter!(
            METRIC_RETENTION_DELETED,
            Unit::Count,
            "Artifacts deleted by the retention policy."
        );
        describe_counter!(
            METRIC_UPLOAD_SAVED,
            Unit::Count,
            "Inline images written to the public directory."
        );
    });
}
