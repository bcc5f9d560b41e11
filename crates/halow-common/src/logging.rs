//! ---
//! halow_section: "01-core-functionality"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Tracing subscriber bootstrap shared by the binaries."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
//! Console output always goes to stderr; stdout carries operator status
//! lines and the uploader's completion marker. The console honours
//! `HALOW_LOG`, then `RUST_LOG`. The rolling JSON file keeps debug detail
//! from the coordinator crates regardless of the console level.
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::{self, time::UtcTime};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Registry;

use crate::config::LoggingConfig;

const FILTER_ENV: &str = "HALOW_LOG";
const CONSOLE_DIRECTIVES: &str = "info,rumqttc=warn";
const FILE_DIRECTIVES: &str = "info,halow_core=debug,halow_msg=debug,halow_supervisor=debug";

/// Flush guards for the non-blocking writers of the installed subscriber.
static WRITERS: OnceCell<(WorkerGuard, WorkerGuard)> = OnceCell::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Available console log formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    StructuredJson,
    #[default]
    Pretty,
}

/// Install the process-wide subscriber for `service_name`.
///
/// Fails only when the log directory cannot be created. A second call in the
/// same process leaves the first subscriber in place.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!(
            "unable to create log directory {}",
            config.directory.display()
        )
    })?;
    let file_name = config.file_name(service_name);
    let (file_writer, file_guard) =
        tracing_appender::non_blocking(daily(&config.directory, &file_name));
    let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());

    let console: BoxedLayer = match config.format {
        LogFormat::StructuredJson => fmt::layer()
            .json()
            .with_target(false)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(stderr_writer)
            .with_filter(EnvFilter::new(console_directives(|var| std::env::var(var).ok())))
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_timer(UtcTime::rfc_3339())
            .with_writer(stderr_writer)
            .with_filter(EnvFilter::new(console_directives(|var| std::env::var(var).ok())))
            .boxed(),
    };
    let file: BoxedLayer = fmt::layer()
        .json()
        .with_current_span(false)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(file_writer)
        .with_filter(EnvFilter::new(FILE_DIRECTIVES))
        .boxed();

    if tracing_subscriber::registry()
        .with(vec![console, file])
        .try_init()
        .is_err()
    {
        return Ok(());
    }
    let _ = WRITERS.set((stderr_guard, file_guard));

    tracing::info!(
        service = %service_name,
        file = %config.directory.join(&file_name).display(),
        format = ?config.format,
        "tracing initialised"
    );
    Ok(())
}

/// First valid directive set in `HALOW_LOG` or `RUST_LOG`, else the default.
fn console_directives(lookup: impl Fn(&str) -> Option<String>) -> String {
    [FILTER_ENV, EnvFilter::DEFAULT_ENV]
        .into_iter()
        .filter_map(&lookup)
        .find(|directives| EnvFilter::try_new(directives).is_ok())
        .unwrap_or_else(|| CONSOLE_DIRECTIVES.to_owned())
}
