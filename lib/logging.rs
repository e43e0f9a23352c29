use std::error::Error as StdError;

use crate::build_info;

/// Installs the process-wide `env_logger` backend and emits one bootstrap line.
///
/// `RUST_LOG` remains the canonical per-target filter knob; `default_level` only
/// applies when it is unset.
pub fn init_logging(service: &str, default_level: &str) {
    let env = env_logger::Env::default().default_filter_or(default_level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();

    log::debug!(
        "{} {} ({}) logging initialized",
        service,
        build_info::VERSION,
        build_info::short_commit_hash()
    );
}

/// Builds a multi-line error report containing the top-level error message and
/// the full source chain.
pub fn format_error_report(err: &(dyn StdError + 'static)) -> String {
    let mut report = String::new();
    report.push_str("error: ");
    report.push_str(&err.to_string());

    let mut current_source = err.source();
    let mut source_index = 1usize;
    while let Some(source) = current_source {
        report.push_str("\ncaused by (");
        report.push_str(&source_index.to_string());
        report.push_str("): ");
        report.push_str(&source.to_string());
        current_source = source.source();
        source_index = source_index.saturating_add(1);
    }

    report
}
