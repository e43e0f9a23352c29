pub mod error;

use chrono::Local;
use log::{debug, info};
use std::sync::Arc;
use std::time::Instant;

use crate::api_client::ApiClient;
use crate::batch::{Batch, BatchOptions, SharedApi};
use crate::config::Config;
use crate::data_source::{DataClient, DataSource};
use crate::report::{
    combine_counts, create_error_summary, create_validation_summary, log_error_summary,
    log_response_counts, log_validation_summary, ErrorSummary, ResponseCounts,
    ValidationFailure,
};
use crate::request::ApiAction;
use crate::response::ExecutionResult;
pub use error::Error;

/// Lifecycle of an [`Import`]. Steps must run in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Created,
    Preprocessed,
    Processed,
    Postprocessed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Log a timestamped line when each batch starts and completes.
    pub log_timing: bool,
    /// Master switch for the three summaries below.
    pub log_postprocess: bool,
    pub log_response_code_summary: bool,
    pub log_error_summary: bool,
    pub log_validation_summary: bool,
    /// Resolve building references and dates before import.
    pub normalize: bool,
    pub batch: BatchOptions,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            log_timing: false,
            log_postprocess: true,
            log_response_code_summary: true,
            log_error_summary: true,
            log_validation_summary: true,
            normalize: false,
            batch: BatchOptions::default(),
        }
    }
}

/// Runs a create batch over insertable records and an update batch over
/// updatable ones, then summarizes what the api said.
pub struct Import<D: DataSource> {
    data_source: D,
    api: SharedApi,
    api_host: String,
    options: ImportOptions,
    state: ImportState,
    counts: Vec<ResponseCounts>,
    results: Vec<ExecutionResult>,
    error_summary: ErrorSummary,
    validation_summary: Vec<ValidationFailure>,
}

impl<D: DataSource> Import<D> {
    pub fn new(data_source: D, api: SharedApi, options: ImportOptions) -> Self {
        Self {
            data_source,
            api,
            api_host: String::new(),
            options,
            state: ImportState::Created,
            counts: Vec::new(),
            results: Vec::new(),
            error_summary: ErrorSummary::new(),
            validation_summary: Vec::new(),
        }
    }

    /// Host stripped from transport error messages in the error summary.
    pub fn with_api_host(mut self, api_host: impl Into<String>) -> Self {
        self.api_host = api_host.into();
        self
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    pub fn data_source(&self) -> &D {
        &self.data_source
    }

    /// Per-batch response counts, insert batch first.
    pub fn counts(&self) -> &[ResponseCounts] {
        &self.counts
    }

    pub fn results(&self) -> &[ExecutionResult] {
        &self.results
    }

    pub fn error_summary(&self) -> &ErrorSummary {
        &self.error_summary
    }

    pub fn validation_summary(&self) -> &[ValidationFailure] {
        &self.validation_summary
    }

    fn expect_state(&self, step: &'static str, expected: ImportState) -> Result<(), Error> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::OutOfOrder {
                step,
                state: self.state,
            })
        }
    }

    /// Checks the api is reachable, then flags every record for import.
    ///
    /// The status response itself isn't inspected; only a transport failure
    /// stops the import.
    pub async fn preprocess(&mut self) -> Result<(), Error> {
        self.expect_state("preprocess", ImportState::Created)?;

        let status = self.api.status().await.map_err(Error::Status)?;
        info!("Api status check returned {}", status.status);

        if self.options.normalize {
            self.data_source.normalize();
        }
        self.data_source.enable_import();

        self.state = ImportState::Preprocessed;
        Ok(())
    }

    /// Runs both batches concurrently and returns their results, inserts first.
    ///
    /// An unsuppressed failure in either batch cancels the other.
    pub async fn process(&mut self) -> Result<Vec<ExecutionResult>, Error> {
        self.expect_state("process", ImportState::Preprocessed)?;

        let mut inserts = Batch::new(
            self.data_source.insertable(),
            ApiAction::Create,
            self.api.clone(),
            self.options.batch,
        );
        let mut updates = Batch::new(
            self.data_source.updatable(),
            ApiAction::Update,
            self.api.clone(),
            self.options.batch,
        );
        info!(
            "Importing {} new and {} existing datacenters",
            inserts.len(),
            updates.len()
        );
        for batch in [&inserts, &updates] {
            if batch.is_empty() {
                debug!("Nothing to {}, skipping that batch", batch.action());
            }
        }

        let log_timing = self.options.log_timing;
        let (mut inserted, updated) = tokio::try_join!(
            timed(&mut inserts, log_timing),
            timed(&mut updates, log_timing)
        )?;

        self.counts = vec![inserts.response_counts(), updates.response_counts()];
        inserted.extend(updated);

        self.validation_summary = create_validation_summary(&inserted);
        self.error_summary = create_error_summary(&inserted, &self.api_host);
        self.results = inserted.clone();

        self.state = ImportState::Processed;
        Ok(inserted)
    }

    /// Combines per-batch counts and logs the enabled summaries.
    pub async fn postprocess(&mut self) -> Result<ResponseCounts, Error> {
        self.expect_state("postprocess", ImportState::Processed)?;

        let combined = combine_counts(&self.counts);
        if self.options.log_postprocess {
            if self.options.log_response_code_summary {
                log_response_counts(&combined);
            }
            if self.options.log_error_summary {
                log_error_summary(&self.error_summary);
            }
            if self.options.log_validation_summary {
                log_validation_summary(&self.validation_summary);
            }
        }

        self.state = ImportState::Postprocessed;
        Ok(combined)
    }

    pub async fn start(&mut self) -> Result<ResponseCounts, Error> {
        self.preprocess().await?;
        self.process().await?;
        self.postprocess().await
    }
}

async fn timed(batch: &mut Batch, log_timing: bool) -> Result<Vec<ExecutionResult>, Error> {
    let action = batch.action();
    if log_timing {
        info!("[{}] - {} starting", Local::now().format("%H:%M:%S"), action);
    }
    let started = Instant::now();
    let results = batch.process().await?;
    if log_timing {
        info!(
            "[{}] - {} complete in {}s",
            Local::now().format("%H:%M:%S"),
            action,
            started.elapsed().as_secs()
        );
    }
    Ok(results)
}

/// Loads the exports named in `config` and imports them against its api.
///
/// Batch staggering comes from `config`, overriding `options.batch`.
pub async fn run(config: &Config, mut options: ImportOptions) -> Result<ResponseCounts, Error> {
    let data = DataClient::load(&config.datacenters_path, &config.buildings_path)?;
    let client = ApiClient::new(&config.api_url)?;
    let api_host = client.host();
    options.batch.delay_increment = config.delay_increment;

    let mut import = Import::new(data, Arc::new(client), options).with_api_host(api_host);
    import.start().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::Record;
    use crate::request::RequestOptions;
    use crate::test_support::{json_response, text_response, MockApi, Scripted};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn records(value: Value) -> Vec<Record> {
        serde_json::from_value(value).expect("fixture should be an array of objects")
    }

    fn data() -> DataClient {
        DataClient::new(
            records(json!([
                {"city": "Reno"},
                {"id": "dc-1", "city": "Austin"},
                {"city": "Boise"},
            ])),
            vec![],
        )
    }

    fn quiet() -> ImportOptions {
        ImportOptions {
            log_postprocess: false,
            batch: BatchOptions {
                log_progress: false,
                delay_increment: Duration::from_millis(10),
                request: RequestOptions::default(),
            },
            ..ImportOptions::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn start_runs_every_step() {
        let api = Arc::new(MockApi::always(Scripted::Response(json_response(
            201,
            json!({"ok": true}),
        ))));
        let mut import = Import::new(data(), api.clone(), quiet());

        let combined = import.start().await.expect("import should succeed");

        assert_eq!(import.state(), ImportState::Postprocessed);
        assert_eq!(combined.get("201"), Some(&3));
        assert_eq!(import.counts().len(), 2);
        assert_eq!(import.counts()[0].get("201"), Some(&2));
        assert_eq!(import.counts()[1].get("201"), Some(&1));

        let calls = api.calls();
        assert_eq!(calls[0], "status");
        assert_eq!(calls.iter().filter(|c| *c == "create").count(), 2);
        assert!(calls.contains(&"update dc-1".to_string()));
        assert!(import
            .data_source()
            .datacenters()
            .iter()
            .all(|r| r.get("import") == Some(&json!(true))));
    }

    #[tokio::test(start_paused = true)]
    async fn status_failure_stops_before_any_write() {
        let api = Arc::new(
            MockApi::default().with_status(Scripted::Failure("connection refused".into())),
        );
        let mut import = Import::new(data(), api.clone(), quiet());

        let err = import.start().await.expect_err("status failure propagates");

        assert!(matches!(err, Error::Status(_)));
        assert_eq!(api.calls(), vec!["status".to_string()]);
        assert_eq!(import.state(), ImportState::Created);
    }

    #[tokio::test(start_paused = true)]
    async fn status_response_is_not_inspected() {
        let api = Arc::new(
            MockApi::always(Scripted::Response(json_response(201, json!({}))))
                .with_status(Scripted::Response(text_response(503, "down"))),
        );
        let mut import = Import::new(data(), api, quiet());

        import.start().await.expect("a 503 status still proceeds");
    }

    #[tokio::test(start_paused = true)]
    async fn steps_must_run_in_order() {
        let mut import = Import::new(data(), Arc::new(MockApi::default()), quiet());

        let err = import.process().await.expect_err("process needs preprocess");
        assert!(matches!(
            err,
            Error::OutOfOrder {
                step: "process",
                state: ImportState::Created
            }
        ));

        let err = import.postprocess().await.expect_err("postprocess needs process");
        assert!(matches!(err, Error::OutOfOrder { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn summaries_cover_both_batches() {
        let api = Arc::new(MockApi::always(Scripted::Response(json_response(
            422,
            json!({"valid": false, "messages": ["name required"]}),
        ))));
        let mut import = Import::new(data(), api, quiet());

        import.preprocess().await.expect("preprocess");
        let results = import.process().await.expect("process");

        assert_eq!(results.len(), 3);
        assert_eq!(import.results().len(), 3);
        assert_eq!(import.validation_summary().len(), 3);
        assert!(import.error_summary().is_empty());
        assert!(import
            .validation_summary()
            .iter()
            .all(|v| v.messages() == vec!["name required".to_string()]));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_are_summarized_without_host() {
        let api = Arc::new(MockApi::always(Scripted::Failure(
            "http://mock.test/api unreachable".into(),
        )));
        let mut import = Import::new(data(), api, quiet()).with_api_host("http://mock.test");

        let combined = import.start().await.expect("failures are suppressed");

        assert_eq!(combined.get("request-failure"), Some(&3));
        assert_eq!(
            import.error_summary().get("connection error: /api unreachable"),
            Some(&3)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unsuppressed_failures_abort_the_run() {
        let api = Arc::new(MockApi::always(Scripted::Failure("connection refused".into())));
        let mut options = quiet();
        options.batch.request.suppress_errors = false;
        let mut import = Import::new(data(), api, options);

        let err = import.start().await.expect_err("run should abort");

        assert!(matches!(err, Error::Batch(_)));
        assert_eq!(import.state(), ImportState::Preprocessed);
        assert!(import.results().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn normalize_runs_during_preprocess() {
        let data = DataClient::new(
            records(json!([{"city": "Reno", "buildingIds": ["b-1"]}])),
            records(json!([{"id": "b-1", "name": "North"}])),
        );
        let mut options = quiet();
        options.normalize = true;
        let mut import = Import::new(data, Arc::new(MockApi::default()), options);

        import.preprocess().await.expect("preprocess");

        let dc = &import.data_source().datacenters()[0];
        assert_eq!(dc.get("buildings"), Some(&json!([{"id": "b-1", "name": "North"}])));
    }
}
