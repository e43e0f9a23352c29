pub mod error;
pub mod progress;
pub mod stats;

use log::{error, info};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};
use yansi::Paint;

use crate::api_client::DatacenterApi;
use crate::config::DELAY_INCREMENT;
use crate::data_source::Record;
use crate::request::{self, ApiAction, RequestOptions};
use crate::response::{simplify_results, ExecutionResult, SimplifiedResult};
use error::BatchError;
use progress::{Milestone, ProgressTracker};
use stats::{group_by_status, response_counts, GroupedStats};

/// Api handle shared by every task of a batch.
pub type SharedApi = Arc<dyn DatacenterApi>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Log start, decile progress and completion lines.
    pub log_progress: bool,
    /// Record `i` starts `i * delay_increment` after the batch starts.
    pub delay_increment: Duration,
    pub request: RequestOptions,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            log_progress: true,
            delay_increment: DELAY_INCREMENT,
            request: RequestOptions::default(),
        }
    }
}

/// Performs one api action for every record, staggering request start times.
///
/// Staggering only spreads load on the api; it doesn't bound how many requests
/// are in flight.
pub struct Batch {
    records: Vec<Record>,
    action: ApiAction,
    api: SharedApi,
    options: BatchOptions,
    progress: Arc<ProgressTracker>,
    milestones: Vec<Milestone>,
    simplified_results: Vec<SimplifiedResult>,
    grouped_stats: OnceLock<GroupedStats>,
}

impl Batch {
    pub fn new(records: Vec<Record>, action: ApiAction, api: SharedApi, options: BatchOptions) -> Self {
        let progress = Arc::new(ProgressTracker::new(records.len()));
        Self {
            records,
            action,
            api,
            options,
            progress,
            milestones: Vec::new(),
            simplified_results: Vec::new(),
            grouped_stats: OnceLock::new(),
        }
    }

    pub fn action(&self) -> ApiAction {
        self.action
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Shared counter of slots fired in the current or last run.
    pub fn progress(&self) -> Arc<ProgressTracker> {
        self.progress.clone()
    }

    /// Milestones of the current or last run, in the order slots fired.
    pub fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    pub fn simplified_results(&self) -> &[SimplifiedResult] {
        &self.simplified_results
    }

    /// Results grouped by status label. Computed on first access after `process`.
    pub fn grouped_stats(&self) -> &GroupedStats {
        self.grouped_stats
            .get_or_init(|| group_by_status(&self.simplified_results))
    }

    pub fn response_counts(&self) -> BTreeMap<String, usize> {
        response_counts(self.grouped_stats())
    }

    /// Runs every record and returns `(response, body)` results in input order.
    ///
    /// Any failure the executor doesn't suppress aborts the whole batch:
    /// outstanding tasks are cancelled and finished results are dropped.
    pub async fn process(&mut self) -> Result<Vec<ExecutionResult>, BatchError> {
        self.progress.reset();
        self.milestones.clear();
        self.simplified_results.clear();
        self.grouped_stats = OnceLock::new();

        let started = Instant::now();
        let (milestone_tx, mut milestone_rx) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();
        for (index, record) in self.records.iter().cloned().enumerate() {
            let api = self.api.clone();
            let progress = self.progress.clone();
            let milestone_tx = milestone_tx.clone();
            let action = self.action;
            let request_options = self.options.request;
            let offset = self
                .options
                .delay_increment
                .saturating_mul(u32::try_from(index).unwrap_or(u32::MAX));

            tasks.spawn(async move {
                sleep_until(started + offset).await;
                // The slot counts as sent before its request completes.
                let _ = milestone_tx.send(progress.advance());
                let result =
                    request::perform(api.as_ref(), &record, index, action, &request_options).await;
                (index, result)
            });
        }
        drop(milestone_tx);

        let outcome = self.collect(&mut tasks, &mut milestone_rx).await;
        while let Ok(milestone) = milestone_rx.try_recv() {
            self.record_milestone(milestone);
        }
        if self.options.log_progress {
            self.log_end(started);
        }

        let responses = outcome?;
        self.simplified_results = simplify_results(&responses);
        Ok(responses)
    }

    fn record_milestone(&mut self, milestone: Milestone) {
        if self.options.log_progress {
            milestone.log(self.action);
        }
        self.milestones.push(milestone);
    }

    async fn collect(
        &mut self,
        tasks: &mut JoinSet<(usize, Result<ExecutionResult, request::error::RequestError>)>,
        milestones: &mut mpsc::UnboundedReceiver<Milestone>,
    ) -> Result<Vec<ExecutionResult>, BatchError> {
        let mut slots: Vec<Option<ExecutionResult>> = vec![None; self.records.len()];
        loop {
            let joined = tokio::select! {
                biased;
                Some(milestone) = milestones.recv() => {
                    self.record_milestone(milestone);
                    continue;
                }
                joined = tasks.join_next() => joined,
            };
            match joined {
                None => break,
                Some(Ok((index, Ok(result)))) => slots[index] = Some(result),
                Some(Ok((index, Err(source)))) => {
                    tasks.abort_all();
                    error!(
                        "{} batch aborted at record {}: {}",
                        self.action, index, source
                    );
                    return Err(BatchError::Request {
                        action: self.action.to_string(),
                        source,
                    });
                }
                Some(Err(err)) => {
                    tasks.abort_all();
                    return Err(err.into());
                }
            }
        }
        Ok(slots.into_iter().flatten().collect())
    }

    fn log_end(&self, started: Instant) {
        let Some(last) = self.milestones.last() else {
            return;
        };
        if last.is_complete() {
            let (sent, total) = (last.sent, last.total);
            info!(
                "{} ({} of {}) in {}s.",
                format!("{} - batch completed", self.action).green(),
                sent.green(),
                total.green(),
                started.elapsed().as_secs().green()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::error::RequestError;
    use crate::test_support::{json_response, text_response, MockApi, Scripted};
    use serde_json::{json, Value};

    fn records(value: Value) -> Vec<Record> {
        serde_json::from_value(value).expect("fixture should be an array of objects")
    }

    fn quiet(delay_increment: Duration) -> BatchOptions {
        BatchOptions {
            log_progress: false,
            delay_increment,
            request: RequestOptions::default(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn staggers_starts_by_the_delay_increment() {
        let api: SharedApi = Arc::new(MockApi::always(Scripted::Response(json_response(
            201,
            json!({}),
        ))));
        let mut batch = Batch::new(
            records(json!([{}, {}, {}, {}])),
            ApiAction::Create,
            api,
            BatchOptions::default(),
        );

        let started = Instant::now();
        let results = batch.process().await.expect("batch should succeed");

        assert_eq!(results.len(), 4);
        assert_eq!(started.elapsed(), DELAY_INCREMENT * 3);
        assert_eq!(batch.progress().sent(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn slots_count_as_sent_before_responses_arrive() {
        let api: SharedApi = Arc::new(MockApi::always(Scripted::Delayed(
            Duration::from_secs(60),
            json_response(201, json!({})),
        )));
        let mut batch = Batch::new(
            records(json!([{}, {}, {}, {}, {}, {}, {}, {}, {}, {}])),
            ApiAction::Create,
            api,
            quiet(Duration::from_millis(10)),
        );
        let progress = batch.progress();

        let handle = tokio::spawn(async move {
            let outcome = batch.process().await;
            (batch, outcome)
        });

        // Last slot fires at 90ms; every request is still waiting on the api.
        tokio::time::sleep(Duration::from_millis(95)).await;
        assert_eq!(progress.sent(), 10);
        assert!(!handle.is_finished());

        let (batch, outcome) = handle.await.expect("batch task should not panic");
        assert_eq!(outcome.expect("batch should succeed").len(), 10);

        let sent: Vec<usize> = batch.milestones().iter().map(|m| m.sent).collect();
        assert_eq!(sent, (1..=10).collect::<Vec<_>>());
        let deciles: Vec<usize> = batch.milestones().iter().filter_map(|m| m.decile).collect();
        assert_eq!(deciles, (1..=10).collect::<Vec<_>>());
        assert!(batch.milestones()[0].started);
        assert!(batch.milestones()[9].is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn grouped_stats_sum_to_record_count() {
        let api: SharedApi = Arc::new(MockApi::new(vec![
            Scripted::Response(json_response(201, json!({"id": "a"}))),
            Scripted::Failure("connection reset".into()),
            Scripted::Response(text_response(429, "Too Many Requests")),
            Scripted::Response(json_response(201, json!({"id": "b"}))),
            Scripted::Response(json_response(422, json!({"messages": ["bad"]}))),
        ]));
        let mut batch = Batch::new(
            records(json!([{}, {}, {}, {}, {}])),
            ApiAction::Create,
            api,
            quiet(Duration::from_millis(10)),
        );

        let results = batch.process().await.expect("suppressed failures don't abort");

        let total: usize = batch.grouped_stats().values().map(|g| g.count).sum();
        assert_eq!(total, results.len());
        assert_eq!(total, 5);

        let counts = batch.response_counts();
        assert_eq!(counts.get("201"), Some(&2));
        assert_eq!(counts.get("request-failure"), Some(&1));
        assert_eq!(counts.get("429"), Some(&1));
        assert_eq!(counts.get("422"), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn results_keep_input_order() {
        let api: SharedApi = Arc::new(MockApi::always(Scripted::Response(json_response(
            200,
            json!({}),
        ))));
        let mut batch = Batch::new(
            records(json!([{"id": "a"}, {"id": "b"}, {"id": "c"}])),
            ApiAction::Update,
            api,
            quiet(Duration::from_millis(5)),
        );

        let results = batch.process().await.expect("batch should succeed");
        assert_eq!(results.len(), 3);
        assert_eq!(batch.simplified_results().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_id_aborts_the_batch() {
        let api: SharedApi = Arc::new(MockApi::always(Scripted::Response(json_response(
            200,
            json!({}),
        ))));
        let mut batch = Batch::new(
            records(json!([{"id": "a"}, {"city": "no id"}, {"id": "c"}])),
            ApiAction::Update,
            api,
            quiet(Duration::from_millis(5)),
        );

        let err = batch.process().await.expect_err("missing id must abort");

        assert!(matches!(
            err,
            BatchError::Request {
                source: RequestError::InvalidArgument(_),
                ..
            }
        ));
        assert!(batch.simplified_results().is_empty());
        assert!(batch.grouped_stats().is_empty());
    }

    #[tokio::test]
    async fn empty_batches_finish_immediately() {
        let api: SharedApi = Arc::new(MockApi::default());
        let mut batch = Batch::new(vec![], ApiAction::Create, api, BatchOptions::default());

        let results = batch.process().await.expect("nothing to do");

        assert!(results.is_empty());
        assert!(batch.response_counts().is_empty());
    }
}
