use serde::Serialize;
use std::collections::BTreeMap;

use crate::response::SimplifiedResult;

/// Responses sharing one status label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusGroup {
    pub count: usize,
    pub bodies: Vec<String>,
    pub headers: Vec<String>,
}

pub type GroupedStats = BTreeMap<String, StatusGroup>;

pub fn group_by_status(results: &[SimplifiedResult]) -> GroupedStats {
    results.iter().fold(GroupedStats::new(), |mut acc, result| {
        let group = acc.entry(result.status.clone()).or_default();
        group.count += 1;
        group.bodies.push(result.body.clone());
        group.headers.push(result.headers.clone());
        acc
    })
}

/// `{"200": 10, "404": 1}`
pub fn response_counts(stats: &GroupedStats) -> BTreeMap<String, usize> {
    stats
        .iter()
        .map(|(status, group)| (status.clone(), group.count))
        .collect()
}
