//! Fleet-wide status summaries
//!
//! A report is computed on demand from the current head of each entity's
//! schedule and is never stored.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Anything with a current status of type `S`.
pub trait StatusSource<S> {
    fn current_status(&self) -> S;
}

/// Count and share of one status value within a report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusGroup {
    pub count: usize,
    /// Share of the total in percent, rounded to two decimals.
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport<S: Ord> {
    generated_at: DateTime<Utc>,
    total: usize,
    groups: BTreeMap<S, StatusGroup>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl<S: Ord + Copy> StatusReport<S> {
    /// Groups the given status values. An empty input yields an empty
    /// report with a total of zero.
    pub fn from_values(values: impl IntoIterator<Item = S>) -> Self {
        let mut counts: BTreeMap<S, usize> = BTreeMap::new();
        let mut total = 0usize;
        for value in values {
            *counts.entry(value).or_default() += 1;
            total += 1;
        }

        let groups = counts
            .into_iter()
            .map(|(status, count)| {
                let percentage = round2(100.0 * count as f64 / total as f64);
                (status, StatusGroup { count, percentage })
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            total,
            groups,
        }
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn count(&self, status: S) -> usize {
        self.groups.get(&status).map(|g| g.count).unwrap_or(0)
    }

    pub fn percentage(&self, status: S) -> f64 {
        self.groups.get(&status).map(|g| g.percentage).unwrap_or(0.0)
    }

    /// Groups ordered by status value.
    pub fn groups(&self) -> impl Iterator<Item = (S, StatusGroup)> + '_ {
        self.groups.iter().map(|(status, group)| (*status, *group))
    }
}

/// Summarises the current status of `entities`.
pub fn generate_status_report<'a, S, E>(entities: impl IntoIterator<Item = &'a E>) -> StatusReport<S>
where
    S: Ord + Copy,
    E: StatusSource<S> + 'a,
{
    StatusReport::from_values(entities.into_iter().map(StatusSource::current_status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status::{AdminStatus, EvseStatus};

    struct Fixed(EvseStatus);

    impl StatusSource<EvseStatus> for Fixed {
        fn current_status(&self) -> EvseStatus {
            self.0
        }
    }

    #[test]
    fn empty_report_is_degenerate() {
        let report = StatusReport::<AdminStatus>::from_values(Vec::new());
        assert!(report.is_empty());
        assert_eq!(report.total(), 0);
        assert_eq!(report.groups().count(), 0);
    }

    #[test]
    fn counts_and_percentages() {
        let entities = vec![
            Fixed(EvseStatus::Available),
            Fixed(EvseStatus::Available),
            Fixed(EvseStatus::Charging),
        ];
        let report: StatusReport<EvseStatus> = generate_status_report(&entities);

        assert_eq!(report.total(), 3);
        assert_eq!(report.count(EvseStatus::Available), 2);
        assert_eq!(report.percentage(EvseStatus::Available), 66.67);
        assert_eq!(report.percentage(EvseStatus::Charging), 33.33);
        assert_eq!(report.count(EvseStatus::Offline), 0);
    }

    #[test]
    fn group_counts_sum_to_total() {
        let values = [
            EvseStatus::Available,
            EvseStatus::Offline,
            EvseStatus::Charging,
            EvseStatus::Charging,
            EvseStatus::Error,
            EvseStatus::Reserved,
            EvseStatus::Available,
        ];
        let report = StatusReport::from_values(values);

        let count_sum: usize = report.groups().map(|(_, g)| g.count).sum();
        let pct_sum: f64 = report.groups().map(|(_, g)| g.percentage).sum();
        assert_eq!(count_sum, report.total());
        assert!((pct_sum - 100.0).abs() < 0.05, "sum was {pct_sum}");
    }

    #[test]
    fn groups_are_ordered_by_status() {
        let report = StatusReport::from_values([EvseStatus::Error, EvseStatus::Available]);
        let order: Vec<_> = report.groups().map(|(s, _)| s).collect();
        assert_eq!(order, vec![EvseStatus::Available, EvseStatus::Error]);
    }
}
