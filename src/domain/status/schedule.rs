//! Bounded, newest-first status timeline owned by one entity.
//!
//! Every explicit status assignment is recorded, even when the value does not
//! change: a push is also an audit event. The schedule never runs empty; it
//! is seeded with the initial status when its owner is constructed and only
//! capacity-driven eviction ever drops entries.

use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::ids::EntityRef;

/// Default number of entries kept per schedule.
pub const DEFAULT_HISTORY_SIZE: NonZeroUsize = match NonZeroUsize::new(15) {
    Some(size) => size,
    None => panic!("history size must be non-zero"),
};

/// One timestamped status value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry<T> {
    pub timestamp: DateTime<Utc>,
    pub value: T,
}

impl<T> StatusEntry<T> {
    pub fn new(value: T, timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, value }
    }
}

impl<T: fmt::Display> fmt::Display for StatusEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.value
        )
    }
}

/// A recorded transition, handed back by [`StatusSchedule::push`] so the
/// caller can forward it to roaming partners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate<T> {
    pub entity: EntityRef,
    pub old: StatusEntry<T>,
    pub new: StatusEntry<T>,
}

impl<T: PartialEq> StatusUpdate<T> {
    /// False when the value was merely re-asserted.
    pub fn is_change(&self) -> bool {
        self.old.value != self.new.value
    }
}

/// Head is stored apart from the tail so the schedule cannot be empty.
#[derive(Debug)]
struct Timeline<T> {
    head: StatusEntry<T>,
    tail: VecDeque<StatusEntry<T>>,
}

#[derive(Debug)]
pub struct StatusSchedule<T> {
    owner: EntityRef,
    max_size: NonZeroUsize,
    timeline: RwLock<Timeline<T>>,
}

impl<T: Clone> StatusSchedule<T> {
    pub fn new(owner: EntityRef, initial: T, at: DateTime<Utc>, max_size: NonZeroUsize) -> Self {
        Self {
            owner,
            max_size,
            timeline: RwLock::new(Timeline {
                head: StatusEntry::new(initial, at),
                tail: VecDeque::with_capacity(max_size.get() - 1),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Timeline<T>> {
        self.timeline.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Timeline<T>> {
        self.timeline.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn owner(&self) -> &EntityRef {
        &self.owner
    }

    pub fn max_size(&self) -> usize {
        self.max_size.get()
    }

    pub fn len(&self) -> usize {
        1 + self.read().tail.len()
    }

    /// Current status value.
    pub fn current(&self) -> T {
        self.read().head.value.clone()
    }

    pub fn current_entry(&self) -> StatusEntry<T> {
        self.read().head.clone()
    }

    /// Records `value` as the new head and evicts the oldest entry once the
    /// schedule is over capacity.
    ///
    /// The caller's clock is trusted: a timestamp older than the current head
    /// is still inserted at the head.
    ///
    /// Writes go through the owning entity (`set_status`/`set_admin_status`),
    /// so the schedule itself is read-only outside the crate.
    pub(crate) fn push(&self, value: T, at: DateTime<Utc>) -> StatusUpdate<T> {
        let new = StatusEntry::new(value, at);
        let mut timeline = self.write();

        if at < timeline.head.timestamp {
            debug!(
                entity = %self.owner,
                head = %timeline.head.timestamp,
                pushed = %at,
                "Status pushed with a timestamp older than the current head"
            );
        }

        let old = std::mem::replace(&mut timeline.head, new.clone());
        timeline.tail.push_front(old.clone());
        timeline.tail.truncate(self.max_size.get() - 1);

        StatusUpdate {
            entity: self.owner.clone(),
            old,
            new,
        }
    }

    /// Newest-first slice of the history.
    ///
    /// Each call works on its own snapshot taken under the read lock, so the
    /// iterator never observes a half-applied push and can be re-created at
    /// will.
    pub fn history(&self, skip: usize, take: usize) -> impl Iterator<Item = StatusEntry<T>> {
        self.history_all().into_iter().skip(skip).take(take)
    }

    pub fn history_all(&self) -> Vec<StatusEntry<T>> {
        let timeline = self.read();
        let mut entries = Vec::with_capacity(1 + timeline.tail.len());
        entries.push(timeline.head.clone());
        entries.extend(timeline.tail.iter().cloned());
        entries
    }

    /// Entries recorded at or after `since`, newest first.
    pub fn entries_since(&self, since: DateTime<Utc>) -> Vec<StatusEntry<T>> {
        self.history_all()
            .into_iter()
            .filter(|entry| entry.timestamp >= since)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::EvseId;
    use crate::domain::status::EvseStatus;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn schedule(max: usize) -> StatusSchedule<EvseStatus> {
        StatusSchedule::new(
            EntityRef::Evse(EvseId::new("E1")),
            EvseStatus::Unspecified,
            t(0),
            NonZeroUsize::new(max).unwrap(),
        )
    }

    fn rendered(entries: &[StatusEntry<EvseStatus>]) -> Vec<String> {
        entries.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn new_schedule_holds_seed_entry() {
        let s = schedule(3);
        assert_eq!(s.len(), 1);
        assert_eq!(s.current(), EvseStatus::Unspecified);
        assert_eq!(s.current_entry().timestamp, t(0));
    }

    #[test]
    fn keeps_two_newest_of_three_pushes() {
        // max size 2: seed is evicted along with A
        let s = schedule(2);
        s.push(EvseStatus::Available, t(1));
        s.push(EvseStatus::Reserved, t(2));
        s.push(EvseStatus::Charging, t(3));

        let history: Vec<_> = s.history(0, usize::MAX).collect();
        assert_eq!(
            rendered(&history),
            vec![
                StatusEntry::new(EvseStatus::Charging, t(3)).to_string(),
                StatusEntry::new(EvseStatus::Reserved, t(2)).to_string(),
            ]
        );
    }

    #[test]
    fn bounded_history_yields_most_recent_entries() {
        for max in 1..6 {
            let s = schedule(max);
            for i in 1..=20 {
                s.push(if i % 2 == 0 { EvseStatus::Available } else { EvseStatus::Charging }, t(i));
            }
            let history = s.history_all();
            assert_eq!(history.len(), max);
            let expected: Vec<_> = (0..max as i64).map(|k| t(20 - k)).collect();
            let actual: Vec<_> = history.iter().map(|e| e.timestamp).collect();
            assert_eq!(actual, expected);
        }
    }

    #[test]
    fn readers_see_consistent_snapshots_during_pushes() {
        const PUSHES: i64 = 2_000;
        let s = schedule(8);
        let done = std::sync::atomic::AtomicBool::new(false);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 1..=PUSHES {
                    s.push(if i % 2 == 0 { EvseStatus::Available } else { EvseStatus::Charging }, t(i));
                }
                done.store(true, std::sync::atomic::Ordering::Release);
            });

            let mut snapshots = 0;
            while !done.load(std::sync::atomic::Ordering::Acquire) || snapshots == 0 {
                let history = s.history_all();
                assert!(!history.is_empty() && history.len() <= s.max_size());
                assert!(
                    history.windows(2).all(|w| w[0].timestamp > w[1].timestamp),
                    "history not strictly newest-first"
                );
                snapshots += 1;
            }
        });

        assert_eq!(s.len(), 8);
        assert_eq!(s.current_entry().timestamp, t(PUSHES));
    }

    #[test]
    fn max_size_one_keeps_only_head() {
        let s = schedule(1);
        s.push(EvseStatus::Available, t(1));
        s.push(EvseStatus::Offline, t(2));
        assert_eq!(s.len(), 1);
        assert_eq!(s.current(), EvseStatus::Offline);
    }

    #[test]
    fn head_is_last_pushed_value() {
        let s = schedule(5);
        let update = s.push(EvseStatus::Charging, t(10));
        assert_eq!(s.current(), EvseStatus::Charging);
        assert_eq!(update.old.value, EvseStatus::Unspecified);
        assert_eq!(update.new.value, EvseStatus::Charging);
        assert!(update.is_change());
    }

    #[test]
    fn repeated_values_are_recorded() {
        let s = schedule(5);
        s.push(EvseStatus::Available, t(1));
        let update = s.push(EvseStatus::Available, t(2));
        assert!(!update.is_change());
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn out_of_order_timestamp_still_goes_to_head() {
        let s = schedule(5);
        s.push(EvseStatus::Available, t(10));
        s.push(EvseStatus::Offline, t(5));
        let head = s.current_entry();
        assert_eq!(head.value, EvseStatus::Offline);
        assert_eq!(head.timestamp, t(5));
    }

    #[test]
    fn history_skip_take_and_restart() {
        let s = schedule(10);
        for i in 1..=4 {
            s.push(EvseStatus::Available, t(i));
        }
        let page: Vec<_> = s.history(1, 2).map(|e| e.timestamp).collect();
        assert_eq!(page, vec![t(3), t(2)]);

        // a fresh read starts at the head again
        let first = s.history(0, 1).next().unwrap();
        assert_eq!(first.timestamp, t(4));
    }

    #[test]
    fn entries_since_filters_by_timestamp() {
        let s = schedule(10);
        s.push(EvseStatus::Available, t(1));
        s.push(EvseStatus::Charging, t(2));
        let recent = s.entries_since(t(2));
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].value, EvseStatus::Charging);
    }

    #[test]
    fn entry_renders_rfc3339_and_value() {
        let entry = StatusEntry::new(EvseStatus::Available, t(0));
        assert_eq!(entry.to_string(), "2024-05-01T12:00:00.000Z Available");
    }
}
