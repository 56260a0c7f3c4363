use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Retry bookkeeping of a cluster whose last poll(s) failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffState {
    /// Consecutive failed polls
    pub tries: u32,
    /// Earliest time the next poll may happen
    pub next_retry_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterHealth {
    NeverQueried,
    Healthy,
    BackingOff,
}

/// Polling status of one cluster, persisted under `clusters:<id>:status`.
///
/// Written only by the update scheduler. Viewers receive it verbatim in
/// `clusterstatus` events.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterStatus {
    pub last_query_time: Option<DateTime<Utc>>,
    pub backoff: Option<BackoffState>,
}

impl ClusterStatus {
    pub fn health(&self) -> ClusterHealth {
        match (&self.backoff, &self.last_query_time) {
            (Some(_), _) => ClusterHealth::BackingOff,
            (None, Some(_)) => ClusterHealth::Healthy,
            (None, None) => ClusterHealth::NeverQueried,
        }
    }

    /// Whether the cluster may be polled at `now`, honouring both the regular
    /// query interval and a pending backoff.
    pub fn is_query_due(&self, now: DateTime<Utc>, query_interval: Duration) -> bool {
        if let Some(last) = self.last_query_time {
            let interval = chrono::Duration::from_std(query_interval)
                .unwrap_or(chrono::Duration::MAX);
            match last.checked_add_signed(interval) {
                Some(due) if now >= due => {}
                _ => return false,
            }
        }

        match &self.backoff {
            Some(backoff) => now >= backoff.next_retry_time,
            None => true,
        }
    }

    /// Books a failed poll and schedules the next retry `delay` from `now`.
    pub fn record_failure(&mut self, now: DateTime<Utc>, delay: Duration) -> &BackoffState {
        let tries = self.backoff.as_ref().map_or(0, |b| b.tries) + 1;
        let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
        let next_retry_time = now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.backoff.insert(BackoffState {
            tries,
            next_retry_time,
        })
    }

    /// Books a successful poll. Returns the backoff that got cleared, if any.
    pub fn record_success(&mut self, now: DateTime<Utc>) -> Option<BackoffState> {
        // never move backwards, even if the wall clock does
        self.last_query_time = Some(self.last_query_time.map_or(now, |last| last.max(now)));
        self.backoff.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn new_status_is_never_queried_and_due() {
        let status = ClusterStatus::default();
        assert_eq!(status.health(), ClusterHealth::NeverQueried);
        assert!(status.is_query_due(at(0), Duration::from_secs(5)));
    }

    #[test]
    fn query_interval_is_respected() {
        let mut status = ClusterStatus::default();
        status.record_success(at(0));
        assert_eq!(status.health(), ClusterHealth::Healthy);

        assert!(!status.is_query_due(at(4), Duration::from_secs(5)));
        assert!(status.is_query_due(at(5), Duration::from_secs(5)));
    }

    #[test]
    fn failures_count_up_and_push_retry_out() {
        let mut status = ClusterStatus::default();
        let first = status.record_failure(at(0), Duration::from_secs(4)).clone();
        let second = status.record_failure(at(10), Duration::from_secs(8)).clone();

        assert_eq!(first.tries, 1);
        assert_eq!(second.tries, 2);
        assert!(second.next_retry_time > first.next_retry_time);
        assert_eq!(status.health(), ClusterHealth::BackingOff);

        assert!(!status.is_query_due(at(17), Duration::from_secs(5)));
        assert!(status.is_query_due(at(18), Duration::from_secs(5)));
    }

    #[test]
    fn success_clears_backoff_and_keeps_time_monotonic() {
        let mut status = ClusterStatus::default();
        status.record_success(at(100));
        status.record_failure(at(110), Duration::from_secs(4));

        let cleared = status.record_success(at(120));
        assert_eq!(cleared.map(|b| b.tries), Some(1));
        assert_eq!(status.backoff, None);
        assert_eq!(status.last_query_time, Some(at(120)));

        status.record_success(at(50));
        assert_eq!(status.last_query_time, Some(at(120)));
    }

    #[test]
    fn serializes_without_empty_fields() {
        let mut status = ClusterStatus::default();
        assert_eq!(serde_json::to_value(&status).unwrap(), json!({}));

        status.record_failure(at(0), Duration::from_secs(4));
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["backoff"]["tries"], json!(1));
        assert!(value.get("last_query_time").is_none());

        let back: ClusterStatus = serde_json::from_value(value).unwrap();
        assert_eq!(back, status);
    }
}
