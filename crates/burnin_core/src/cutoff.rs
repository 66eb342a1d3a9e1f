//! Cutoff counting over sorted modification times.
//!
//! The collector hands over timestamps sorted ascending, so splitting them at
//! a cutoff is a left bisect: everything strictly before the cutoff is
//! historical, everything at or after it is new. A second bisect at the scan
//! start bounds the "new" window so consecutive scans never overlap.

use crate::collector::FileStamp;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of splitting a listing at one cutoff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CutoffCounts {
    pub total: u64,
    pub historical: u64,
    pub new: u64,
}

/// Left-most insertion point of `cutoff` in ascending `stamps`.
pub fn insertion_index(stamps: &[FileStamp], cutoff: DateTime<Utc>) -> usize {
    stamps.partition_point(|stamp| stamp.modified < cutoff)
}

/// Split `stamps` (ascending) at `cutoff` in O(log n).
pub fn count(stamps: &[FileStamp], cutoff: DateTime<Utc>) -> CutoffCounts {
    if stamps.is_empty() {
        return CutoffCounts::default();
    }
    let total = stamps.len() as u64;
    let historical = insertion_index(stamps, cutoff) as u64;
    CutoffCounts {
        total,
        historical,
        new: total - historical,
    }
}

/// Counts for one scan window `[cutoff, ceiling)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowCounts {
    pub total: u64,
    /// Stamped before the cutoff
    pub historical: u64,
    /// Stamped inside the window
    pub new: u64,
    /// Stamped at or after the ceiling, left for the next scan
    pub deferred: u64,
}

impl WindowCounts {
    /// Every file is historical (bootstrap, or a device frozen for approval).
    pub fn all_historical(total: u64) -> Self {
        Self {
            total,
            historical: total,
            new: 0,
            deferred: 0,
        }
    }
}

/// Split `stamps` into historical / new / deferred with two bisects.
///
/// A ceiling at or before the cutoff yields an empty window.
pub fn count_window(
    stamps: &[FileStamp],
    cutoff: DateTime<Utc>,
    ceiling: DateTime<Utc>,
) -> WindowCounts {
    let at_cutoff = count(stamps, cutoff);
    let at_ceiling = count(stamps, ceiling.max(cutoff));
    WindowCounts {
        total: at_cutoff.total,
        historical: at_cutoff.historical,
        new: at_cutoff.new - at_ceiling.new,
        deferred: at_ceiling.new,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn stamps(offsets: &[i64]) -> Vec<FileStamp> {
        offsets
            .iter()
            .enumerate()
            .map(|(i, s)| FileStamp {
                modified: t(*s),
                name: format!("f{i}"),
            })
            .collect()
    }

    #[test]
    fn empty_listing_is_all_zero() {
        assert_eq!(count(&[], t(0)), CutoffCounts::default());
        assert_eq!(count_window(&[], t(0), t(10)), WindowCounts::default());
    }

    #[test]
    fn cutoff_before_earliest_is_all_new() {
        let s = stamps(&[10, 20, 30]);
        assert_eq!(
            count(&s, t(0)),
            CutoffCounts { total: 3, historical: 0, new: 3 }
        );
    }

    #[test]
    fn cutoff_after_latest_is_all_historical() {
        let s = stamps(&[10, 20, 30]);
        assert_eq!(
            count(&s, t(31)),
            CutoffCounts { total: 3, historical: 3, new: 0 }
        );
    }

    #[test]
    fn equal_timestamps_bisect_left() {
        let s = stamps(&[10, 20, 20, 20, 30]);
        let c = count(&s, t(20));
        assert_eq!(c.historical, 1);
        assert_eq!(c.new, 4);
    }

    #[test]
    fn historical_matches_linear_count() {
        let s = stamps(&[-5, 0, 0, 3, 7, 7, 7, 9, 15, 40]);
        for cutoff in -10..50 {
            let c = count(&s, t(cutoff));
            let linear = s.iter().filter(|st| st.modified < t(cutoff)).count() as u64;
            assert_eq!(c.historical, linear, "cutoff {cutoff}");
            assert_eq!(c.historical + c.new, c.total);
        }
    }

    #[test]
    fn window_partitions_listing() {
        let s = stamps(&[1, 2, 5, 6, 9, 12]);
        let w = count_window(&s, t(5), t(9));
        assert_eq!(
            w,
            WindowCounts { total: 6, historical: 2, new: 2, deferred: 2 }
        );
        assert_eq!(w.historical + w.new + w.deferred, w.total);
    }

    #[test]
    fn consecutive_windows_never_overlap() {
        let s = stamps(&[0, 4, 5, 5, 8, 10, 11, 19, 20]);
        let bounds = [t(-1), t(5), t(10), t(20), t(30)];
        let counted: u64 = bounds
            .windows(2)
            .map(|b| count_window(&s, b[0], b[1]).new)
            .sum();
        assert_eq!(counted, s.len() as u64);
    }

    #[test]
    fn inverted_window_is_empty() {
        let s = stamps(&[1, 2, 3]);
        let w = count_window(&s, t(2), t(2) - Duration::seconds(5));
        assert_eq!(w.new, 0);
        assert_eq!(w.historical + w.deferred, 3);
    }
}
