//! # Featured Windows
//!
//! Staff may promote a project for a bounded number of days. The window is
//! stored as an expiry timestamp and checked at read time; nothing sweeps
//! expired windows. Featuring is independent of status, but only live
//! projects appear in featured listings.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::lifecycle::Lifecycle;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeatureError {
    #[error("feature duration must be between 1 and {max} days, got {days}")]
    DurationOutOfRange { days: i64, max: u32 },
}

/// Set the featured window to end `days` after `now`. Replaces any
/// existing window.
pub fn feature<L: Lifecycle + ?Sized>(
    subject: &mut L,
    days: i64,
    max_days: u32,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, FeatureError> {
    if days < 1 || days > i64::from(max_days) {
        return Err(FeatureError::DurationOutOfRange {
            days,
            max: max_days,
        });
    }
    let until = now + Duration::days(days);
    subject.set_featured_until(Some(until));
    subject.touch(now);
    Ok(until)
}

/// Clear the featured window.
pub fn unfeature<L: Lifecycle + ?Sized>(subject: &mut L, now: DateTime<Utc>) {
    subject.set_featured_until(None);
    subject.touch(now);
}

/// Whether a window is still open at `now`.
pub fn is_featured(until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    until.is_some_and(|until| until > now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dph_core::ProjectStatus;

    #[derive(Default)]
    struct Subject {
        featured_until: Option<DateTime<Utc>>,
        touched: Option<DateTime<Utc>>,
    }

    impl Lifecycle for Subject {
        fn status(&self) -> ProjectStatus {
            ProjectStatus::Live
        }
        fn set_status(&mut self, _status: ProjectStatus) {}
        fn featured_until(&self) -> Option<DateTime<Utc>> {
            self.featured_until
        }
        fn set_featured_until(&mut self, until: Option<DateTime<Utc>>) {
            self.featured_until = until;
        }
        fn touch(&mut self, at: DateTime<Utc>) {
            self.touched = Some(at);
        }
    }

    #[test]
    fn feature_sets_expiry() {
        let now = Utc::now();
        let mut s = Subject::default();
        let until = feature(&mut s, 7, 90, now).unwrap();
        assert_eq!(until, now + Duration::days(7));
        assert_eq!(s.featured_until, Some(until));
        assert_eq!(s.touched, Some(now));
    }

    #[test]
    fn feature_duration_bounds() {
        let now = Utc::now();
        let mut s = Subject::default();
        assert!(feature(&mut s, 0, 90, now).is_err());
        assert!(feature(&mut s, 91, 90, now).is_err());
        assert!(s.featured_until.is_none());
        assert!(feature(&mut s, 90, 90, now).is_ok());
    }

    #[test]
    fn expiry_evaluated_at_read_time() {
        let now = Utc::now();
        assert!(is_featured(Some(now + Duration::seconds(1)), now));
        assert!(!is_featured(Some(now), now));
        assert!(!is_featured(Some(now - Duration::days(1)), now));
        assert!(!is_featured(None, now));
    }

    #[test]
    fn unfeature_clears() {
        let now = Utc::now();
        let mut s = Subject::default();
        feature(&mut s, 3, 90, now).unwrap();
        unfeature(&mut s, now);
        assert!(s.featured_until.is_none());
    }
}
