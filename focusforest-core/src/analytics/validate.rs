//! Boundary checks for engine input.
//!
//! Bad input is rejected with [`Error::InvalidInput`] before anything is
//! computed, so a stored snapshot is never replaced by one derived from a
//! malformed history.

use crate::error::{Error, Result};
use crate::types::{FocusSession, MAX_DURATION_MINUTES, MIN_DURATION_MINUTES};

/// Inclusive range of accepted session lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationBounds {
    pub min: u32,
    pub max: u32,
}

impl Default for DurationBounds {
    fn default() -> Self {
        Self {
            min: MIN_DURATION_MINUTES,
            max: MAX_DURATION_MINUTES,
        }
    }
}

/// Reject durations outside `bounds`.
pub fn validate_duration(minutes: u32, bounds: DurationBounds) -> Result<()> {
    if minutes < bounds.min || minutes > bounds.max {
        return Err(Error::InvalidInput(format!(
            "duration_minutes must be between {} and {}, got {}",
            bounds.min, bounds.max, minutes
        )));
    }
    Ok(())
}

/// Reject a session whose completion flag and end time disagree.
pub fn validate_session(session: &FocusSession) -> Result<()> {
    match (session.completed, session.ended_at.is_some()) {
        (true, false) => Err(Error::InvalidInput(format!(
            "session {} is marked completed but has no ended_at",
            session.id
        ))),
        (false, true) => Err(Error::InvalidInput(format!(
            "pending session {} carries an ended_at",
            session.id
        ))),
        _ => validate_duration(session.duration_minutes, DurationBounds::default()),
    }
}

/// Check a per-user list that claims to hold only completed sessions.
pub fn validate_completed_history(owner_id: &str, completed: &[FocusSession]) -> Result<()> {
    for session in completed {
        if session.owner_id != owner_id {
            return Err(Error::InvalidInput(format!(
                "session {} belongs to {}, not {}",
                session.id, session.owner_id, owner_id
            )));
        }
        if !session.completed || session.ended_at.is_none() {
            return Err(Error::InvalidInput(format!(
                "session {} is in a completed list but has not been completed",
                session.id
            )));
        }
        validate_session(session)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn session(minutes: u32, completed: bool) -> FocusSession {
        let at = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
        let mut s = FocusSession::new("owner", minutes, None, at);
        if completed {
            s.complete(at, None).unwrap();
        }
        s
    }

    #[test]
    fn test_duration_bounds() {
        let bounds = DurationBounds::default();
        assert!(validate_duration(1, bounds).is_ok());
        assert!(validate_duration(180, bounds).is_ok());
        assert!(matches!(
            validate_duration(0, bounds),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            validate_duration(181, bounds),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_pending_in_completed_list() {
        let history = vec![session(25, true), session(25, false)];
        assert!(matches!(
            validate_completed_history("owner", &history),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_completed_flag_without_end() {
        let mut s = session(25, false);
        s.completed = true;
        assert!(validate_completed_history("owner", &[s]).is_err());
    }

    #[test]
    fn test_rejects_foreign_owner_and_bad_duration() {
        let mut foreign = session(25, true);
        foreign.owner_id = "someone-else".to_string();
        assert!(validate_completed_history("owner", &[foreign]).is_err());

        let mut long = session(25, true);
        long.duration_minutes = 500;
        assert!(validate_completed_history("owner", &[long]).is_err());

        assert!(validate_completed_history("owner", &[session(30, true)]).is_ok());
    }

    #[test]
    fn test_pending_with_end_time_rejected() {
        let mut s = session(25, false);
        assert!(validate_session(&s).is_ok());
        s.ended_at = Some(s.started_at);
        assert!(matches!(validate_session(&s), Err(Error::InvalidInput(_))));
    }
}
