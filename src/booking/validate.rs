use crate::model::{Interval, Ms};

use super::BookingError;

/// A draft that passed validation: the interval is well-formed and the
/// notification instant is derived.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ValidatedStay {
    pub interval: Interval,
    pub notify_at: Option<Ms>,
}

/// Reject malformed or past intervals and non-positive notification
/// periods. `now` is evaluated once by the caller, in UTC.
pub(crate) fn validate_stay(
    start: Ms,
    end: Ms,
    notify_before: Option<Ms>,
    now: Ms,
) -> Result<ValidatedStay, BookingError> {
    if start >= end {
        return Err(BookingError::InvalidInterval { start, end });
    }
    // start < end, so a past start is the only way either bound is past.
    if start < now {
        return Err(BookingError::BoundInPast { bound: start, now });
    }
    let notify_at = match notify_before {
        Some(d) if d <= 0 => return Err(BookingError::InvalidNotifyPeriod(d)),
        Some(d) => Some(start - d),
        None => None,
    };
    Ok(ValidatedStay {
        interval: Interval::new(start, end),
        notify_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HOUR_MS as H;

    #[test]
    fn accepts_future_interval() {
        let v = validate_stay(10 * H, 20 * H, None, H).unwrap();
        assert_eq!(v.interval, Interval::new(10 * H, 20 * H));
        assert_eq!(v.notify_at, None);
    }

    #[test]
    fn rejects_inverted_and_empty_intervals() {
        assert!(matches!(
            validate_stay(20 * H, 10 * H, None, 0),
            Err(BookingError::InvalidInterval { .. })
        ));
        assert!(matches!(
            validate_stay(10 * H, 10 * H, None, 0),
            Err(BookingError::InvalidInterval { .. })
        ));
    }

    #[test]
    fn rejects_past_start() {
        assert!(matches!(
            validate_stay(H, 20 * H, None, 2 * H),
            Err(BookingError::BoundInPast { .. })
        ));
    }

    #[test]
    fn derives_notify_at() {
        let v = validate_stay(10 * H, 20 * H, Some(2 * H), 0).unwrap();
        assert_eq!(v.notify_at, Some(8 * H));
    }

    #[test]
    fn rejects_non_positive_notify_period() {
        assert!(matches!(
            validate_stay(10 * H, 20 * H, Some(0), 0),
            Err(BookingError::InvalidNotifyPeriod(0))
        ));
        assert!(matches!(
            validate_stay(10 * H, 20 * H, Some(-H), 0),
            Err(BookingError::InvalidNotifyPeriod(_))
        ));
    }
}
