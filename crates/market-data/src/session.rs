//! Market session state machine.
//!
//! Maps a wall-clock instant to the exchange's trading session and each
//! session to the TTL a freshly fetched quote receives. Pure functions of
//! time; no holiday calendar is modeled.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Default exchange timezone (US equities).
pub const DEFAULT_EXCHANGE_TZ: Tz = chrono_tz::America::New_York;

pub const DEFAULT_OPEN_TTL_SECS: u32 = 60;
pub const DEFAULT_EXTENDED_TTL_SECS: u32 = 300;
pub const DEFAULT_CLOSED_TTL_SECS: u32 = 600;

/// Trading session of the exchange at a given instant.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketSession {
    /// Regular trading hours.
    Open,
    /// Pre-market or after-hours trading.
    Extended,
    /// Overnight and weekends.
    Closed,
}

impl fmt::Display for MarketSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Extended => write!(f, "EXTENDED"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Snapshot TTL per session, in seconds.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTtls {
    pub open_secs: u32,
    pub extended_secs: u32,
    pub closed_secs: u32,
}

impl Default for SessionTtls {
    fn default() -> Self {
        Self {
            open_secs: DEFAULT_OPEN_TTL_SECS,
            extended_secs: DEFAULT_EXTENDED_TTL_SECS,
            closed_secs: DEFAULT_CLOSED_TTL_SECS,
        }
    }
}

/// Session boundaries in exchange-local time.
#[derive(Clone, Copy, Debug)]
struct SessionHours {
    pre_market_start: NaiveTime,
    regular_start: NaiveTime,
    regular_end: NaiveTime,
    after_hours_end: NaiveTime,
}

impl SessionHours {
    fn us_equities() -> Self {
        // Literal hours are always valid; fall back to midnight to stay total.
        let hm = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN);
        Self {
            pre_market_start: hm(4, 0),
            regular_start: hm(9, 30),
            regular_end: hm(16, 0),
            after_hours_end: hm(20, 0),
        }
    }
}

/// Derives the market session and snapshot TTL from wall-clock time.
#[derive(Clone, Debug)]
pub struct MarketSessionClock {
    timezone: Tz,
    ttls: SessionTtls,
    hours: SessionHours,
}

impl MarketSessionClock {
    /// US equities clock with default TTLs.
    pub fn new() -> Self {
        Self::with_config(DEFAULT_EXCHANGE_TZ, SessionTtls::default())
    }

    pub fn with_config(timezone: Tz, ttls: SessionTtls) -> Self {
        Self {
            timezone,
            ttls,
            hours: SessionHours::us_equities(),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn ttls(&self) -> SessionTtls {
        self.ttls
    }

    /// Session in effect at `now`.
    pub fn current_session(&self, now: DateTime<Utc>) -> MarketSession {
        let local = now.with_timezone(&self.timezone);

        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return MarketSession::Closed;
        }

        let t = local.time();
        let h = &self.hours;
        if t >= h.regular_start && t < h.regular_end {
            MarketSession::Open
        } else if (t >= h.pre_market_start && t < h.regular_start)
            || (t >= h.regular_end && t < h.after_hours_end)
        {
            MarketSession::Extended
        } else {
            MarketSession::Closed
        }
    }

    /// TTL assigned to a quote fetched during `session`.
    pub fn ttl_for_session(&self, session: MarketSession) -> u32 {
        match session {
            MarketSession::Open => self.ttls.open_secs,
            MarketSession::Extended => self.ttls.extended_secs,
            MarketSession::Closed => self.ttls.closed_secs,
        }
    }

    /// Shorthand for `ttl_for_session(current_session(now))`.
    pub fn ttl_at(&self, now: DateTime<Utc>) -> u32 {
        self.ttl_for_session(self.current_session(now))
    }
}

impl Default for MarketSessionClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_regular_hours_are_open() {
        let clock = MarketSessionClock::new();
        // Monday 2024-03-04, EST (UTC-5): 09:30 local
        assert_eq!(clock.current_session(utc(2024, 3, 4, 14, 30)), MarketSession::Open);
        // 15:59 local
        assert_eq!(clock.current_session(utc(2024, 3, 4, 20, 59)), MarketSession::Open);
    }

    #[test]
    fn test_session_boundaries() {
        let clock = MarketSessionClock::new();
        // 09:29 local -> pre-market
        assert_eq!(
            clock.current_session(utc(2024, 3, 4, 14, 29)),
            MarketSession::Extended
        );
        // 16:00 local -> after-hours
        assert_eq!(
            clock.current_session(utc(2024, 3, 4, 21, 0)),
            MarketSession::Extended
        );
        // 04:00 local -> pre-market
        assert_eq!(
            clock.current_session(utc(2024, 3, 4, 9, 0)),
            MarketSession::Extended
        );
        // 03:59 local -> closed
        assert_eq!(
            clock.current_session(utc(2024, 3, 4, 8, 59)),
            MarketSession::Closed
        );
        // 20:00 local -> closed
        assert_eq!(
            clock.current_session(utc(2024, 3, 5, 1, 0)),
            MarketSession::Closed
        );
    }

    #[test]
    fn test_daylight_saving_shift() {
        let clock = MarketSessionClock::new();
        // Monday 2024-07-01, EDT (UTC-4): 13:30 UTC is 09:30 local
        assert_eq!(clock.current_session(utc(2024, 7, 1, 13, 30)), MarketSession::Open);
        // Same UTC time in winter is 08:30 local
        assert_eq!(
            clock.current_session(utc(2024, 1, 8, 13, 30)),
            MarketSession::Extended
        );
    }

    #[test]
    fn test_weekend_is_closed() {
        let clock = MarketSessionClock::new();
        // Saturday 2024-03-02 noon local
        assert_eq!(clock.current_session(utc(2024, 3, 2, 17, 0)), MarketSession::Closed);
        // Sunday 2024-03-03 noon local
        assert_eq!(clock.current_session(utc(2024, 3, 3, 17, 0)), MarketSession::Closed);
    }

    #[test]
    fn test_weekday_uses_exchange_local_date() {
        let clock = MarketSessionClock::new();
        // Saturday 01:00 UTC is still Friday 20:00 local -> closed (not weekend logic)
        assert_eq!(clock.current_session(utc(2024, 3, 2, 1, 0)), MarketSession::Closed);
        // Saturday 00:30 UTC is Friday 19:30 local -> after-hours
        assert_eq!(
            clock.current_session(utc(2024, 3, 2, 0, 30)),
            MarketSession::Extended
        );
    }

    #[test]
    fn test_default_ttls_are_monotonic() {
        let clock = MarketSessionClock::new();
        let open = clock.ttl_for_session(MarketSession::Open);
        let extended = clock.ttl_for_session(MarketSession::Extended);
        let closed = clock.ttl_for_session(MarketSession::Closed);
        assert_eq!((open, extended, closed), (60, 300, 600));
        assert!(open < extended && extended < closed);
    }

    #[test]
    fn test_ttl_overrides() {
        let clock = MarketSessionClock::with_config(
            DEFAULT_EXCHANGE_TZ,
            SessionTtls {
                open_secs: 15,
                extended_secs: 120,
                closed_secs: 3600,
            },
        );
        assert_eq!(clock.ttl_at(utc(2024, 3, 4, 15, 0)), 15);
        assert_eq!(clock.ttl_at(utc(2024, 3, 2, 15, 0)), 3600);
    }
}
