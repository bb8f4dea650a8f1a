use serde::Serialize;

/// How close the countdown is to running out.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Normal,
    Warning,
    Critical,
}

/// What a single tick did to the countdown.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Tick {
    /// Time remains. Carries the new urgency if it just changed.
    Running(Option<Urgency>),
    /// This tick took the countdown to zero. Happens exactly once.
    Expired,
    /// The countdown had already run out.
    Finished,
}

/// The budget for one ballot and the urgency thresholds, all in seconds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CountdownSpec {
    pub budget: u32,
    pub warning_at: u32,
    pub critical_at: u32,
}

impl Default for CountdownSpec {
    /// Thirty minutes, warning at ten, critical at five.
    fn default() -> Self {
        Self {
            budget: 30 * 60,
            warning_at: 10 * 60,
            critical_at: 5 * 60,
        }
    }
}

/// A countdown that moves one second per tick.
#[derive(Debug, Clone)]
pub struct Countdown {
    spec: CountdownSpec,
    remaining: u32,
    expired: bool,
}

impl Countdown {
    pub fn new(spec: CountdownSpec) -> Self {
        Self {
            spec,
            remaining: spec.budget,
            expired: false,
        }
    }

    /// Seconds left.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn urgency(&self) -> Urgency {
        if self.remaining <= self.spec.critical_at {
            Urgency::Critical
        } else if self.remaining <= self.spec.warning_at {
            Urgency::Warning
        } else {
            Urgency::Normal
        }
    }

    /// Remaining time as `MM:SS`.
    pub fn display(&self) -> String {
        format!("{:02}:{:02}", self.remaining / 60, self.remaining % 60)
    }

    pub fn tick(&mut self) -> Tick {
        if self.expired {
            return Tick::Finished;
        }
        let before = self.urgency();
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.expired = true;
            return Tick::Expired;
        }
        let after = self.urgency();
        Tick::Running((after != before).then_some(after))
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(CountdownSpec::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_countdown_shows_thirty_minutes() {
        let countdown = Countdown::default();
        assert_eq!(1800, countdown.remaining());
        assert_eq!("30:00", countdown.display());
        assert_eq!(Urgency::Normal, countdown.urgency());
    }

    #[test]
    fn expires_exactly_once_after_the_full_budget() {
        let mut countdown = Countdown::default();
        let mut expiries = 0;
        for _ in 0..1799 {
            match countdown.tick() {
                Tick::Expired => expiries += 1,
                Tick::Finished => panic!("finished before expiring"),
                Tick::Running(_) => {}
            }
        }
        assert_eq!(0, expiries);
        assert_eq!(1, countdown.remaining());
        assert_eq!("00:01", countdown.display());

        assert_eq!(Tick::Expired, countdown.tick());
        assert_eq!(0, countdown.remaining());
        assert!(countdown.is_expired());

        for _ in 0..10 {
            assert_eq!(Tick::Finished, countdown.tick());
        }
        assert_eq!(0, countdown.remaining());
    }

    #[test]
    fn urgency_changes_at_two_thresholds() {
        let mut countdown = Countdown::default();
        let mut changes = Vec::new();
        loop {
            match countdown.tick() {
                Tick::Running(Some(urgency)) => changes.push((countdown.remaining(), urgency)),
                Tick::Running(None) => {}
                Tick::Expired | Tick::Finished => break,
            }
        }
        assert_eq!(vec![(600, Urgency::Warning), (300, Urgency::Critical)], changes);
    }

    #[test]
    fn display_pads_minutes_and_seconds() {
        let mut countdown = Countdown::new(CountdownSpec {
            budget: 605,
            ..Default::default()
        });
        assert_eq!("10:05", countdown.display());
        for _ in 0..6 {
            countdown.tick();
        }
        assert_eq!("09:59", countdown.display());
        assert_eq!(Urgency::Warning, countdown.urgency());
    }

    #[test]
    fn zero_budget_expires_on_first_tick() {
        let mut countdown = Countdown::new(CountdownSpec {
            budget: 0,
            ..Default::default()
        });
        assert_eq!(Tick::Expired, countdown.tick());
        assert_eq!(Tick::Finished, countdown.tick());
    }
}
