// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Local time-of-day triggers driving the zone engine.

use chrono::{DateTime, Datelike, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// What a trigger does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    DailyRollover,
    HourlyPrecipitation,
    EntityRefresh,
}

/// Repetition period of a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cadence {
    Daily { hour: u32, minute: u32, second: u32 },
    Hourly { minute: u32, second: u32 },
    Minutely { second: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDayTrigger {
    pub kind: TriggerKind,
    cadence: Cadence,
}

/// Rollover runs just after local midnight so the whole day is captured.
pub const DAILY_ROLLOVER: TimeOfDayTrigger = TimeOfDayTrigger::daily(TriggerKind::DailyRollover, 0, 0, 10);
pub const HOURLY_PRECIPITATION: TimeOfDayTrigger =
    TimeOfDayTrigger::hourly(TriggerKind::HourlyPrecipitation, 0, 0);
pub const ENTITY_REFRESH: TimeOfDayTrigger = TimeOfDayTrigger::every_minute(TriggerKind::EntityRefresh, 40);

impl TimeOfDayTrigger {
    pub const fn daily(kind: TriggerKind, hour: u32, minute: u32, second: u32) -> Self {
        Self {
            kind,
            cadence: Cadence::Daily { hour, minute, second },
        }
    }

    pub const fn hourly(kind: TriggerKind, minute: u32, second: u32) -> Self {
        Self {
            kind,
            cadence: Cadence::Hourly { minute, second },
        }
    }

    pub const fn every_minute(kind: TriggerKind, second: u32) -> Self {
        Self {
            kind,
            cadence: Cadence::Minutely { second },
        }
    }

    /// First firing instant strictly after `now`, evaluated in local time.
    ///
    /// A local time that falls into a DST gap moves forward to the first
    /// valid instant; an ambiguous one resolves to the earlier occurrence.
    pub fn next_after(&self, now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
        let local = now.with_timezone(&tz).naive_local();
        let midnight = local.date().and_time(NaiveTime::MIN);
        let (offset, step) = match self.cadence {
            Cadence::Daily { hour, minute, second } => {
                (hour * 3600 + minute * 60 + second, TimeDelta::days(1))
            }
            Cadence::Hourly { minute, second } => {
                (local.hour() * 3600 + minute * 60 + second, TimeDelta::hours(1))
            }
            Cadence::Minutely { second } => (
                local.hour() * 3600 + local.minute() * 60 + second,
                TimeDelta::minutes(1),
            ),
        };
        let mut candidate = midnight + TimeDelta::seconds(i64::from(offset));

        // Bounded walk: a day or two of steps always reaches the future
        for _ in 0..3000 {
            if let Some(fire) = resolve_local(tz, candidate)
                && fire > now
            {
                return fire;
            }
            candidate += step;
        }
        now + step
    }
}

fn resolve_local(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    (0..=2)
        .find_map(|shift| tz.from_local_datetime(&(naive + TimeDelta::hours(shift))).earliest())
        .map(|local| local.with_timezone(&Utc))
}

/// Day of year of the local day that ended at the rollover instant `fired_at`.
pub fn closing_day_of_year(fired_at: DateTime<Utc>, tz: Tz) -> u32 {
    let local = fired_at.with_timezone(&tz);
    let closing = local.date_naive().pred_opt().unwrap_or(local.date_naive());
    closing.ordinal()
}

/// Day of year of the current local day.
pub fn current_day_of_year(now: DateTime<Utc>, tz: Tz) -> u32 {
    now.with_timezone(&tz).ordinal()
}

/// Start of the local day containing `now`, in UTC.
pub fn start_of_local_day(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let midnight = now.with_timezone(&tz).date_naive().and_time(NaiveTime::MIN);
    resolve_local(tz, midnight).unwrap_or(now)
}

#[derive(Debug, Clone)]
struct ArmedTrigger {
    trigger: TimeOfDayTrigger,
    next_fire: DateTime<Utc>,
}

/// Trigger subscriptions of one zone.
///
/// Disarming drops every subscription at once; an armed schedule reports
/// each trigger whose time has come exactly once per occurrence.
#[derive(Debug, Clone, Default)]
pub struct ZoneSchedule {
    triggers: Vec<TimeOfDayTrigger>,
    armed: Vec<ArmedTrigger>,
}

impl ZoneSchedule {
    pub fn new(triggers: Vec<TimeOfDayTrigger>) -> Self {
        Self {
            triggers,
            armed: Vec::new(),
        }
    }

    pub fn is_armed(&self) -> bool {
        !self.armed.is_empty()
    }

    pub fn arm(&mut self, now: DateTime<Utc>, tz: Tz) {
        self.armed = self
            .triggers
            .iter()
            .map(|trigger| ArmedTrigger {
                trigger: *trigger,
                next_fire: trigger.next_after(now, tz),
            })
            .collect();
    }

    pub fn disarm(&mut self) {
        self.armed.clear();
    }

    pub fn next_fire(&self, kind: TriggerKind) -> Option<DateTime<Utc>> {
        self.armed
            .iter()
            .find(|armed| armed.trigger.kind == kind)
            .map(|armed| armed.next_fire)
    }

    /// Collect triggers due at `now` with their scheduled instants, and
    /// re-arm each for its next occurrence.
    ///
    /// Missed occurrences collapse into one firing.
    pub fn take_due(&mut self, now: DateTime<Utc>, tz: Tz) -> Vec<(TriggerKind, DateTime<Utc>)> {
        let mut due = Vec::new();
        for armed in &mut self.armed {
            if armed.next_fire <= now {
                due.push((armed.trigger.kind, armed.next_fire));
                armed.next_fire = armed.trigger.next_after(now, tz);
            }
        }
        due
    }
}
