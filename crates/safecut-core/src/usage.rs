//! Persistent daily usage counters.
//!
//! Three scalar keys hold the state: `date` (ISO calendar day), `usage`
//! (analyses on that day) and `credits` (bonus credits). The count is
//! reset whenever the stored day is not today; credits never are.
//!
//! Storage failures never surface to callers. Reads fall back to zero,
//! writes fall back to keeping the value in memory for the session.

use crate::clock::Clock;
use crate::kv::KeyValueStore;
use crate::types::UsageRecord;
use chrono::NaiveDate;

pub const DATE_KEY: &str = "date";
pub const USAGE_KEY: &str = "usage";
pub const CREDITS_KEY: &str = "credits";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Usage counters backed by a key-value store.
pub struct UsageStore<S, C> {
    kv: S,
    clock: C,
    record: UsageRecord,
    /// False once any write has failed; the in-memory record is then ahead
    /// of storage.
    durable: bool,
}

impl<S: KeyValueStore, C: Clock> UsageStore<S, C> {
    /// Wrap `kv` and immediately [`load`](Self::load) today's record.
    pub fn open(kv: S, clock: C) -> Self {
        let today = clock.today();
        let mut store = Self {
            kv,
            clock,
            record: UsageRecord::empty(today),
            durable: true,
        };
        store.load();
        store
    }

    /// Read date, count and credits from storage.
    ///
    /// If the stored day differs from today (or is missing) the count is
    /// reset to 0 and the reset is written back together with the new date.
    /// The count is written before the date, so an interrupted reset never
    /// pairs today's date with yesterday's count.
    pub fn load(&mut self) -> UsageRecord {
        let today = self.clock.today();
        let stored_date = self.read_date();
        let mut count = self.read_counter(USAGE_KEY);
        let bonus_credits = self.read_counter(CREDITS_KEY);

        if stored_date != Some(today) {
            tracing::info!(
                previous = ?stored_date,
                today = %today,
                discarded = count,
                "new day; resetting usage count"
            );
            count = 0;
            self.write(USAGE_KEY, "0");
            self.write(DATE_KEY, &today.format(DATE_FORMAT).to_string());
        }

        self.record = UsageRecord {
            date: today,
            count,
            bonus_credits,
        };
        tracing::debug!(
            date = %today,
            count,
            bonus_credits,
            "usage loaded"
        );
        self.record.clone()
    }

    /// Current record, rolled over to today if the day changed since the
    /// last access.
    ///
    /// Once a write has failed, storage may be behind the in-memory record,
    /// so the rollover happens in memory and keeps the session's credits.
    pub fn refresh(&mut self) -> UsageRecord {
        let today = self.clock.today();
        if self.record.date == today {
            return self.record.clone();
        }
        if self.durable {
            return self.load();
        }

        tracing::info!(
            previous = %self.record.date,
            today = %today,
            discarded = self.record.count,
            "new day; resetting in-memory usage count"
        );
        self.record.date = today;
        self.record.count = 0;
        let credits = self.record.bonus_credits.to_string();
        self.write(USAGE_KEY, "0");
        self.write(CREDITS_KEY, &credits);
        self.write(DATE_KEY, &today.format(DATE_FORMAT).to_string());
        self.record.clone()
    }

    /// Count one completed analysis.
    pub fn record_analysis(&mut self) -> UsageRecord {
        self.refresh();
        let next = self.record.count.saturating_add(1);
        self.write(USAGE_KEY, &next.to_string());
        self.record.count = next;
        tracing::info!(count = next, "analysis recorded");
        self.record.clone()
    }

    /// Add one bonus credit.
    pub fn grant_credit(&mut self) -> UsageRecord {
        self.refresh();
        let next = self.record.bonus_credits.saturating_add(1);
        self.write(CREDITS_KEY, &next.to_string());
        self.record.bonus_credits = next;
        tracing::info!(bonus_credits = next, "bonus credit granted");
        self.record.clone()
    }

    /// Last known record without touching storage.
    pub fn record(&self) -> &UsageRecord {
        &self.record
    }

    /// Whether every write so far reached storage.
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        match self.kv.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "usage read failed; using default");
                None
            }
        }
    }

    fn read_date(&self) -> Option<NaiveDate> {
        let raw = self.read_raw(DATE_KEY)?;
        match NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT) {
            Ok(date) => Some(date),
            Err(e) => {
                tracing::warn!(value = %raw, error = %e, "corrupt stored date");
                None
            }
        }
    }

    fn read_counter(&self, key: &str) -> u32 {
        let Some(raw) = self.read_raw(key) else {
            return 0;
        };
        match raw.trim().parse::<u32>() {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(key, value = %raw, error = %e, "corrupt stored counter; treating as 0");
                0
            }
        }
    }

    fn write(&mut self, key: &str, value: &str) {
        if let Err(e) = self.kv.set(key, value) {
            if self.durable {
                tracing::warn!(
                    key,
                    error = %e,
                    "usage write failed; continuing with in-memory state"
                );
            }
            self.durable = false;
        }
    }
}
