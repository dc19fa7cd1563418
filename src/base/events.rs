use crate::StrError;
use serde::{Deserialize, Serialize};

/// Holds a piecewise-linear cumulative forcing history
///
/// The log stores ordered `(time, cumulative amount)` breakpoints with
/// strictly increasing times and non-decreasing amounts. New events are
/// inserted by linear interpolation at their start and end times and all
/// downstream breakpoints are shifted by the added amount. The sub-day
/// forcing rate at any instant is the slope of the current segment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLog {
    /// Breakpoint times (h), strictly increasing
    times: Vec<f64>,

    /// Cumulative amounts at the breakpoints, non-decreasing
    amounts: Vec<f64>,
}

impl EventLog {
    /// Allocates a new (empty) instance
    pub fn new() -> Self {
        EventLog {
            times: Vec::new(),
            amounts: Vec::new(),
        }
    }

    /// Returns the number of breakpoints
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Returns the cumulative amount at time t
    pub fn cumulative(&self, t: f64) -> f64 {
        let n = self.times.len();
        if n == 0 {
            return 0.0;
        }
        if t <= self.times[0] {
            return self.amounts[0];
        }
        if t >= self.times[n - 1] {
            return self.amounts[n - 1];
        }
        let i = self.segment_of(t);
        let frac = (t - self.times[i]) / (self.times[i + 1] - self.times[i]);
        self.amounts[i] + frac * (self.amounts[i + 1] - self.amounts[i])
    }

    /// Returns the amount delivered between t0 and t1
    pub fn amount_between(&self, t0: f64, t1: f64) -> f64 {
        self.cumulative(t1) - self.cumulative(t0)
    }

    /// Returns the forcing rate (amount/h) at time t
    pub fn rate(&self, t: f64) -> f64 {
        let n = self.times.len();
        if n < 2 || t < self.times[0] || t >= self.times[n - 1] {
            return 0.0;
        }
        let i = self.segment_of(t);
        (self.amounts[i + 1] - self.amounts[i]) / (self.times[i + 1] - self.times[i])
    }

    /// Returns the first breakpoint strictly after t (where the rate may change)
    pub fn next_change(&self, t: f64) -> Option<f64> {
        self.times.iter().find(|&&ti| ti > t).copied()
    }

    /// Inserts an event delivering `amount` uniformly between t0 and t1
    pub fn add(&mut self, t0: f64, t1: f64, amount: f64) -> Result<(), StrError> {
        if t1 <= t0 {
            return Err("event duration must be positive");
        }
        if amount < 0.0 {
            return Err("event amount must be non-negative");
        }
        self.insert_breakpoint(t0);
        self.insert_breakpoint(t1);
        let rate = amount / (t1 - t0);
        for i in 0..self.times.len() {
            if self.times[i] > t0 {
                let reach = f64::min(self.times[i], t1);
                self.amounts[i] += rate * (reach - t0);
            }
        }
        Ok(())
    }

    /// Removes breakpoints older than t, keeping the cumulative value at t
    pub fn purge_before(&mut self, t: f64) {
        if self.times.is_empty() || self.times[0] >= t {
            return;
        }
        self.insert_breakpoint(t);
        let keep = self.times.iter().position(|&ti| ti >= t).unwrap();
        self.times.drain(..keep);
        self.amounts.drain(..keep);
    }

    /// Finds the segment index i such that times[i] <= t < times[i+1]
    fn segment_of(&self, t: f64) -> usize {
        match self.times.binary_search_by(|ti| ti.partial_cmp(&t).unwrap()) {
            Ok(i) => i,
            Err(i) => i - 1,
        }
    }

    /// Ensures a breakpoint exists at time t with the interpolated amount
    fn insert_breakpoint(&mut self, t: f64) {
        let n = self.times.len();
        if n == 0 {
            self.times.push(t);
            self.amounts.push(0.0);
            return;
        }
        if self.times.iter().any(|&ti| ti == t) {
            return;
        }
        if t < self.times[0] {
            let first = self.amounts[0];
            self.times.insert(0, t);
            self.amounts.insert(0, first);
        } else if t > self.times[n - 1] {
            let last = self.amounts[n - 1];
            self.times.push(t);
            self.amounts.push(last);
        } else {
            let i = self.segment_of(t);
            let value = self.cumulative(t);
            self.times.insert(i + 1, t);
            self.amounts.insert(i + 1, value);
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::EventLog;
    use russell_lab::approx_eq;

    fn check_invariants(log: &EventLog) {
        for i in 1..log.times.len() {
            assert!(log.times[i] > log.times[i - 1]);
            assert!(log.amounts[i] >= log.amounts[i - 1]);
        }
    }

    #[test]
    fn empty_log_works() {
        let log = EventLog::new();
        assert_eq!(log.len(), 0);
        assert_eq!(log.cumulative(3.0), 0.0);
        assert_eq!(log.rate(3.0), 0.0);
        assert_eq!(log.next_change(0.0), None);
    }

    #[test]
    fn add_captures_errors() {
        let mut log = EventLog::new();
        assert_eq!(log.add(2.0, 1.0, 5.0).err(), Some("event duration must be positive"));
        assert_eq!(log.add(1.0, 2.0, -1.0).err(), Some("event amount must be non-negative"));
    }

    #[test]
    fn single_event_works() {
        let mut log = EventLog::new();
        log.add(6.0, 7.0, 10.0).unwrap(); // 10 mm over one hour
        check_invariants(&log);
        assert_eq!(log.cumulative(6.0), 0.0);
        approx_eq(log.cumulative(6.5), 5.0, 1e-14);
        assert_eq!(log.cumulative(7.0), 10.0);
        assert_eq!(log.cumulative(9.0), 10.0);
        approx_eq(log.rate(6.25), 10.0, 1e-14);
        assert_eq!(log.rate(8.0), 0.0);
        assert_eq!(log.next_change(6.0), Some(7.0));
        assert_eq!(log.next_change(7.0), None);
    }

    #[test]
    fn overlapping_events_shift_downstream() {
        let mut log = EventLog::new();
        log.add(0.0, 4.0, 8.0).unwrap();
        log.add(1.0, 2.0, 6.0).unwrap();
        check_invariants(&log);
        // baseline 2 mm/h plus the 6 mm burst between 1 and 2
        approx_eq(log.cumulative(1.0), 2.0, 1e-14);
        approx_eq(log.cumulative(2.0), 10.0, 1e-14);
        approx_eq(log.cumulative(4.0), 14.0, 1e-14);
        approx_eq(log.rate(1.5), 8.0, 1e-14);
        approx_eq(log.amount_between(0.0, 4.0), 14.0, 1e-14);
    }

    #[test]
    fn purge_preserves_differences() {
        let mut log = EventLog::new();
        log.add(0.0, 4.0, 8.0).unwrap();
        let before = log.amount_between(1.0, 4.0);
        log.purge_before(1.0);
        check_invariants(&log);
        assert_eq!(log.times[0], 1.0);
        approx_eq(log.amount_between(1.0, 4.0), before, 1e-14);
    }
}
