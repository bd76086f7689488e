use super::config::CounterPolicy;
use super::timing::{Clock, SystemClock, TimingError, TimingReporter};
use crate::core::transport::EventCounters;
use tracing::debug;

/// State that outlives a single run: event counters, the photon count of the
/// run in flight, and the timing references.
///
/// Owned by the run loop and lent to every component that needs it.
#[derive(Debug)]
pub struct SimulationContext<C: Clock = SystemClock> {
    pub counters: EventCounters,
    photons_requested: u64,
    counters_at_run_start: EventCounters,
    policy: CounterPolicy,
    timing: TimingReporter<C>,
}

impl SimulationContext<SystemClock> {
    pub fn with_system_clock(policy: CounterPolicy) -> Result<Self, TimingError> {
        Self::new(policy, SystemClock)
    }
}

impl<C: Clock> SimulationContext<C> {
    pub fn new(policy: CounterPolicy, clock: C) -> Result<Self, TimingError> {
        Ok(Self {
            counters: EventCounters::default(),
            photons_requested: 0,
            counters_at_run_start: EventCounters::default(),
            policy,
            timing: TimingReporter::new(clock)?,
        })
    }

    /// Prepares the context for a new run of `photons` packets: applies the
    /// counter policy, snapshots the counters and restarts the clocks.
    pub fn begin_run(&mut self, photons: u64) -> Result<(), TimingError> {
        self.photons_requested = photons;
        if self.policy == CounterPolicy::ResetPerRun {
            self.counters = EventCounters::default();
        }
        self.counters_at_run_start = self.counters;
        debug!(
            photons,
            secondary_events = self.counters.secondary_events,
            policy = ?self.policy,
            "Run context prepared."
        );
        self.timing.reset()
    }

    #[inline]
    pub fn photons_requested(&self) -> u64 {
        self.photons_requested
    }

    #[inline]
    pub fn policy(&self) -> CounterPolicy {
        self.policy
    }

    /// Secondary events tallied since the current run began.
    pub fn secondary_events_this_run(&self) -> u64 {
        self.counters.secondary_events - self.counters_at_run_start.secondary_events
    }

    pub fn timing(&self) -> &TimingReporter<C> {
        &self.timing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::timing::tests::ScriptedClock;

    #[test]
    fn accumulating_policy_keeps_counter_across_runs() {
        let clock = ScriptedClock::new(&[0.0]);
        let mut ctx = SimulationContext::new(CounterPolicy::AccumulateAcrossRuns, &clock).unwrap();
        ctx.begin_run(10).unwrap();
        ctx.counters.secondary_events += 4;
        ctx.begin_run(20).unwrap();
        ctx.counters.secondary_events += 3;

        assert_eq!(ctx.photons_requested(), 20);
        assert_eq!(ctx.counters.secondary_events, 7);
        assert_eq!(ctx.secondary_events_this_run(), 3);
    }

    #[test]
    fn reset_policy_zeroes_counter_each_run() {
        let clock = ScriptedClock::new(&[0.0]);
        let mut ctx = SimulationContext::new(CounterPolicy::ResetPerRun, &clock).unwrap();
        ctx.begin_run(10).unwrap();
        ctx.counters.secondary_events += 4;
        ctx.begin_run(10).unwrap();
        assert_eq!(ctx.counters.secondary_events, 0);
        ctx.counters.secondary_events += 2;
        assert_eq!(ctx.secondary_events_this_run(), 2);
    }

    #[test]
    fn begin_run_restarts_wall_clock() {
        let clock = ScriptedClock::new(&[0.0]);
        let mut ctx = SimulationContext::new(CounterPolicy::default(), &clock).unwrap();
        clock.advance_wall(100);
        ctx.begin_run(1).unwrap();
        assert!(ctx.timing().silent_elapsed().abs() < 1e-9);
    }
}
