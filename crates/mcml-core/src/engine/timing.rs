use chrono::{DateTime, Local, TimeDelta};
use cpu_time::ProcessTime;
use std::fmt;
use std::io;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum TimingError {
    #[error("Failed to read the process CPU clock: {0}")]
    CpuClock(#[from] io::Error),
}

/// Source of CPU and wall-clock readings.
pub trait Clock {
    /// CPU time consumed by the process so far, in seconds.
    fn cpu_seconds(&self) -> Result<f64, TimingError>;
    fn now(&self) -> DateTime<Local>;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn cpu_seconds(&self) -> Result<f64, TimingError> {
        (**self).cpu_seconds()
    }

    fn now(&self) -> DateTime<Local> {
        (**self).now()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn cpu_seconds(&self) -> Result<f64, TimingError> {
        Ok(ProcessTime::try_now()?.as_duration().as_secs_f64())
    }

    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Output of [`TimingReporter::report_elapsed`].
#[derive(Debug, Clone, PartialEq)]
pub struct ElapsedReport {
    /// "User time: ... sec = ... hr.  <message>"
    pub label: String,
    pub cpu_seconds: f64,
    pub wall_seconds: f64,
}

/// Current and projected completion time of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EtaReport {
    pub now: DateTime<Local>,
    pub end: DateTime<Local>,
}

impl fmt::Display for EtaReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Now {}, End {}",
            self.now.format("%H:%M %x"),
            self.end.format("%H:%M %x")
        )
    }
}

/// Tracks CPU and wall-clock references for one run.
#[derive(Debug)]
pub struct TimingReporter<C: Clock = SystemClock> {
    clock: C,
    cpu_ref: f64,
    wall_ref: DateTime<Local>,
}

impl<C: Clock> TimingReporter<C> {
    pub fn new(clock: C) -> Result<Self, TimingError> {
        let cpu_ref = clock.cpu_seconds()?;
        let wall_ref = clock.now();
        Ok(Self {
            clock,
            cpu_ref,
            wall_ref,
        })
    }

    /// Captures fresh CPU and wall-clock references.
    pub fn reset(&mut self) -> Result<(), TimingError> {
        self.cpu_ref = self.clock.cpu_seconds()?;
        self.wall_ref = self.clock.now();
        Ok(())
    }

    /// Builds the elapsed-time label and returns it together with the elapsed
    /// wall-clock seconds. A CPU reading below the reference (counter wrap)
    /// is reported as zero.
    pub fn report_elapsed(&self, message: &str) -> Result<ElapsedReport, TimingError> {
        let raw = self.clock.cpu_seconds()? - self.cpu_ref;
        let cpu_seconds = if raw < 0.0 {
            warn!(
                elapsed = raw,
                "CPU clock went backwards since the last reset; reporting zero."
            );
            0.0
        } else {
            raw
        };
        let label = format!(
            "User time: {:8.0} sec = {:8.2} hr.  {}",
            cpu_seconds,
            cpu_seconds / 3600.0,
            message
        );
        Ok(ElapsedReport {
            label,
            cpu_seconds,
            wall_seconds: self.silent_elapsed(),
        })
    }

    /// Wall-clock seconds since the last reset.
    pub fn silent_elapsed(&self) -> f64 {
        (self.clock.now() - self.wall_ref)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Projects the completion time by extrapolating the wall-clock rate of
    /// the photons finished so far. `None` before the first photon completes.
    pub fn predict_done_time(&self, completed: u64, total: u64) -> Option<EtaReport> {
        if completed == 0 {
            return None;
        }
        let now = self.clock.now();
        let remaining = total.saturating_sub(completed) as f64;
        let seconds_left = self.silent_elapsed() / completed as f64 * remaining;
        let delta = TimeDelta::try_milliseconds((seconds_left * 1000.0) as i64)?;
        let end = now.checked_add_signed(delta)?;
        Some(EtaReport { now, end })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Clock that replays scripted CPU readings and advances wall time by hand.
    pub(crate) struct ScriptedClock {
        cpu: RefCell<VecDeque<f64>>,
        base: DateTime<Local>,
        wall_offset_ms: Cell<i64>,
    }

    impl ScriptedClock {
        pub(crate) fn new(cpu: &[f64]) -> Self {
            Self {
                cpu: RefCell::new(cpu.iter().copied().collect()),
                base: Local::now(),
                wall_offset_ms: Cell::new(0),
            }
        }

        pub(crate) fn advance_wall(&self, seconds: i64) {
            self.wall_offset_ms
                .set(self.wall_offset_ms.get() + seconds * 1000);
        }
    }

    impl Clock for ScriptedClock {
        fn cpu_seconds(&self) -> Result<f64, TimingError> {
            let mut cpu = self.cpu.borrow_mut();
            let value = cpu.front().copied().unwrap_or(0.0);
            if cpu.len() > 1 {
                cpu.pop_front();
            }
            Ok(value)
        }

        fn now(&self) -> DateTime<Local> {
            self.base + TimeDelta::milliseconds(self.wall_offset_ms.get())
        }
    }

    #[test]
    fn reset_then_silent_elapsed_is_zero() {
        let clock = ScriptedClock::new(&[0.0]);
        let mut timer = TimingReporter::new(&clock).unwrap();
        clock.advance_wall(30);
        timer.reset().unwrap();
        assert!(timer.silent_elapsed().abs() < 1e-9);
    }

    #[test]
    fn system_clock_reset_then_silent_elapsed_is_near_zero() {
        let mut timer = TimingReporter::new(SystemClock).unwrap();
        timer.reset().unwrap();
        assert!(timer.silent_elapsed() < 1.0);
    }

    #[test]
    fn report_elapsed_formats_cpu_time_and_returns_wall_seconds() {
        let clock = ScriptedClock::new(&[10.0, 3610.0]);
        let timer = TimingReporter::new(&clock).unwrap();
        clock.advance_wall(42);
        let report = timer.report_elapsed("Simulation time of this run.").unwrap();
        assert_eq!(report.cpu_seconds, 3600.0);
        assert!((report.wall_seconds - 42.0).abs() < 1e-9);
        assert_eq!(
            report.label,
            "User time:     3600 sec =     1.00 hr.  Simulation time of this run."
        );
    }

    #[test]
    fn report_elapsed_clamps_wrapped_cpu_counter() {
        let clock = ScriptedClock::new(&[500.0, 12.0]);
        let timer = TimingReporter::new(&clock).unwrap();
        let report = timer.report_elapsed("wrapped").unwrap();
        assert_eq!(report.cpu_seconds, 0.0);
        assert!(report.wall_seconds >= 0.0);
        assert!(report.label.starts_with("User time:        0 sec"));
    }

    #[test]
    fn no_projection_before_first_photon() {
        let clock = ScriptedClock::new(&[0.0]);
        let timer = TimingReporter::new(&clock).unwrap();
        assert!(timer.predict_done_time(0, 100).is_none());
    }

    #[test]
    fn projection_extrapolates_wall_rate() {
        let clock = ScriptedClock::new(&[0.0]);
        let timer = TimingReporter::new(&clock).unwrap();
        clock.advance_wall(10);
        let eta = timer.predict_done_time(10, 100).unwrap();
        assert_eq!((eta.end - eta.now).num_seconds(), 90);
        let text = eta.to_string();
        assert!(text.starts_with("Now "));
        assert!(text.contains(", End "));
    }

    #[test]
    fn projection_for_finished_run_ends_now() {
        let clock = ScriptedClock::new(&[0.0]);
        let timer = TimingReporter::new(&clock).unwrap();
        clock.advance_wall(5);
        let eta = timer.predict_done_time(100, 100).unwrap();
        assert_eq!(eta.end, eta.now);
    }
}
