use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Quiet period before a burst of events becomes one rebuild.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Idle,
    /// Armed timer: fires at `deadline` with the last path seen.
    Pending { deadline: Instant, last: PathBuf },
}

/// Pure debounce state machine.
///
/// Time is passed in explicitly; the owning actor sleeps until
/// [`Debouncer::deadline`] and then calls [`Debouncer::poll`].
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    state: State,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE)
    }
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: State::Idle,
        }
    }

    /// Record an event, arming or re-arming the timer.
    pub fn push(&mut self, path: PathBuf, now: Instant) {
        self.state = State::Pending {
            deadline: now + self.window,
            last: path,
        };
    }

    /// When the armed timer fires, if any.
    pub fn deadline(&self) -> Option<Instant> {
        match &self.state {
            State::Idle => None,
            State::Pending { deadline, .. } => Some(*deadline),
        }
    }

    /// Fire the timer if it is due, returning the last path of the burst.
    pub fn poll(&mut self, now: Instant) -> Option<PathBuf> {
        match &self.state {
            State::Pending { deadline, .. } if now >= *deadline => {
                match std::mem::replace(&mut self.state, State::Idle) {
                    State::Pending { last, .. } => Some(last),
                    State::Idle => None,
                }
            }
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }
}
