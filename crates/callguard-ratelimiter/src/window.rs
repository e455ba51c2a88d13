use crate::decision::Decision;
use crate::lock;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

const INITIAL_CAPACITY: usize = 1024;

/// Admits at most `max_requests` calls in any trailing window.
///
/// Keeps one timestamp per admitted call; entries older than the window are
/// pruned on every access, so memory is bounded by `max_requests`.
#[derive(Debug)]
pub struct SlidingWindowCounter {
    max_requests: usize,
    window: Duration,
    admitted: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowCounter {
    /// Creates an empty counter.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            admitted: Mutex::new(VecDeque::with_capacity(max_requests.min(INITIAL_CAPACITY))),
        }
    }

    fn prune(&self, admitted: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = admitted.front() {
            if now.saturating_duration_since(*oldest) > self.window {
                admitted.pop_front();
            } else {
                break;
            }
        }
    }

    /// Records an admission if the window has room.
    ///
    /// On rejection the decision carries the time until the oldest retained
    /// admission leaves the window.
    pub fn try_admit(&self) -> Decision {
        let now = Instant::now();
        let mut admitted = lock(&self.admitted);
        self.prune(&mut admitted, now);

        if admitted.len() < self.max_requests {
            admitted.push_back(now);
            return Decision::Admitted;
        }

        let retry_after = admitted
            .front()
            .map(|oldest| {
                self.window
                    .saturating_sub(now.saturating_duration_since(*oldest))
            })
            .unwrap_or(Duration::ZERO);
        Decision::Rejected { retry_after }
    }

    /// Admissions currently inside the window.
    pub fn current_count(&self) -> usize {
        let mut admitted = lock(&self.admitted);
        self.prune(&mut admitted, Instant::now());
        admitted.len()
    }

    /// Configured admissions per window.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Forgets every recorded admission.
    pub fn clear(&self) {
        lock(&self.admitted).clear();
    }
}

#[derive(Debug)]
struct FixedWindowState {
    used: usize,
    window_start: Instant,
}

/// Admits at most `limit` calls per window; the count resets at each boundary.
///
/// Cheaper than [`SlidingWindowCounter`] but allows up to twice the limit across
/// a boundary.
#[derive(Debug)]
pub struct FixedWindowCounter {
    limit: usize,
    window: Duration,
    state: Mutex<FixedWindowState>,
}

impl FixedWindowCounter {
    /// Creates a counter whose first window starts now.
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(FixedWindowState {
                used: 0,
                window_start: Instant::now(),
            }),
        }
    }

    fn roll(&self, state: &mut FixedWindowState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.window_start);
        if elapsed >= self.window {
            // Align to the boundary so idle periods don't shift the grid.
            let windows = (elapsed.as_nanos() / self.window.as_nanos().max(1)) as u32;
            state.window_start += self.window * windows;
            state.used = 0;
        }
    }

    /// Records an admission if the current window has room.
    pub fn try_admit(&self) -> Decision {
        let now = Instant::now();
        let mut state = lock(&self.state);
        self.roll(&mut state, now);

        if state.used < self.limit {
            state.used += 1;
            return Decision::Admitted;
        }

        let into_window = now.saturating_duration_since(state.window_start);
        Decision::Rejected {
            retry_after: self.window.saturating_sub(into_window),
        }
    }

    /// Admissions recorded in the current window.
    pub fn current_count(&self) -> usize {
        let mut state = lock(&self.state);
        self.roll(&mut state, Instant::now());
        state.used
    }

    /// Configured admissions per window.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Starts a fresh, empty window now.
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.used = 0;
        state.window_start = Instant::now();
    }
}
