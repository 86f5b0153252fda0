//! Shared state for the pipeline threads.
//!
//! Only lifecycle and statistics live here. Mission data crosses threads
//! exclusively through the frame, action and feedback channels.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

/// Lifecycle flags and counters shared by all threads.
#[derive(Debug, Default)]
pub struct SharedState {
    /// Shutdown signal for graceful termination
    shutdown: AtomicBool,

    /// First fatal fault reported by any thread
    fault: Mutex<Option<String>>,

    /// Route finished (one-shot survey only)
    route_complete: AtomicBool,

    /// Most recent recoverable navigation fault
    navigation_fault: Mutex<Option<String>>,

    pub stats: MissionStats,
}

/// Counters reported at the end of a mission.
#[derive(Debug, Default)]
pub struct MissionStats {
    pub steps: AtomicU64,
    pub detour_steps: AtomicU64,
    pub blocked_holds: AtomicU64,
    pub navigation_faults: AtomicU64,
    pub waypoints_reached: AtomicU64,
    pub waypoints_skipped: AtomicU64,
    pub frames_captured: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub episodes: AtomicU64,
    pub actions_requested: AtomicU64,
    pub actions_executed: AtomicU64,
    pub feedback_timeouts: AtomicU64,
}

impl MissionStats {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal shutdown.
    pub fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Check if shutdown is signaled.
    pub fn should_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Record a fatal fault and shut everything down. The first reason wins.
    pub fn trigger_fault(&self, reason: String) {
        {
            let mut guard = self.fault.lock();
            if guard.is_none() {
                *guard = Some(reason);
            }
        }
        self.signal_shutdown();
    }

    pub fn fault(&self) -> Option<String> {
        self.fault.lock().clone()
    }

    /// Record a recoverable navigation fault. The vehicle keeps running.
    pub fn report_navigation_fault(&self, reason: String) {
        MissionStats::bump(&self.stats.navigation_faults);
        *self.navigation_fault.lock() = Some(reason);
    }

    pub fn last_navigation_fault(&self) -> Option<String> {
        self.navigation_fault.lock().clone()
    }

    pub fn set_route_complete(&self) {
        self.route_complete.store(true, Ordering::Release);
        self.signal_shutdown();
    }

    pub fn is_route_complete(&self) -> bool {
        self.route_complete.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_fault_wins_and_shuts_down() {
        let state = SharedState::new();
        assert!(!state.should_shutdown());

        state.trigger_fault("drone link lost".into());
        state.trigger_fault("later".into());

        assert!(state.should_shutdown());
        assert_eq!(state.fault().as_deref(), Some("drone link lost"));
    }

    #[test]
    fn test_navigation_fault_is_recorded_without_shutdown() {
        let state = SharedState::new();
        state.report_navigation_fault("boxed in".into());
        state.report_navigation_fault("boxed in again".into());

        assert!(!state.should_shutdown());
        assert!(state.fault().is_none());
        assert_eq!(MissionStats::get(&state.stats.navigation_faults), 2);
        assert_eq!(state.last_navigation_fault().as_deref(), Some("boxed in again"));
    }

    #[test]
    fn test_stats_counters() {
        let state = SharedState::new();
        MissionStats::bump(&state.stats.steps);
        MissionStats::add(&state.stats.steps, 2);
        assert_eq!(MissionStats::get(&state.stats.steps), 3);
    }
}
