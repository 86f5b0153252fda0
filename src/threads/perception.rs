//! Perception thread: detection, novelty gating and decision episodes.
//!
//! A decision episode starts only when the filtered label set contains
//! something not already explained. Within an episode at most one action is
//! in flight: each request waits for its matching feedback (bounded by the
//! feedback timeout) before the next decision is asked for.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::actions::{Action, ActionRequest, Feedback, FeedbackStatus};
use crate::channels::FrameSubscriber;
use crate::collaborators::{Detector, Frame};
use crate::config::GarudaConfig;
use crate::decision::{Choice, DecisionSession};
use crate::error::{GarudaError, Result};
use crate::perception::{DetectionFilter, LabelTracker};
use crate::shared::{MissionStats, SharedState};

// Granularity of shutdown checks while blocked on a channel
const POLL_SLICE: Duration = Duration::from_millis(100);

/// How an episode ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EpisodeOutcome {
    /// Scene assessed as not needing a rescue
    Dismissed,
    /// Decision process chose `none` after these actions
    Finished { actions: Vec<Action> },
    /// Action budget for one episode exhausted
    ActionLimit { actions: Vec<Action> },
}

/// Perception thread state and logic.
pub struct PerceptionThread {
    frames: FrameSubscriber,
    detector: Arc<dyn Detector>,
    filter: DetectionFilter,
    tracker: LabelTracker,
    session: DecisionSession,
    actions: Sender<ActionRequest>,
    feedback: Receiver<Feedback>,
    shared_state: Arc<SharedState>,
    next_seq: u64,
    feedback_timeout: Duration,
    max_actions: usize,
}

impl PerceptionThread {
    pub fn new(
        config: &GarudaConfig,
        frames: FrameSubscriber,
        detector: Arc<dyn Detector>,
        session: DecisionSession,
        actions: Sender<ActionRequest>,
        feedback: Receiver<Feedback>,
        shared_state: Arc<SharedState>,
    ) -> Self {
        Self {
            frames,
            detector,
            filter: DetectionFilter {
                min_box_height: config.perception.min_box_height,
                min_confidence: config.perception.min_confidence,
            },
            tracker: LabelTracker::new(),
            session,
            actions,
            feedback,
            shared_state,
            next_seq: 0,
            feedback_timeout: config.feedback_timeout(),
            max_actions: config.coordination.max_actions_per_episode,
        }
    }

    pub fn known_labels(&self) -> &BTreeSet<String> {
        self.tracker.known()
    }

    /// Run until shutdown or the frame producer goes away.
    pub fn run(&mut self) -> Result<()> {
        tracing::info!("Perception thread started");

        loop {
            if self.shared_state.should_shutdown() {
                tracing::info!("Perception thread shutting down");
                break;
            }

            let frame = match self.frames.next(POLL_SLICE) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(_) => {
                    tracing::info!("Frame producer gone, perception thread exiting");
                    break;
                }
            };

            match self.process_frame(frame) {
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(GarudaError::ShuttingDown) => {
                    tracing::info!("Episode abandoned, perception thread shutting down");
                    break;
                }
                Err(GarudaError::ChannelClosed(name)) => {
                    tracing::info!("{} channel closed, perception thread exiting", name);
                    break;
                }
                Err(e) => tracing::warn!("Frame processing failed: {}", e),
            }
        }

        Ok(())
    }

    /// Detect, gate on novelty and run an episode when warranted.
    ///
    /// Returns `None` when the frame held nothing new.
    pub fn process_frame(&mut self, frame: Frame) -> Result<Option<EpisodeOutcome>> {
        let detections = self.detector.detect(&frame)?;
        let labels = self.filter.labels(&detections);
        if !self.tracker.is_novel(&labels) {
            return Ok(None);
        }

        tracing::info!(
            "New labels in frame {}: {:?} (known: {:?})",
            frame.id,
            labels,
            self.tracker.known()
        );
        MissionStats::bump(&self.shared_state.stats.episodes);

        let result = self.run_episode(&labels, frame);
        self.session.reset();

        match &result {
            Err(e) if e.is_fatal() => {}
            Err(GarudaError::ChannelClosed(_) | GarudaError::ShuttingDown) => {}
            _ => self.tracker.mark_known(labels),
        }

        let outcome = result?;
        tracing::info!("Episode ended: {:?}", outcome);
        Ok(Some(outcome))
    }

    fn run_episode(&mut self, labels: &BTreeSet<String>, mut frame: Frame) -> Result<EpisodeOutcome> {
        if !self.session.assess(labels, &frame)? {
            return Ok(EpisodeOutcome::Dismissed);
        }

        for _ in 0..self.max_actions {
            if let Some(latest) = self.frames.latest() {
                frame = latest;
            }

            let action = match self.session.choose(labels, &frame)? {
                Choice::Done => {
                    return Ok(EpisodeOutcome::Finished {
                        actions: self.session.history().to_vec(),
                    });
                }
                Choice::Act(action) => action,
            };

            self.next_seq += 1;
            let request = ActionRequest {
                seq: self.next_seq,
                action,
            };
            self.actions
                .send(request)
                .map_err(|_| GarudaError::ChannelClosed("action"))?;
            MissionStats::bump(&self.shared_state.stats.actions_requested);
            tracing::info!("Requested action '{}' (seq {})", action, request.seq);

            let feedback = self.wait_feedback(request)?;
            tracing::info!("Feedback for '{}': {}", action, feedback.message);
            match feedback.status {
                FeedbackStatus::Rejected => self.session.correct(feedback.message),
                FeedbackStatus::Completed | FeedbackStatus::Failed => {
                    self.session.record(action, feedback.message)
                }
            }
        }

        tracing::warn!("Episode hit the limit of {} actions", self.max_actions);
        Ok(EpisodeOutcome::ActionLimit {
            actions: self.session.history().to_vec(),
        })
    }

    /// Block until feedback for `request` arrives. Stale feedback is discarded.
    fn wait_feedback(&mut self, request: ActionRequest) -> Result<Feedback> {
        let deadline = Instant::now() + self.feedback_timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                MissionStats::bump(&self.shared_state.stats.feedback_timeouts);
                return Err(GarudaError::FeedbackTimeout {
                    action: request.action.to_string(),
                    waited: self.feedback_timeout,
                });
            }
            if self.shared_state.should_shutdown() {
                return Err(GarudaError::ShuttingDown);
            }

            match self.feedback.recv_timeout(remaining.min(POLL_SLICE)) {
                Ok(feedback) if feedback.seq == request.seq => return Ok(feedback),
                Ok(stale) => tracing::debug!(
                    "Discarding stale feedback seq {} (waiting for {})",
                    stale.seq,
                    request.seq
                ),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(GarudaError::ChannelClosed("feedback"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{action_channel, feedback_channel, frame_channel};
    use crate::collaborators::{BoundingBox, Detection};
    use crate::decision::ScriptedRescue;
    use crate::geometry::Position;

    struct FixedDetector(Vec<Detection>);

    impl Detector for FixedDetector {
        fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>> {
            Ok(self.0.clone())
        }
    }

    fn person() -> Detection {
        Detection {
            label: "person".into(),
            bbox: BoundingBox::new(900.0, 300.0, 1000.0, 600.0),
            confidence: 0.9,
        }
    }

    fn frame() -> Frame {
        Frame {
            id: 1,
            width: 1920,
            height: 1080,
            pixels: Arc::from(Vec::new()),
            position: Position::ZERO,
            heading: 0.0,
            captured_at: Instant::now(),
        }
    }

    struct Harness {
        thread: PerceptionThread,
        actions: Receiver<ActionRequest>,
        feedback: Sender<Feedback>,
        shared: Arc<SharedState>,
    }

    fn harness(detections: Vec<Detection>, timeout_ms: u64) -> Harness {
        let mut config = GarudaConfig::default();
        config.coordination.feedback_timeout_ms = timeout_ms;
        let (_publisher, subscriber) = frame_channel();
        let (action_tx, action_rx) = action_channel();
        let (feedback_tx, feedback_rx) = feedback_channel();
        let session = DecisionSession::new(Box::new(ScriptedRescue::new("person")), 3);
        let shared = Arc::new(SharedState::new());
        let thread = PerceptionThread::new(
            &config,
            subscriber,
            Arc::new(FixedDetector(detections)),
            session,
            action_tx,
            feedback_rx,
            Arc::clone(&shared),
        );
        Harness {
            thread,
            actions: action_rx,
            feedback: feedback_tx,
            shared,
        }
    }

    /// Answers every request with completed feedback, plus a stale one first.
    fn spawn_responder(actions: Receiver<ActionRequest>, feedback: Sender<Feedback>) {
        std::thread::spawn(move || {
            for request in actions.iter() {
                let _ = feedback.send(Feedback {
                    seq: request.seq.wrapping_sub(100),
                    action: request.action,
                    status: FeedbackStatus::Completed,
                    message: "stale".into(),
                });
                let _ = feedback.send(Feedback {
                    seq: request.seq,
                    action: request.action,
                    status: FeedbackStatus::Completed,
                    message: format!("{} done", request.action),
                });
            }
        });
    }

    #[test]
    fn test_empty_scene_starts_no_episode() {
        let mut h = harness(Vec::new(), 1000);
        assert_eq!(h.thread.process_frame(frame()).unwrap(), None);
        assert!(h.actions.try_recv().is_err());
    }

    #[test]
    fn test_person_runs_full_rescue_once() {
        let Harness {
            mut thread,
            actions,
            feedback,
            ..
        } = harness(vec![person()], 5000);
        spawn_responder(actions, feedback);

        let outcome = thread.process_frame(frame()).unwrap();
        assert_eq!(
            outcome,
            Some(EpisodeOutcome::Finished {
                actions: vec![
                    Action::MoveTo,
                    Action::Broadcast,
                    Action::Drop,
                    Action::Console,
                    Action::SeekNext
                ]
            })
        );
        assert!(thread.known_labels().contains("person"));

        // Same scene again is already explained
        assert_eq!(thread.process_frame(frame()).unwrap(), None);
    }

    #[test]
    fn test_missing_feedback_times_out_and_marks_known() {
        let mut h = harness(vec![person()], 50);

        let err = h.thread.process_frame(frame()).unwrap_err();
        assert!(matches!(err, GarudaError::FeedbackTimeout { .. }));
        assert!(!err.is_fatal());

        // Exactly one action was in flight
        assert_eq!(h.actions.try_iter().count(), 1);
        assert!(h.thread.known_labels().contains("person"));
        drop(h.feedback);
    }

    #[test]
    fn test_shutdown_abandons_episode_without_marking_known() {
        let mut h = harness(vec![person()], 5000);
        h.shared.signal_shutdown();

        let started = Instant::now();
        let err = h.thread.process_frame(frame()).unwrap_err();
        assert!(matches!(err, GarudaError::ShuttingDown));
        assert!(started.elapsed() < Duration::from_secs(1));

        assert_eq!(h.actions.try_iter().count(), 1);
        assert_eq!(MissionStats::get(&h.shared.stats.feedback_timeouts), 0);
        assert!(!h.thread.known_labels().contains("person"));
        drop(h.feedback);
    }

    #[test]
    fn test_rejected_action_is_not_recorded() {
        let Harness {
            mut thread,
            actions,
            feedback,
            ..
        } = harness(vec![person()], 5000);
        std::thread::spawn(move || {
            for (i, request) in actions.iter().enumerate() {
                let status = if i == 0 {
                    FeedbackStatus::Rejected
                } else {
                    FeedbackStatus::Completed
                };
                let _ = feedback.send(Feedback {
                    seq: request.seq,
                    action: request.action,
                    status,
                    message: String::new(),
                });
            }
        });

        let outcome = thread.process_frame(frame()).unwrap().unwrap();
        // The rejected moveto is asked for again, so the script still completes
        match outcome {
            EpisodeOutcome::Finished { actions } => assert_eq!(actions.len(), 5),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
