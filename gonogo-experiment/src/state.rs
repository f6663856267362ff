use std::time::Duration;

use gonogo_core::{Feedback, Phase, RESPONSE_KEY, TrialResult, TrialSpec, TrialState, Word};
use gonogo_timing::Timer;

use crate::config::ExperimentConfig;
use crate::schedule::TrialSchedule;
use crate::trial::{Trial, TrialDurations, TrialTimestamps};

#[derive(Debug, Clone, PartialEq)]
pub enum ExperimentEvent {
    /// Any key on a message screen.
    AdvancePressed,
    /// SPACE during a trial's response window.
    ResponseReceived,
    CalibrationComplete,
    TrialComplete,
    PhaseComplete,
}

/// Drives one session through its phases, playing back the pre-generated
/// schedule and appending to the result log. Time only moves when the
/// caller polls `update`; the timer is the single clock.
pub struct ExperimentStateMachine<P, T>
where
    P: Phase,
    T: Timer,
{
    pub phase: P,
    pub timer: T,
    pub config: ExperimentConfig<P>,
    schedule: TrialSchedule,
    current: Option<Trial<T::Timestamp>>,
    trial_number: usize,
    phase_trial_number: usize,
    results: Vec<TrialResult>,
    calibrated: bool,
    safe_margin_ns: u64,
    last_feedback: Option<Feedback>,
}

impl<P, T> ExperimentStateMachine<P, T>
where
    P: Phase,
    T: Timer<Timestamp = u64>,
{
    pub fn new(config: ExperimentConfig<P>, schedule: TrialSchedule, timer: T) -> Self {
        Self {
            phase: P::default(),
            timer,
            config,
            schedule,
            current: None,
            trial_number: 0,
            phase_trial_number: 0,
            results: Vec::new(),
            calibrated: false,
            safe_margin_ns: 0,
            last_feedback: None,
        }
    }

    pub fn advance_phase(&mut self) -> bool {
        if let Some(next) = self.phase.next() {
            self.phase = next;
            self.phase_trial_number = 0;
            self.current = None;
            self.last_feedback = None;
            true
        } else {
            false
        }
    }

    pub fn apply_calibration(&mut self) {
        let stats = self.timer.calibration_stats();
        self.safe_margin_ns = (stats.jitter_ns * 3.0) as u64;
        self.calibrated = true;
        println!(
            "Calibration: {:.3} ms/frame, {:.1} Hz, jitter {:.3} ms, safe margin {} ns",
            stats.average_frame_time_ns / 1_000_000.0,
            stats.effective_fps,
            stats.jitter_ns / 1_000_000.0,
            self.safe_margin_ns,
        );
    }

    pub fn start_trial(&mut self) {
        let Some(spec) = self
            .phase_specs()
            .get(self.phase_trial_number)
            .copied()
        else {
            return;
        };

        let now_ns = self.timer.now();
        self.last_feedback = None;
        self.current = Some(Trial {
            id: self.trial_number,
            spec,
            durations: TrialDurations {
                fixation_ms: self.config.fixation_ms,
                response_window_ms: self.config.response_window_ms,
                feedback_ms: self.config.feedback_ms,
            },
            timestamps: TrialTimestamps {
                start: now_ns,
                stimulus_start: None,
                response: None,
                feedback_start: None,
            },
            state: TrialState::Fixation,
        });
        println!(
            "Trial {} ({}) started at {} ns",
            self.trial_number,
            spec.word.text(),
            now_ns
        );
    }

    /// Polls the clock and returns the events that became due. The caller
    /// feeds them back through `handle_event`.
    pub fn update(&mut self) -> Vec<ExperimentEvent> {
        let mut events = Vec::new();

        match self.phase {
            phase if phase.is_message() => {}
            phase if phase.requires_calibration() => {
                if !self.calibrated && self.timer.frame_count() >= self.config.calibration_frames {
                    events.push(ExperimentEvent::CalibrationComplete);
                }
            }
            phase if phase.allows_response() => {
                self.update_trial(&mut events);

                if self.current.is_none() && self.phase_trial_number >= self.phase_target() {
                    events.push(ExperimentEvent::PhaseComplete);
                }
            }
            _ => {}
        }

        events
    }

    pub fn handle_event(&mut self, event: ExperimentEvent) -> bool {
        match (&self.phase, &event) {
            // Message screens hold until a keypress; entering a trial phase
            // starts its first trial.
            (phase, ExperimentEvent::AdvancePressed) if phase.is_message() => {
                if self.advance_phase() {
                    if self.phase.allows_response() {
                        self.start_trial();
                    }
                    true
                } else {
                    // Debrief was the last screen; the session is over.
                    false
                }
            }

            (phase, ExperimentEvent::CalibrationComplete) if phase.requires_calibration() => {
                self.apply_calibration();
                self.advance_phase()
            }

            (phase, ExperimentEvent::ResponseReceived)
                if phase.allows_response()
                    && self
                        .current
                        .as_ref()
                        .is_some_and(|t| t.state == TrialState::Response) =>
            {
                self.record_response();
                true
            }

            (phase, ExperimentEvent::TrialComplete) if phase.allows_response() => {
                self.complete_current_trial();
                true
            }

            (_, ExperimentEvent::PhaseComplete) => self.advance_phase(),

            _ => false,
        }
    }

    fn update_trial(&mut self, events: &mut Vec<ExperimentEvent>) {
        if !self.calibrated {
            return;
        }

        let now_ns = self.timer.now();
        let safe_margin_ns = self.safe_margin_ns;
        let mut feedback = None;

        if let Some(trial) = self.current.as_mut() {
            match trial.state {
                TrialState::Fixation => {
                    if now_ns - trial.timestamps.start >= trial.durations.fixation_ms * 1_000_000 {
                        trial.state = TrialState::Response;
                        trial.timestamps.stimulus_start = Some(now_ns);
                    }
                }
                TrialState::Response => {
                    // The margin keeps a response landing on the last frame
                    // inside the window.
                    let window_ns =
                        trial.durations.response_window_ms * 1_000_000 + safe_margin_ns;
                    if let Some(onset) = trial.timestamps.stimulus_start {
                        if now_ns - onset >= window_ns {
                            if trial.spec.is_practice {
                                trial.state = TrialState::Feedback;
                                trial.timestamps.feedback_start = Some(now_ns);
                                feedback = Some(Feedback::for_outcome(trial.spec.is_go, false));
                            } else {
                                trial.state = TrialState::Complete;
                            }
                        }
                    }
                }
                TrialState::Feedback => {
                    if let Some(shown) = trial.timestamps.feedback_start {
                        if now_ns - shown >= trial.durations.feedback_ms * 1_000_000 {
                            trial.state = TrialState::Complete;
                        }
                    }
                }
                TrialState::Complete => {
                    events.push(ExperimentEvent::TrialComplete);
                }
            }
        }

        if feedback.is_some() {
            self.last_feedback = feedback;
        }
    }

    /// Records a response for the current trial during its response window.
    /// The state transition out of `Response` is what cancels the pending
    /// timeout.
    pub fn record_response(&mut self) {
        let now_ns = self.timer.now();
        let mut feedback = None;

        if let Some(trial) = self.current.as_mut() {
            if trial.state != TrialState::Response {
                return;
            }
            trial.timestamps.response = Some(now_ns);

            let rt_ns = now_ns - trial.timestamps.stimulus_start.unwrap_or(now_ns);
            println!(
                "Response recorded at {} ns, RT = {:.3} ms",
                now_ns,
                rt_ns as f64 / 1_000_000.0
            );

            if trial.spec.is_practice {
                trial.state = TrialState::Feedback;
                trial.timestamps.feedback_start = Some(now_ns);
                feedback = Some(Feedback::for_outcome(trial.spec.is_go, true));
            } else {
                trial.state = TrialState::Complete;
            }
        }

        if feedback.is_some() {
            self.last_feedback = feedback;
        }
    }

    /// Stores the result of the finished trial and starts the next one in
    /// the block, if any.
    fn complete_current_trial(&mut self) {
        if let Some(trial) = self.current.take() {
            let reaction_ns = trial
                .timestamps
                .response
                .map(|r| r - trial.timestamps.stimulus_start.unwrap_or(r));
            let responded = trial.timestamps.response.is_some();

            self.results.push(TrialResult {
                trial_id: trial.id,
                word: trial.spec.word,
                is_go: trial.spec.is_go,
                is_practice: trial.spec.is_practice,
                response_key: responded.then_some(RESPONSE_KEY),
                reaction_time_ns: reaction_ns,
                correct: trial.spec.is_go == responded,
                timestamp_ns: self.timer.now(),
            });
        }

        self.last_feedback = None;
        self.trial_number += 1;
        self.phase_trial_number += 1;

        self.timer
            .sleep(Duration::from_millis(self.config.inter_trial_interval_ms));

        if self.phase_trial_number < self.phase_target() {
            self.start_trial();
        }
    }

    fn phase_specs(&self) -> &[TrialSpec] {
        if self.phase.is_practice() {
            &self.schedule.practice
        } else if self.phase.is_experiment() {
            &self.schedule.main
        } else {
            &[]
        }
    }

    fn phase_target(&self) -> usize {
        self.phase_specs().len()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn current_phase(&self) -> &P {
        &self.phase
    }

    /// The word of the trial in flight, if any.
    pub fn current_word(&self) -> Option<Word> {
        self.current.as_ref().map(|t| t.spec.word)
    }

    pub fn current_trial_state(&self) -> Option<TrialState> {
        self.current.as_ref().map(|t| t.state)
    }

    /// Feedback for the most recent practice outcome, while it is on screen.
    pub fn last_feedback(&self) -> Option<Feedback> {
        self.last_feedback
    }

    pub fn trial_progress(&self) -> Option<(usize, usize)> {
        let target = self.phase_target();
        if target == 0 {
            None
        } else {
            Some(((self.phase_trial_number + 1).min(target), target))
        }
    }

    /// Session result log, in completion order.
    pub fn results(&self) -> &[TrialResult] {
        &self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gonogo_core::GoNoGoPhase;
    use gonogo_timing::CalibrationStats;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    /// A hand-cranked clock; clones share the same time source so tests can
    /// advance it while the state machine owns its copy.
    #[derive(Clone, Default)]
    struct ManualTimer {
        now_ns: Arc<AtomicU64>,
        frames: Arc<AtomicUsize>,
    }

    impl ManualTimer {
        fn advance_ms(&self, ms: u64) {
            self.now_ns.fetch_add(ms * 1_000_000, Ordering::SeqCst);
        }
    }

    impl Timer for ManualTimer {
        type Timestamp = u64;

        fn now(&self) -> u64 {
            self.now_ns.load(Ordering::SeqCst)
        }

        fn elapsed(&self, ts: u64) -> Duration {
            Duration::from_nanos(self.now().saturating_sub(ts))
        }

        fn sleep(&self, _d: Duration) {}

        fn record_frame(&mut self, _d: Duration) {
            self.frames.fetch_add(1, Ordering::SeqCst);
        }

        fn frame_count(&self) -> usize {
            self.frames.load(Ordering::SeqCst)
        }

        fn calibration_stats(&self) -> CalibrationStats {
            CalibrationStats {
                average_frame_time_ns: 16_000_000.0,
                jitter_ns: 0.0,
                min_frame_time_ns: 16_000_000.0,
                max_frame_time_ns: 16_000_000.0,
                effective_fps: 62.5,
            }
        }
    }

    type Machine = ExperimentStateMachine<GoNoGoPhase, ManualTimer>;

    fn tick(machine: &mut Machine) {
        for event in machine.update() {
            machine.handle_event(event);
        }
    }

    /// Drives the machine through Welcome, Calibration and Instructions,
    /// leaving it at the start of the practice block.
    fn start_session(practice: &[TrialSpec], main: &[TrialSpec]) -> (Machine, ManualTimer) {
        let clock = ManualTimer::default();
        let config = ExperimentConfig::<GoNoGoPhase>::default();
        let schedule = TrialSchedule {
            practice: practice.to_vec(),
            main: main.to_vec(),
        };
        let mut machine = Machine::new(config, schedule, clock.clone());

        assert!(machine.handle_event(ExperimentEvent::AdvancePressed));
        assert_eq!(machine.phase, GoNoGoPhase::Calibration);
        for _ in 0..machine.config.calibration_frames {
            machine.timer.record_frame(Duration::from_millis(16));
        }
        tick(&mut machine);
        assert!(machine.is_calibrated());
        assert_eq!(machine.phase, GoNoGoPhase::Instructions);

        assert!(machine.handle_event(ExperimentEvent::AdvancePressed));
        (machine, clock)
    }

    /// Runs an empty practice block through to the main block.
    fn start_main_block(main: &[TrialSpec]) -> (Machine, ManualTimer) {
        let (mut machine, clock) = start_session(&[], main);
        tick(&mut machine);
        assert_eq!(machine.phase, GoNoGoPhase::PracticeEnd);
        assert!(machine.handle_event(ExperimentEvent::AdvancePressed));
        assert_eq!(machine.phase, GoNoGoPhase::Experiment);
        (machine, clock)
    }

    #[test]
    fn practice_go_response_is_correct_and_timed() {
        let specs = [TrialSpec::new(Word::Rood, true)];
        let (mut machine, clock) = start_session(&specs, &[]);

        assert_eq!(machine.current_trial_state(), Some(TrialState::Fixation));
        clock.advance_ms(500);
        tick(&mut machine);
        assert_eq!(machine.current_trial_state(), Some(TrialState::Response));
        assert_eq!(machine.current_word(), Some(Word::Rood));

        clock.advance_ms(430);
        assert!(machine.handle_event(ExperimentEvent::ResponseReceived));
        assert_eq!(machine.current_trial_state(), Some(TrialState::Feedback));
        assert_eq!(machine.last_feedback(), Some(Feedback::Hit));

        clock.advance_ms(1000);
        tick(&mut machine);
        tick(&mut machine);

        let result = &machine.results()[0];
        assert!(result.is_practice);
        assert!(result.correct);
        assert_eq!(result.response_key, Some(RESPONSE_KEY));
        assert_eq!(result.reaction_time_ms(), Some(430));
    }

    #[test]
    fn practice_false_alarm_shows_incorrect_feedback() {
        let specs = [TrialSpec::new(Word::Blauw, true)];
        let (mut machine, clock) = start_session(&specs, &[]);

        clock.advance_ms(500);
        tick(&mut machine);
        clock.advance_ms(100);
        assert!(machine.handle_event(ExperimentEvent::ResponseReceived));
        assert_eq!(machine.last_feedback(), Some(Feedback::FalseAlarm));

        clock.advance_ms(1000);
        tick(&mut machine);
        tick(&mut machine);

        let result = &machine.results()[0];
        assert!(!result.correct);
        assert_eq!(result.response_key, Some(RESPONSE_KEY));
    }

    #[test]
    fn main_go_timeout_is_incorrect_with_no_reaction_time() {
        let specs = [TrialSpec::new(Word::Geel, false)];
        let (mut machine, clock) = start_main_block(&specs);

        clock.advance_ms(500);
        tick(&mut machine);
        assert_eq!(machine.current_trial_state(), Some(TrialState::Response));

        clock.advance_ms(2000);
        tick(&mut machine);
        // Main-block trials complete without a feedback state.
        assert_eq!(machine.current_trial_state(), Some(TrialState::Complete));
        assert_eq!(machine.last_feedback(), None);
        tick(&mut machine);

        let result = &machine.results()[0];
        assert!(!result.is_practice);
        assert!(!result.correct);
        assert_eq!(result.response_key, None);
        assert_eq!(result.reaction_time_ns, None);
    }

    #[test]
    fn main_nogo_timeout_is_correct() {
        let specs = [TrialSpec::new(Word::Blauw, false)];
        let (mut machine, clock) = start_main_block(&specs);

        clock.advance_ms(500);
        tick(&mut machine);
        clock.advance_ms(2000);
        tick(&mut machine);
        tick(&mut machine);

        let result = &machine.results()[0];
        assert!(result.correct);
        assert_eq!(result.response_key, None);
        assert_eq!(result.reaction_time_ns, None);
    }

    #[test]
    fn main_response_completes_without_feedback() {
        let specs = [TrialSpec::new(Word::Rood, false)];
        let (mut machine, clock) = start_main_block(&specs);

        clock.advance_ms(500);
        tick(&mut machine);
        clock.advance_ms(300);
        assert!(machine.handle_event(ExperimentEvent::ResponseReceived));
        assert_eq!(machine.current_trial_state(), Some(TrialState::Complete));
        assert_eq!(machine.last_feedback(), None);
        tick(&mut machine);

        let result = &machine.results()[0];
        assert!(result.correct);
        assert_eq!(result.reaction_time_ms(), Some(300));
    }

    #[test]
    fn responses_outside_the_window_are_ignored() {
        let specs = [TrialSpec::new(Word::Rood, false)];
        let (mut machine, clock) = start_main_block(&specs);

        // Still in fixation: the press must not count.
        assert!(!machine.handle_event(ExperimentEvent::ResponseReceived));
        assert_eq!(machine.current_trial_state(), Some(TrialState::Fixation));

        clock.advance_ms(500);
        tick(&mut machine);
        clock.advance_ms(2000);
        tick(&mut machine);
        // Window already expired: too late.
        assert!(!machine.handle_event(ExperimentEvent::ResponseReceived));
        tick(&mut machine);

        assert_eq!(machine.results()[0].response_key, None);
    }

    #[test]
    fn session_walks_every_phase_in_order() {
        let practice = [TrialSpec::new(Word::Rood, true)];
        let main = [TrialSpec::new(Word::Blauw, false)];
        let (mut machine, clock) = start_session(&practice, &main);
        assert_eq!(machine.phase, GoNoGoPhase::Practice);

        clock.advance_ms(500);
        tick(&mut machine);
        clock.advance_ms(2000);
        tick(&mut machine); // timeout -> feedback
        clock.advance_ms(1000);
        tick(&mut machine); // feedback done -> complete
        tick(&mut machine); // trial complete
        tick(&mut machine); // phase complete
        assert_eq!(machine.phase, GoNoGoPhase::PracticeEnd);

        assert!(machine.handle_event(ExperimentEvent::AdvancePressed));
        assert_eq!(machine.phase, GoNoGoPhase::Experiment);

        clock.advance_ms(500);
        tick(&mut machine);
        clock.advance_ms(2000);
        tick(&mut machine);
        tick(&mut machine);
        tick(&mut machine);
        assert_eq!(machine.phase, GoNoGoPhase::Debrief);
        assert_eq!(machine.results().len(), 2);

        // A keypress on the debrief screen ends the session.
        assert!(!machine.handle_event(ExperimentEvent::AdvancePressed));
    }

    #[test]
    fn progress_counts_trials_within_the_block() {
        let main = [
            TrialSpec::new(Word::Rood, false),
            TrialSpec::new(Word::Blauw, false),
        ];
        let (mut machine, clock) = start_main_block(&main);
        assert_eq!(machine.trial_progress(), Some((1, 2)));

        clock.advance_ms(500);
        tick(&mut machine);
        clock.advance_ms(2000);
        tick(&mut machine);
        tick(&mut machine);
        assert_eq!(machine.trial_progress(), Some((2, 2)));
    }
}
