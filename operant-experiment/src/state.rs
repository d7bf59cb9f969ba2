use super::config::{ConfigError, SessionConfig, SessionTimings};
use super::layout;
use super::log::{EventRecord, SessionLog, format_session_time};
use super::outcome::resolve_outcome;
use super::sequence::{DEFAULT_MAX_ATTEMPTS, SequenceError, generate_sequence};
use super::stimuli::{StimulusAssignments, StimulusError};
use super::trial::Trial;
use chrono::{DateTime, Local};
use operant_core::{ClickAction, EventKind, SessionPhase, Surface, TrialType};
use operant_hw::{HwError, OperantBox, Peripherals};
use operant_timing::{Timer, TimerQueue};
use rand::Rng;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Stimuli(#[from] StimulusError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error("chamber hardware: {0}")]
    Hardware(#[from] HwError),
}

/// Deferred transitions on the session's timer queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    BeginIti,
    ShowStartSignal,
    BuildKeys,
    ResolveOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    TrialLimit,
    /// Escape key or window closed
    Operator,
    /// External interrupt (signal)
    Interrupted,
    /// Unrecoverable error in the run loop
    Fault,
}

/// Handed to the post-session reward display
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub subject: String,
    pub trials_completed: usize,
    pub reinforced_trials: usize,
    pub data_file: Option<PathBuf>,
    pub reason: Option<EndReason>,
}

pub struct SessionStateMachine<P, S, T, R>
where
    P: Peripherals,
    S: Surface,
    T: Timer,
    R: Rng,
{
    config: SessionConfig,
    timings: SessionTimings,
    phase: SessionPhase,
    chamber: OperantBox<P>,
    surface: S,
    timer: T,
    rng: R,
    queue: TimerQueue<Transition>,
    log: SessionLog,
    sequence: Vec<TrialType>,
    assignments: Option<StimulusAssignments>,
    current: Option<Trial>,
    trial_number: usize,
    reinforced_trials: usize,
    start_ns: u64,
    started_at: Option<DateTime<Local>>,
    cue_acknowledged: bool,
    end_reason: Option<EndReason>,
}

impl<P, S, T, R> SessionStateMachine<P, S, T, R>
where
    P: Peripherals,
    S: Surface,
    T: Timer,
    R: Rng,
{
    /// Builds the session and shows the placement screen. The chamber must
    /// already be open: hardware setup failures never reach this point.
    pub fn new(
        config: SessionConfig,
        chamber: OperantBox<P>,
        surface: S,
        timer: T,
        rng: R,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let timings = config.effective_timings();
        let mut session = Self {
            config,
            timings,
            phase: SessionPhase::AwaitingPlacement,
            chamber,
            surface,
            timer,
            rng,
            queue: TimerQueue::new(),
            log: SessionLog::new(None),
            sequence: Vec::new(),
            assignments: None,
            current: None,
            trial_number: 0,
            reinforced_trials: 0,
            start_ns: 0,
            started_at: None,
            cue_acknowledged: false,
            end_reason: None,
        };
        session.show_placement_screen();
        Ok(session)
    }

    fn show_placement_screen(&mut self) {
        let text = layout::placement_text(
            &self.config.experiment_id,
            &self.config.subject,
            self.config.condition.code(),
        );
        self.clear_surface();
        layout::draw_operator_text(&mut self.surface, &text);
    }

    /// Space pressed: the subject is in the box. Loads the stimulus sheet,
    /// builds the trial order and schedules the first ITI.
    pub fn begin(&mut self) -> Result<(), SessionError> {
        if self.started_at.is_some() || self.phase != SessionPhase::AwaitingPlacement {
            return Ok(());
        }
        info!("Spacebar pressed -- SESSION STARTED");
        self.clear_surface();

        let assignments =
            StimulusAssignments::load(&self.config.assignments_path, &self.config.subject)?;
        let sequence = generate_sequence(
            self.config.condition,
            self.config.max_trials,
            &mut self.rng,
            DEFAULT_MAX_ATTEMPTS,
        )?;

        let now = self.timer.now();
        let started_at = Local::now();
        self.start_ns = now;
        self.started_at = Some(started_at);
        self.assignments = Some(assignments);
        self.sequence = sequence;

        if self.config.record_data {
            self.log.set_path(Some(SessionLog::data_file_path(
                &self.config.data_dir,
                &self.config.subject,
                started_at.naive_local(),
                &self.config.experiment_id,
            )));
        }

        self.queue
            .schedule(now, self.timings.start_delay(), Transition::BeginIti);
        Ok(())
    }

    /// Fires every transition whose deadline has passed, in order.
    /// Returns how many fired.
    pub fn advance(&mut self) -> Result<usize, SessionError> {
        let mut fired = 0;
        while let Some(transition) = self.queue.pop_due(self.timer.now()) {
            if self.phase.is_terminal() {
                break;
            }
            fired += 1;
            match transition {
                Transition::BeginIti => self.iti()?,
                Transition::ShowStartSignal => self.start_signal_period()?,
                Transition::BuildKeys => self.build_keys()?,
                Transition::ResolveOutcome => self.calculate_trial_outcome()?,
            }
        }
        Ok(fired)
    }

    /// Timer reading at which the next transition is due
    pub fn next_deadline(&self) -> Option<u64> {
        self.queue.next_due()
    }

    /// Routes a peck at canvas coordinates. Returns the action it triggered,
    /// if any; reward-screen pecks are returned for the caller to paint.
    pub fn click(&mut self, x: f32, y: f32) -> Result<Option<ClickAction>, SessionError> {
        let Some(action) = self.surface.hit(x, y) else {
            return Ok(None);
        };
        if !self.phase.accepts(action) {
            return Ok(None);
        }
        let position = Some((x.round() as i32, y.round() as i32));
        match action {
            ClickAction::ItiPeck => self.write_data(EventKind::ItiPeck, position),
            ClickAction::BackgroundPeck => {
                if let Some(trial) = &mut self.current {
                    trial.counters.background += 1;
                }
                self.write_data(EventKind::BackgroundPeck, position);
            }
            ClickAction::KeyPeck => {
                if let Some(trial) = &mut self.current {
                    trial.counters.target += 1;
                }
                self.write_data(EventKind::KeyPeck, position);
            }
            ClickAction::StartSignalPress => {
                if self.cue_acknowledged {
                    return Ok(None);
                }
                self.cue_acknowledged = true;
                self.write_data(EventKind::StartSignalPress, position);
                self.clear_surface();
                self.queue.schedule(
                    self.timer.now(),
                    self.timings.cue_ack_delay(),
                    Transition::BuildKeys,
                );
            }
            ClickAction::RewardPeck => {}
        }
        Ok(Some(action))
    }

    /// Every trial starts with an ITI: chamber dark, counters reset, data
    /// flushed, next trial picked. Ends the session once the last trial ran.
    fn iti(&mut self) -> Result<(), SessionError> {
        self.clear_surface();
        layout::draw_background(&mut self.surface, ClickAction::ItiPeck);
        self.chamber.reset_for_iti()?;

        if self.trial_number >= self.config.max_trials {
            info!("Trial max reached");
            self.terminate(EndReason::TrialLimit);
            return Ok(());
        }

        self.phase = SessionPhase::Iti;
        if self.config.show_operator_text {
            layout::draw_operator_text(&mut self.surface, &layout::iti_text(self.timings.iti_ms));
        }

        self.flush_data(false);

        let now = self.timer.now();
        let trial_type = self.sequence[self.trial_number];
        self.trial_number += 1;
        let stimulus = self
            .assignments
            .as_ref()
            .and_then(|a| a.filename_for(trial_type))
            .map(str::to_string);
        let anchor = now.saturating_add(self.timings.iti().as_nanos() as u64);
        self.current = Some(Trial::new(self.trial_number, trial_type, stimulus, anchor));

        let next = if self.trial_number == 1 {
            Transition::ShowStartSignal
        } else {
            Transition::BuildKeys
        };
        self.queue.schedule(now, self.timings.iti(), next);

        info!(
            "{} Trial {} ({}) begins {}",
            "*".repeat(30),
            self.trial_number,
            trial_type,
            "*".repeat(30)
        );
        debug!("{:>30} | Xcord. Ycord. | Trial | Session Time", "Event Type");
        Ok(())
    }

    /// Trial 1 only: one peck on the white square starts the session proper
    fn start_signal_period(&mut self) -> Result<(), SessionError> {
        self.chamber.house_light_on()?;
        self.phase = SessionPhase::CueStart;
        self.clear_surface();
        layout::draw_background(&mut self.surface, ClickAction::BackgroundPeck);
        layout::draw_start_signal(&mut self.surface);
        Ok(())
    }

    fn build_keys(&mut self) -> Result<(), SessionError> {
        let now = self.timer.now();
        if self.trial_number == 1 {
            // the start signal delayed trial 1, so its clock starts here
            if let Some(trial) = &mut self.current {
                trial.anchor_ns = now;
            }
        }
        self.chamber.house_light_on()?;

        self.clear_surface();
        layout::draw_background(&mut self.surface, ClickAction::BackgroundPeck);
        let stimulus = self.current.as_ref().and_then(|t| t.stimulus.clone());
        layout::draw_keys(&mut self.surface, stimulus.as_deref());
        self.phase = SessionPhase::KeyActive;

        self.queue
            .schedule(now, self.timings.trial(), Transition::ResolveOutcome);
        Ok(())
    }

    fn calculate_trial_outcome(&mut self) -> Result<(), SessionError> {
        self.clear_surface();
        self.phase = SessionPhase::OutcomeResolution;

        let Some(trial) = &self.current else {
            return Ok(());
        };
        let (trial_type, pecks) = (trial.trial_type, trial.counters.total());
        let reinforced = resolve_outcome(trial_type, pecks, &mut self.rng);
        info!(
            "Trial {} ({}) with {} peck(s): {}",
            trial.number,
            trial_type,
            pecks,
            if reinforced { "reinforced" } else { "not reinforced" }
        );

        if reinforced {
            self.reinforced_trials += 1;
            self.write_data(EventKind::ReinforcedTrial, None);
            if self.config.show_operator_text {
                layout::draw_operator_text(
                    &mut self.surface,
                    &layout::reinforced_text(self.timings.hopper_ms),
                );
            }
            self.chamber.present_reinforcer()?;
            self.phase = SessionPhase::Reinforced;
            self.queue
                .schedule(self.timer.now(), self.timings.hopper(), Transition::BeginIti);
            Ok(())
        } else {
            self.write_data(EventKind::NonreinforcedTrial, None);
            self.phase = SessionPhase::NotReinforced;
            self.iti()
        }
    }

    /// Ends the session: drops pending timers, clears the screen, parks the
    /// chamber and writes the final data file. Only the first call does
    /// anything; returns whether this call ran the teardown.
    pub fn terminate(&mut self, reason: EndReason) -> bool {
        if self.end_reason.is_some() {
            return false;
        }
        self.end_reason = Some(reason);
        self.queue.clear();
        info!("Session ending ({:?})", reason);

        if let Err(e) = self.surface.clear() {
            warn!("No screen to clear at teardown: {}", e);
        }
        let timer = self.timer.clone();
        if let Err(e) = self.chamber.shutdown(|d| timer.sleep(d)) {
            error!("Chamber shutdown incomplete: {}", e);
        }
        self.flush_data(true);
        self.phase = SessionPhase::SessionEnd;
        true
    }

    fn record(&self, event: EventKind, position: Option<(i32, i32)>) -> EventRecord {
        let now = self.timer.now();
        let trial = self.current.as_ref();
        EventRecord {
            session_time: Duration::from_nanos(now.saturating_sub(self.start_ns)),
            position: position.filter(|_| event.is_pointer()),
            event,
            trial_time_secs: trial.map_or(0.0, |t| t.relative_secs(now)),
            trial_type: trial.map(|t| t.trial_type),
            target_pecks: trial.map_or(0, |t| t.counters.target),
            background_pecks: trial.map_or(0, |t| t.counters.background),
            trial_num: self.trial_number,
            trial_color: trial.and_then(|t| t.stimulus.clone()),
            subject: self.config.subject.clone(),
            date: Local::now().date_naive(),
        }
    }

    fn write_data(&mut self, event: EventKind, position: Option<(i32, i32)>) {
        let record = self.record(event, position);
        let (x, y) = match record.position {
            Some((x, y)) => (x.to_string(), y.to_string()),
            None => ("NA".to_string(), "NA".to_string()),
        };
        debug!(
            "{:>30} | x: {:^4} y: {:^4} | {:^6} | {}",
            event.label(),
            x,
            y,
            record.trial_type.map_or_else(|| "NA".to_string(), |t| t.code()),
            format_session_time(record.session_time)
        );
        self.log.record_event(record);
    }

    /// Rewrites the data file; appends the `SessionEnds` row first when
    /// `session_ended`. Write failures are logged and the session goes on.
    pub fn flush_data(&mut self, session_ended: bool) {
        let end = session_ended.then(|| self.record(EventKind::SessionEnds, None));
        match self.log.flush(end) {
            Ok(Some(path)) => info!("Data file written to {}", path.display()),
            Ok(None) => {}
            Err(e) => error!("{}; keeping data in memory", e),
        }
    }

    fn clear_surface(&mut self) {
        if let Err(e) = self.surface.clear() {
            warn!("No screen to clear: {}", e);
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn timings(&self) -> &SessionTimings {
        &self.timings
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn chamber(&self) -> &OperantBox<P> {
        &self.chamber
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    pub fn sequence(&self) -> &[TrialType] {
        &self.sequence
    }

    pub fn assignments(&self) -> Option<&StimulusAssignments> {
        self.assignments.as_ref()
    }

    pub fn current_trial(&self) -> Option<&Trial> {
        self.current.as_ref()
    }

    /// Trials started so far (ITI cycles that led to a trial)
    pub fn trial_number(&self) -> usize {
        self.trial_number
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.end_reason.is_some()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            subject: self.config.subject.clone(),
            trials_completed: self.trial_number,
            reinforced_trials: self.reinforced_trials,
            data_file: self.log.path().map(PathBuf::from),
            reason: self.end_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{KEY_BOUNDS, iti_text};
    use operant_core::DisplayList;
    use operant_hw::{HopperCalibration, Light, SimulatedPeripherals};
    use operant_timing::ManualTimer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::fs;
    use std::path::Path;

    type TestSession = SessionStateMachine<SimulatedPeripherals, DisplayList, ManualTimer, StdRng>;

    fn write_sheet(dir: &Path) -> PathBuf {
        let path = dir.join("assignments.csv");
        fs::write(
            &path,
            "Subject,INS_2,INS_5,INS_20,INS_50,OMS_2,OMS_5,OMS_20,OMS_50\n\
             TEST,r.png,g.png,b.png,y.png,r.png,g.png,b.png,y.png\n",
        )
        .unwrap();
        path
    }

    fn session(dir: &Path, max_trials: usize) -> (TestSession, ManualTimer) {
        let timer = ManualTimer::new();
        let config = SessionConfig {
            data_dir: dir.join("data"),
            assignments_path: write_sheet(dir),
            max_trials,
            ..SessionConfig::default()
        };
        let chamber = OperantBox::new(SimulatedPeripherals::new(), HopperCalibration::default());
        let rng = StdRng::seed_from_u64(3);
        let s = SessionStateMachine::new(config, chamber, DisplayList::new(), timer.clone(), rng)
            .unwrap();
        (s, timer)
    }

    fn key_center() -> (f32, f32) {
        KEY_BOUNDS.center()
    }

    fn step(s: &mut TestSession, timer: &ManualTimer) {
        let due = s.next_deadline().expect("a transition is pending");
        timer.set(due);
        s.advance().unwrap();
    }

    #[test]
    fn placement_waits_for_space() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut s, timer) = session(tmp.path(), 4);
        assert_eq!(s.phase(), SessionPhase::AwaitingPlacement);
        assert!(s.surface().texts().next().unwrap().contains("press space"));
        timer.advance(Duration::from_secs(60));
        assert_eq!(s.advance().unwrap(), 0);

        s.begin().unwrap();
        assert!(s.has_started());
        assert_eq!(s.sequence().len(), 4);
        // TEST subject: first ITI one second after Space
        assert_eq!(s.next_deadline(), Some(timer.now() + 1_000_000_000));
    }

    #[test]
    fn first_trial_needs_the_start_signal() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut s, timer) = session(tmp.path(), 4);
        s.begin().unwrap();
        step(&mut s, &timer);
        assert_eq!(s.phase(), SessionPhase::Iti);
        assert_eq!(s.trial_number(), 1);
        assert_eq!(s.surface().texts().collect::<Vec<_>>(), vec![iti_text(1000)]);

        step(&mut s, &timer);
        assert_eq!(s.phase(), SessionPhase::CueStart);
        assert!(s.chamber().peripherals().light(Light::House));
        assert_eq!(s.next_deadline(), None);

        // background pecks during the start signal count toward trial 1
        assert_eq!(s.click(5.0, 5.0).unwrap(), Some(ClickAction::BackgroundPeck));
        let (cx, cy) = key_center();
        assert_eq!(s.click(cx, cy).unwrap(), Some(ClickAction::StartSignalPress));
        assert_eq!(s.phase(), SessionPhase::CueStart);
        assert_eq!(s.click(cx, cy).unwrap(), None);

        step(&mut s, &timer);
        assert_eq!(s.phase(), SessionPhase::KeyActive);
        assert_eq!(s.current_trial().unwrap().counters.background, 1);
        let rows = s.log().rows();
        assert_eq!(rows.last().unwrap().event, EventKind::StartSignalPress);
    }

    #[test]
    fn pecks_are_counted_and_logged() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut s, timer) = session(tmp.path(), 4);
        s.begin().unwrap();
        step(&mut s, &timer);
        // ITI pecks are logged but never counted
        assert_eq!(s.click(3.0, 3.0).unwrap(), Some(ClickAction::ItiPeck));
        step(&mut s, &timer);
        let (cx, cy) = key_center();
        s.click(cx, cy).unwrap();
        step(&mut s, &timer);

        timer.advance(Duration::from_millis(500));
        for _ in 0..3 {
            s.click(cx, cy).unwrap();
        }
        s.click(900.0, 700.0).unwrap();
        let trial = s.current_trial().unwrap();
        assert_eq!((trial.counters.target, trial.counters.background), (3, 1));

        let last = s.log().rows().last().unwrap();
        assert_eq!(last.event, EventKind::BackgroundPeck);
        assert_eq!(last.position, Some((900, 700)));
        assert_eq!((last.target_pecks, last.background_pecks), (3, 1));
        assert!((last.trial_time_secs - 0.5).abs() < 1e-9);
        assert_eq!(last.trial_num, 1);
        assert!(last.trial_color.is_some());

        let kinds: Vec<_> = s.log().rows().iter().map(|r| r.event).collect();
        assert_eq!(&kinds[..2], &[EventKind::ItiPeck, EventKind::StartSignalPress]);
        assert_eq!(kinds.len(), 6);
    }

    #[test]
    fn outcome_drives_the_chamber() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut s, timer) = session(tmp.path(), 4);
        s.begin().unwrap();
        step(&mut s, &timer);
        step(&mut s, &timer);
        let (cx, cy) = key_center();
        s.click(cx, cy).unwrap();
        step(&mut s, &timer);
        step(&mut s, &timer);

        let outcome = s.log().rows().last().unwrap().event;
        match outcome {
            EventKind::ReinforcedTrial => {
                assert_eq!(s.phase(), SessionPhase::Reinforced);
                let p = s.chamber().peripherals();
                assert!(p.light(Light::Hopper));
                assert!(!p.light(Light::House));
                assert_eq!(p.servo(), Some(HopperCalibration::default().up));
            }
            EventKind::NonreinforcedTrial => {
                assert_eq!(s.phase(), SessionPhase::Iti);
                assert_eq!(s.trial_number(), 2);
            }
            other => panic!("unexpected last row {other:?}"),
        }
    }

    #[test]
    fn terminate_runs_once_and_parks_the_chamber() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut s, timer) = session(tmp.path(), 4);
        s.begin().unwrap();
        step(&mut s, &timer);
        let before = timer.now();

        assert!(s.terminate(EndReason::Operator));
        assert!(!s.terminate(EndReason::Operator));
        assert_eq!(s.phase(), SessionPhase::SessionEnd);
        assert_eq!(s.next_deadline(), None);
        assert!(s.surface().is_empty());
        // 1 s hopper settle during shutdown
        assert_eq!(timer.now() - before, 1_000_000_000);
        assert!(s.chamber().peripherals().is_stopped());

        let ends = s
            .log()
            .rows()
            .iter()
            .filter(|r| r.event == EventKind::SessionEnds)
            .count();
        assert_eq!(ends, 1);
        let summary = s.summary();
        assert_eq!(summary.reason, Some(EndReason::Operator));
        assert!(summary.data_file.unwrap().exists());
    }

    #[test]
    fn teardown_survives_a_vanished_window() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut s, _timer) = session(tmp.path(), 4);
        s.surface_mut().detach();
        assert!(s.terminate(EndReason::Operator));
        assert!(s.chamber().is_stopped());
    }

    #[test]
    fn missing_subject_row_fails_begin() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut s, _timer) = session(tmp.path(), 4);
        fs::write(&s.config().assignments_path, "Subject,INS_2\nPeach,a.png\n").unwrap();
        assert!(matches!(
            s.begin(),
            Err(SessionError::Stimuli(StimulusError::SubjectNotFound { .. }))
        ));
        assert!(!s.has_started());
    }

    #[test]
    fn disabled_recording_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let (s, _) = session(tmp.path(), 4);
        let mut config = s.config().clone();
        config.record_data = false;
        let timer = ManualTimer::new();
        let chamber = OperantBox::new(SimulatedPeripherals::new(), HopperCalibration::default());
        let rng = StdRng::seed_from_u64(9);
        let mut s =
            SessionStateMachine::new(config, chamber, DisplayList::new(), timer.clone(), rng)
                .unwrap();
        s.begin().unwrap();
        step(&mut s, &timer);
        s.terminate(EndReason::Operator);
        assert!(s.summary().data_file.is_none());
        assert!(!tmp.path().join("data").exists());
        assert_eq!(s.log().rows().last().unwrap().event, EventKind::SessionEnds);
    }
}
