use crate::surface::ClickAction;

/// Session states, in the order a trial walks through them
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Placement screen, waiting for the operator to press Space
    #[default]
    AwaitingPlacement,
    Iti,
    /// Trial 1 only: the start signal waits for one acknowledgment peck
    CueStart,
    KeyActive,
    OutcomeResolution,
    Reinforced,
    NotReinforced,
    SessionEnd,
}

impl SessionPhase {
    /// Whether a click bound to `action` should be honoured in this phase
    pub fn accepts(&self, action: ClickAction) -> bool {
        use SessionPhase::*;
        match action {
            ClickAction::ItiPeck => matches!(self, Iti),
            ClickAction::StartSignalPress => matches!(self, CueStart),
            ClickAction::BackgroundPeck => self.is_trial(),
            ClickAction::KeyPeck => matches!(self, KeyActive),
            ClickAction::RewardPeck => matches!(self, SessionEnd),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::SessionEnd)
    }

    /// Whether the trial clock is running (cue on screen)
    pub fn is_trial(&self) -> bool {
        matches!(self, SessionPhase::CueStart | SessionPhase::KeyActive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pecks_only_count_in_their_phase() {
        assert!(SessionPhase::KeyActive.accepts(ClickAction::KeyPeck));
        assert!(!SessionPhase::Iti.accepts(ClickAction::KeyPeck));
        assert!(SessionPhase::CueStart.accepts(ClickAction::BackgroundPeck));
        assert!(!SessionPhase::Reinforced.accepts(ClickAction::BackgroundPeck));
        assert!(!SessionPhase::KeyActive.accepts(ClickAction::StartSignalPress));
        assert!(SessionPhase::default() == SessionPhase::AwaitingPlacement);
    }

    #[test]
    fn background_pecks_follow_the_trial_clock() {
        use SessionPhase::*;
        for phase in [AwaitingPlacement, Iti, CueStart, KeyActive, Reinforced, SessionEnd] {
            assert_eq!(phase.accepts(ClickAction::BackgroundPeck), phase.is_trial());
        }
        assert!(!OutcomeResolution.is_trial());
    }
}
