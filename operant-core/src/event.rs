use std::fmt;

/// Kinds of rows written to the session log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StartSignalPress,
    KeyPeck,
    BackgroundPeck,
    ItiPeck,
    ReinforcedTrial,
    NonreinforcedTrial,
    SessionEnds,
}

impl EventKind {
    /// Label written in the `Event` column
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::StartSignalPress => "start_signal_press",
            EventKind::KeyPeck => "key_peck",
            EventKind::BackgroundPeck => "background_peck",
            EventKind::ItiPeck => "ITI_peck",
            EventKind::ReinforcedTrial => "reinforced_trial",
            EventKind::NonreinforcedTrial => "nonreinforced_trial",
            EventKind::SessionEnds => "SessionEnds",
        }
    }

    /// Whether rows of this kind carry pointer coordinates
    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            EventKind::StartSignalPress
                | EventKind::KeyPeck
                | EventKind::BackgroundPeck
                | EventKind::ItiPeck
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
