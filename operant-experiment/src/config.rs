use operant_core::Contingency;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Subjects run in this experiment, alphabetical
pub const SUBJECT_ROSTER: [&str; 8] = [
    "Hawthorne", "Hendrix", "Herriot", "Iggy", "Itzamna", "Kurt", "Peach", "Wario",
];

/// Operator test subject; runs with shortened delays
pub const TEST_SUBJECT: &str = "TEST";

pub const EXPERIMENT_ID: &str = "P003Fc";

/// Selectable subjects in menu order: the test subject, then the roster
pub fn subject_choices() -> Vec<&'static str> {
    std::iter::once(TEST_SUBJECT)
        .chain(SUBJECT_ROSTER.iter().copied())
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown subject '{0}'")]
    UnknownSubject(String),
    #[error("max trials must be a positive multiple of 4, got {0}")]
    BadTrialCount(usize),
    #[error("experiment id must not be empty")]
    EmptyExperimentId,
    #[error("cannot read timings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid timings: {0}")]
    Timings(#[from] toml::de::Error),
    #[error("cannot create data folder {path}: {source}")]
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Session delays in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTimings {
    /// Space press to first ITI
    pub start_delay_ms: u64,
    pub iti_ms: u64,
    /// Cue on screen per trial
    pub trial_ms: u64,
    /// Hopper raised after a reinforced trial
    pub hopper_ms: u64,
    /// Start-signal peck to the first trial's keys
    pub cue_ack_delay_ms: u64,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            start_delay_ms: 2000,
            iti_ms: 30_000,
            trial_ms: 10_000,
            hopper_ms: 4000,
            cue_ack_delay_ms: 1000,
        }
    }
}

impl SessionTimings {
    /// Parses a TOML table; missing keys keep their defaults
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Test sessions skip the long waits
    pub fn for_subject(&self, subject: &str) -> Self {
        if subject == TEST_SUBJECT {
            Self {
                start_delay_ms: 1000,
                iti_ms: 1000,
                hopper_ms: 1000,
                ..self.clone()
            }
        } else {
            self.clone()
        }
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    pub fn iti(&self) -> Duration {
        Duration::from_millis(self.iti_ms)
    }

    pub fn trial(&self) -> Duration {
        Duration::from_millis(self.trial_ms)
    }

    pub fn hopper(&self) -> Duration {
        Duration::from_millis(self.hopper_ms)
    }

    pub fn cue_ack_delay(&self) -> Duration {
        Duration::from_millis(self.cue_ack_delay_ms)
    }
}

/// Everything the operator chose before the session starts. Immutable once
/// handed to the session runner.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub subject: String,
    pub condition: Contingency,
    /// Write the session log to disk
    pub record_data: bool,
    /// Parent of the per-subject data folders
    pub data_dir: PathBuf,
    /// Subject → stimulus image table
    pub assignments_path: PathBuf,
    pub experiment_id: String,
    pub timings: SessionTimings,
    pub max_trials: usize,
    /// Show ITI/reinforcement captions meant for a human operator
    pub show_operator_text: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            subject: TEST_SUBJECT.to_string(),
            condition: Contingency::Instrumental,
            record_data: true,
            data_dir: PathBuf::from("data"),
            assignments_path: PathBuf::from(format!("{EXPERIMENT_ID}_stimulus_assignments.csv")),
            experiment_id: EXPERIMENT_ID.to_string(),
            timings: SessionTimings::default(),
            max_trials: 80,
            show_operator_text: true,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subject != TEST_SUBJECT && !SUBJECT_ROSTER.contains(&self.subject.as_str()) {
            return Err(ConfigError::UnknownSubject(self.subject.clone()));
        }
        if self.max_trials == 0 || self.max_trials % 4 != 0 {
            return Err(ConfigError::BadTrialCount(self.max_trials));
        }
        if self.experiment_id.trim().is_empty() {
            return Err(ConfigError::EmptyExperimentId);
        }
        Ok(())
    }

    pub fn is_test_subject(&self) -> bool {
        self.subject == TEST_SUBJECT
    }

    /// Delays actually used for this subject
    pub fn effective_timings(&self) -> SessionTimings {
        self.timings.for_subject(&self.subject)
    }

    pub fn subject_dir(&self) -> PathBuf {
        self.data_dir.join(&self.subject)
    }

    /// Creates the subject's data folder; returns true when it was new
    pub fn ensure_subject_dir(&self) -> Result<bool, ConfigError> {
        let dir = self.subject_dir();
        if dir.is_dir() {
            info!("Data folder for {} exists", self.subject.to_uppercase());
            return Ok(false);
        }
        fs::create_dir_all(&dir).map_err(|source| ConfigError::DataDir {
            path: dir.clone(),
            source,
        })?;
        info!("New data folder for {} created", self.subject.to_uppercase());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_shortens_waits() {
        let t = SessionTimings::default().for_subject(TEST_SUBJECT);
        assert_eq!(t.iti_ms, 1000);
        assert_eq!(t.hopper_ms, 1000);
        assert_eq!(t.start_delay_ms, 1000);
        assert_eq!(t.trial_ms, 10_000);

        let real = SessionTimings::default().for_subject("Peach");
        assert_eq!(real, SessionTimings::default());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let t = SessionTimings::from_toml_str("iti_ms = 5000\ntrial_ms = 2500\n").unwrap();
        assert_eq!(t.iti_ms, 5000);
        assert_eq!(t.trial_ms, 2500);
        assert_eq!(t.hopper_ms, 4000);
        assert!(SessionTimings::from_toml_str("iti_ms = \"long\"").is_err());
    }

    #[test]
    fn validation() {
        let mut cfg = SessionConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.subject = "Wario".into();
        assert!(cfg.validate().is_ok());
        cfg.subject = "Mario".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::UnknownSubject(_))));
        cfg.subject = "Kurt".into();
        cfg.max_trials = 30;
        assert!(matches!(cfg.validate(), Err(ConfigError::BadTrialCount(30))));
    }

    #[test]
    fn menu_lists_test_subject_first() {
        let choices = subject_choices();
        assert_eq!(choices[0], TEST_SUBJECT);
        assert_eq!(choices.len(), 9);
        let mut sorted = SUBJECT_ROSTER.to_vec();
        sorted.sort();
        assert_eq!(sorted, SUBJECT_ROSTER.to_vec());
    }

    #[test]
    fn subject_dir_is_created_once() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = SessionConfig {
            data_dir: tmp.path().to_path_buf(),
            ..SessionConfig::default()
        };
        assert!(cfg.ensure_subject_dir().unwrap());
        assert!(!cfg.ensure_subject_dir().unwrap());
        assert!(tmp.path().join(TEST_SUBJECT).is_dir());
    }
}
