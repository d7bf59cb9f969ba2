use anyhow::{Context, Result};
use clap::Parser;
use clap::builder::PossibleValuesParser;
use operant_core::Contingency;
use operant_experiment::config::{EXPERIMENT_ID, TEST_SUBJECT, subject_choices};
use operant_experiment::{SessionConfig, SessionTimings};
use std::path::{Path, PathBuf};

/// Fonts tried, in order, when no `--font` is given
pub const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Ratio-schedule pecking session for one pigeon in the operant chamber
#[derive(Parser, Debug, Clone)]
#[command(name = "operant", version, long_about = None)]
pub struct Args {
    /// Subject to run
    #[arg(
        long,
        default_value = TEST_SUBJECT,
        value_parser = PossibleValuesParser::new(subject_choices())
    )]
    pub subject: String,

    /// Reinforcement contingency (INS or OMS)
    #[arg(long, default_value = "INS")]
    pub condition: Contingency,

    /// Write the session data file
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub record_data: bool,

    /// Parent folder of the per-subject data folders
    /// [default: ~/Desktop/Data/P003Fc_data with --hardware, ./data otherwise]
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Subject to stimulus image table
    #[arg(long, default_value = "P003Fc_stimulus_assignments.csv")]
    pub assignments: PathBuf,

    /// Folder holding the stimulus images
    #[arg(long, default_value = ".")]
    pub stimuli_dir: PathBuf,

    /// TrueType font for on-screen text [default: first installed system font]
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// TOML file overriding session delays
    #[arg(long)]
    pub timings: Option<PathBuf>,

    #[arg(long, default_value_t = 80)]
    pub max_trials: usize,

    /// Run in the chamber: fullscreen, hidden cursor, GPIO peripherals
    #[arg(long, default_value_t = false)]
    pub hardware: bool,

    /// Servo calibration (second row: up,down pulse widths in µs)
    #[arg(long, default_value = "Hopper_vals.csv")]
    pub hopper_vals: PathBuf,

    /// Log filter, e.g. "debug" for the per-event feed (RUST_LOG wins)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Folds the arguments into the immutable session configuration
    pub fn session_config(&self) -> Result<SessionConfig> {
        let timings = match &self.timings {
            Some(path) => SessionTimings::load(path)?,
            None => SessionTimings::default(),
        };
        let config = SessionConfig {
            subject: self.subject.clone(),
            condition: self.condition,
            record_data: self.record_data,
            data_dir: self.data_dir.clone().unwrap_or_else(|| self.default_data_dir()),
            assignments_path: self.assignments.clone(),
            experiment_id: EXPERIMENT_ID.to_string(),
            timings,
            max_trials: self.max_trials,
            show_operator_text: !self.hardware || self.subject == TEST_SUBJECT,
        };
        config.validate().context("invalid session settings")?;
        Ok(config)
    }

    /// Font for on-screen text. Fails when captions are shown but neither
    /// `--font` nor any of [`SYSTEM_FONTS`] exists.
    pub fn font_path(&self, show_operator_text: bool) -> Result<Option<PathBuf>> {
        pick_font(self.font.as_deref(), SYSTEM_FONTS, show_operator_text)
    }

    fn default_data_dir(&self) -> PathBuf {
        if self.hardware {
            if let Some(home) = dirs::home_dir() {
                return home
                    .join("Desktop")
                    .join("Data")
                    .join(format!("{EXPERIMENT_ID}_data"));
            }
        }
        PathBuf::from("data")
    }
}

fn pick_font(
    explicit: Option<&Path>,
    candidates: &[&str],
    required: bool,
) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        return Ok(Some(path.to_path_buf()));
    }
    let found = candidates.iter().map(PathBuf::from).find(|p| p.is_file());
    if found.is_none() && required {
        anyhow::bail!("no font for on-screen text; pass --font <file.ttf>");
    }
    Ok(found)
}
