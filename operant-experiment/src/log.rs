use chrono::{NaiveDate, NaiveDateTime};
use operant_core::{EventKind, TrialType};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const HEADER: [&str; 12] = [
    "SessionTime",
    "Xcord",
    "Ycord",
    "Event",
    "TrialTime",
    "TrialType",
    "TargetPeckNum",
    "BackgroundPeckNum",
    "TrialNum",
    "TrialColor",
    "Subject",
    "Date",
];

const NA: &str = "NA";

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("cannot write data file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One row of the session log
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Offset from the session start (Space press)
    pub session_time: Duration,
    /// Canvas coordinates of a peck; `None` for non-pointer events
    pub position: Option<(i32, i32)>,
    pub event: EventKind,
    pub trial_time_secs: f64,
    pub trial_type: Option<TrialType>,
    pub target_pecks: u32,
    pub background_pecks: u32,
    pub trial_num: usize,
    /// Stimulus image shown for the trial type
    pub trial_color: Option<String>,
    pub subject: String,
    pub date: NaiveDate,
}

impl EventRecord {
    pub fn fields(&self) -> [String; 12] {
        let (x, y) = match self.position {
            Some((x, y)) => (x.to_string(), y.to_string()),
            None => (NA.to_string(), NA.to_string()),
        };
        [
            format_session_time(self.session_time),
            x,
            y,
            self.event.label().to_string(),
            format_trial_time(self.trial_time_secs),
            self.trial_type.map_or_else(|| NA.to_string(), |t| t.code()),
            self.target_pecks.to_string(),
            self.background_pecks.to_string(),
            self.trial_num.to_string(),
            self.trial_color.clone().unwrap_or_else(|| NA.to_string()),
            self.subject.clone(),
            self.date.format("%Y-%m-%d").to_string(),
        ]
    }
}

/// `H:MM:SS.ffffff`, the fractional part dropped when it is zero
pub fn format_session_time(d: Duration) -> String {
    let secs = d.as_secs();
    let micros = d.subsec_micros();
    let hms = format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60);
    if micros == 0 {
        hms
    } else {
        format!("{hms}.{micros:06}")
    }
}

/// Seconds rounded to five decimals
pub fn format_trial_time(secs: f64) -> String {
    let rounded = (secs * 1e5).round() / 1e5;
    // avoid "-0"
    if rounded == 0.0 {
        "0".to_string()
    } else {
        rounded.to_string()
    }
}

fn csv_field(field: &str) -> std::borrow::Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\"")).into()
    } else {
        field.into()
    }
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    let mut first = true;
    for f in fields {
        if !first {
            out.push(',');
        }
        first = false;
        let _ = write!(out, "{}", csv_field(f));
    }
    out.push_str("\r\n");
}

/// Append-only session log, rewritten in full on every flush
#[derive(Debug, Default)]
pub struct SessionLog {
    rows: Vec<EventRecord>,
    /// Destination file; `None` when the operator disabled recording
    path: Option<PathBuf>,
}

impl SessionLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            rows: Vec::new(),
            path,
        }
    }

    /// `<data_dir>/<subject>/<subject>_<YYYY-MM-DD_HH.MM.SS>_<experiment>_data.csv`
    pub fn data_file_path(
        data_dir: &Path,
        subject: &str,
        started: NaiveDateTime,
        experiment_id: &str,
    ) -> PathBuf {
        data_dir.join(subject).join(format!(
            "{}_{}_{}_data.csv",
            subject,
            started.format("%Y-%m-%d_%H.%M.%S"),
            experiment_id
        ))
    }

    pub fn set_path(&mut self, path: Option<PathBuf>) {
        self.path = path;
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn rows(&self) -> &[EventRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn record_event(&mut self, record: EventRecord) {
        self.rows.push(record);
    }

    /// Header plus every row, as written to disk
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_row(&mut out, HEADER);
        for row in &self.rows {
            let fields = row.fields();
            push_row(&mut out, fields.iter().map(String::as_str));
        }
        out
    }

    /// Rewrites the data file. `session_end` is appended first when the
    /// session has ended. Returns the file written, or `None` when recording
    /// is off.
    pub fn flush(&mut self, session_end: Option<EventRecord>) -> Result<Option<&Path>, LogError> {
        if let Some(end) = session_end {
            self.record_event(end);
        }
        let Some(path) = self.path.as_deref() else {
            return Ok(None);
        };
        let write = |path: &Path| -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, self.to_csv())
        };
        write(path).map_err(|source| LogError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(path))
    }
}
