use operant_core::TrialType;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum StimulusError {
    #[error("cannot read stimulus assignments {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("stimulus assignments {0} have no header row")]
    Empty(PathBuf),
    #[error("stimulus assignments {0} have no 'Subject' column")]
    MissingSubjectColumn(PathBuf),
    #[error("subject '{subject}' not found in {path}")]
    SubjectNotFound { subject: String, path: PathBuf },
}

/// Per-subject mapping from trial type to stimulus image filename
#[derive(Debug, Clone, PartialEq)]
pub struct StimulusAssignments {
    subject: String,
    files: HashMap<TrialType, String>,
}

impl StimulusAssignments {
    pub fn load(path: &Path, subject: &str) -> Result<Self, StimulusError> {
        let text = fs::read_to_string(path).map_err(|source| StimulusError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let assignments = Self::parse(&text, subject, path)?;
        info!(
            "Loaded {} stimulus assignment(s) for {} from {}",
            assignments.len(),
            subject,
            path.display()
        );
        Ok(assignments)
    }

    /// Parses the sheet text; `source` only labels errors
    pub fn parse(text: &str, subject: &str, source: &Path) -> Result<Self, StimulusError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let header = parse_csv_line(
            lines
                .next()
                .ok_or_else(|| StimulusError::Empty(source.to_path_buf()))?,
        );
        let subject_col = header
            .iter()
            .position(|h| h.trim() == "Subject")
            .ok_or_else(|| StimulusError::MissingSubjectColumn(source.to_path_buf()))?;
        let trial_cols: Vec<(usize, TrialType)> = header
            .iter()
            .enumerate()
            .filter_map(|(i, h)| h.trim().parse::<TrialType>().ok().map(|tt| (i, tt)))
            .collect();

        let row = lines
            .map(parse_csv_line)
            .find(|fields| fields.get(subject_col).map(|s| s.trim()) == Some(subject))
            .ok_or_else(|| StimulusError::SubjectNotFound {
                subject: subject.to_string(),
                path: source.to_path_buf(),
            })?;

        let files = trial_cols
            .into_iter()
            .filter_map(|(i, tt)| {
                let cell = row.get(i)?.trim();
                (!cell.is_empty()).then(|| (tt, cell.to_string()))
            })
            .collect();

        Ok(Self {
            subject: subject.to_string(),
            files,
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn filename_for(&self, trial_type: TrialType) -> Option<&str> {
        self.files.get(&trial_type).map(String::as_str)
    }

    /// Assigned files in schedule-table order
    pub fn iter(&self) -> impl Iterator<Item = (TrialType, &str)> {
        TrialType::ALL
            .into_iter()
            .filter_map(|tt| self.filename_for(tt).map(|f| (tt, f)))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Splits one CSV line, honouring double-quoted fields and `""` escapes
pub fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use operant_core::Contingency;

    const SHEET: &str = "\u{feff}Subject,INS_2,INS_5,INS_20,INS_50,OMS_2,OMS_5,OMS_20,OMS_50\n\
        Peach,a.png,b.png,c.png,d.png,,,,\n\
        Wario,,,,,e.png,f.png,\"g, h.png\",i.png\n";

    fn sheet() -> &'static Path {
        Path::new("assignments.csv")
    }

    #[test]
    fn keeps_only_filled_cells() {
        let a = StimulusAssignments::parse(SHEET, "Peach", sheet()).unwrap();
        assert_eq!(a.len(), 4);
        assert_eq!(a.filename_for("INS_20".parse().unwrap()), Some("c.png"));
        assert_eq!(a.filename_for(TrialType::new(Contingency::Omission, 2)), None);
        assert_eq!(a.iter().next(), Some((TrialType::new(Contingency::Instrumental, 2), "a.png")));
    }

    #[test]
    fn quoted_cells_and_bom() {
        let a = StimulusAssignments::parse(SHEET, "Wario", sheet()).unwrap();
        assert_eq!(a.filename_for("OMS_20".parse().unwrap()), Some("g, h.png"));
        assert_eq!(a.subject(), "Wario");
    }

    #[test]
    fn missing_subject_is_an_error() {
        assert!(matches!(
            StimulusAssignments::parse(SHEET, "Kurt", sheet()),
            Err(StimulusError::SubjectNotFound { .. })
        ));
        assert!(matches!(
            StimulusAssignments::parse("", "Kurt", sheet()),
            Err(StimulusError::Empty(_))
        ));
        assert!(matches!(
            StimulusAssignments::parse("Name,INS_2\nKurt,a.png\n", "Kurt", sheet()),
            Err(StimulusError::MissingSubjectColumn(_))
        ));
    }

    #[test]
    fn csv_line_splitting() {
        assert_eq!(
            parse_csv_line("a,,\"b,c\",\"say \"\"hi\"\"\""),
            vec!["a", "", "b,c", "say \"hi\""]
        );
    }

    #[test]
    fn load_reports_the_path() {
        let err =
            StimulusAssignments::load(Path::new("/nonexistent/sheet.csv"), "Peach").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/sheet.csv"));
    }
}
