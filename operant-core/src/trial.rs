use std::fmt;
use std::str::FromStr;

/// Ratio divisors used by every condition, in presentation order
pub const RATIO_LEVELS: [u32; 4] = [2, 5, 20, 50];

/// Reinforcement contingency, also the between-subjects condition label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Contingency {
    /// Pecking produces food (INS)
    Instrumental,
    /// Pecking cancels food (OMS)
    Omission,
}

impl Contingency {
    pub fn code(&self) -> &'static str {
        match self {
            Contingency::Instrumental => "INS",
            Contingency::Omission => "OMS",
        }
    }

    /// Outcome of a trial before any peck is rolled
    pub fn default_reinforced(&self) -> bool {
        matches!(self, Contingency::Omission)
    }

    /// Outcome written by a successful roll
    pub fn reinforced_on_success(&self) -> bool {
        matches!(self, Contingency::Instrumental)
    }
}

impl fmt::Display for Contingency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Contingency {
    type Err = ParseTrialTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INS" => Ok(Contingency::Instrumental),
            "OMS" => Ok(Contingency::Omission),
            _ => Err(ParseTrialTypeError::UnknownContingency(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseTrialTypeError {
    #[error("unknown contingency '{0}' (expected INS or OMS)")]
    UnknownContingency(String),
    #[error("unsupported ratio '{0}' (expected one of 2, 5, 20, 50)")]
    UnknownRatio(String),
    #[error("malformed trial type code '{0}'")]
    Malformed(String),
}

/// One entry of the schedule table: a contingency paired with a ratio divisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrialType {
    pub contingency: Contingency,
    pub ratio: u32,
}

impl TrialType {
    /// The full schedule table, in the column order of the assignment sheet
    pub const ALL: [TrialType; 8] = [
        TrialType::new(Contingency::Instrumental, 2),
        TrialType::new(Contingency::Instrumental, 5),
        TrialType::new(Contingency::Instrumental, 20),
        TrialType::new(Contingency::Instrumental, 50),
        TrialType::new(Contingency::Omission, 2),
        TrialType::new(Contingency::Omission, 5),
        TrialType::new(Contingency::Omission, 20),
        TrialType::new(Contingency::Omission, 50),
    ];

    pub const fn new(contingency: Contingency, ratio: u32) -> Self {
        Self { contingency, ratio }
    }

    /// The four trial types available to subjects in `condition`
    pub fn for_condition(condition: Contingency) -> [TrialType; 4] {
        RATIO_LEVELS.map(|ratio| TrialType::new(condition, ratio))
    }

    /// Sheet/log code, e.g. `INS_20`
    pub fn code(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TrialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.contingency.code(), self.ratio)
    }
}

impl FromStr for TrialType {
    type Err = ParseTrialTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (contingency, ratio) = s
            .trim()
            .split_once('_')
            .ok_or_else(|| ParseTrialTypeError::Malformed(s.to_string()))?;
        let contingency = contingency.parse::<Contingency>()?;
        let ratio = ratio
            .parse::<u32>()
            .ok()
            .filter(|r| RATIO_LEVELS.contains(r))
            .ok_or_else(|| ParseTrialTypeError::UnknownRatio(ratio.to_string()))?;
        Ok(TrialType::new(contingency, ratio))
    }
}
