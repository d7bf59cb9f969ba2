use operant_core::TrialType;

/// Pecks counted during one trial; reset at every ITI start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeckCounters {
    /// Pecks on the key (cue)
    pub target: u32,
    /// Pecks anywhere else on the screen
    pub background: u32,
}

impl PeckCounters {
    /// Pecks that roll the ratio die
    pub fn total(&self) -> u32 {
        self.target + self.background
    }
}

/// The trial currently being run
#[derive(Debug, Clone)]
pub struct Trial {
    /// 1-based position in the session
    pub number: usize,
    pub trial_type: TrialType,
    pub stimulus: Option<String>,
    /// Timer reading at which trial-relative time is zero
    pub anchor_ns: u64,
    pub counters: PeckCounters,
}

impl Trial {
    pub fn new(
        number: usize,
        trial_type: TrialType,
        stimulus: Option<String>,
        anchor_ns: u64,
    ) -> Self {
        Self {
            number,
            trial_type,
            stimulus,
            anchor_ns,
            counters: PeckCounters::default(),
        }
    }

    /// Seconds since the trial anchor; negative while the ITI is running
    pub fn relative_secs(&self, now_ns: u64) -> f64 {
        (now_ns as i128 - self.anchor_ns as i128) as f64 / 1e9
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use operant_core::Contingency;

    #[test]
    fn relative_time_is_signed() {
        let t = Trial::new(1, TrialType::new(Contingency::Omission, 5), None, 30_000_000_000);
        assert_eq!(t.relative_secs(0), -30.0);
        assert_eq!(t.relative_secs(31_500_000_000), 1.5);
        assert_eq!(t.counters.total(), 0);
    }
}
