use operant_core::{Contingency, TrialType};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

/// Longest allowed run of one trial type
pub const MAX_RUN: usize = 3;

/// Reshuffles tried before giving up
pub const DEFAULT_MAX_ATTEMPTS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    #[error("sequence length {0} is not a positive multiple of 4")]
    UnevenLength(usize),
    #[error("no ordering without runs longer than {max_run} after {attempts} shuffles")]
    NotConverged { attempts: usize, max_run: usize },
}

/// Builds the session's trial order: `len / 4` trials of each ratio level of
/// `condition`, shuffled until no trial type repeats more than three times in a
/// row.
pub fn generate_sequence<R: Rng>(
    condition: Contingency,
    len: usize,
    rng: &mut R,
    max_attempts: usize,
) -> Result<Vec<TrialType>, SequenceError> {
    if len == 0 || len % 4 != 0 {
        return Err(SequenceError::UnevenLength(len));
    }
    let mut trials: Vec<TrialType> = TrialType::for_condition(condition)
        .into_iter()
        .cycle()
        .take(len)
        .collect();
    let attempts = shuffle_without_runs(&mut trials, MAX_RUN, rng, max_attempts)?;
    debug!("Trial order for {} found after {} shuffle(s)", condition, attempts);
    Ok(trials)
}

/// Full reshuffles of `items` until its longest run is at most `max_run`.
/// Returns the number of shuffles used.
pub fn shuffle_without_runs<T: PartialEq, R: Rng>(
    items: &mut [T],
    max_run: usize,
    rng: &mut R,
    max_attempts: usize,
) -> Result<usize, SequenceError> {
    for attempt in 1..=max_attempts {
        items.shuffle(rng);
        if longest_run(items) <= max_run {
            return Ok(attempt);
        }
    }
    Err(SequenceError::NotConverged {
        attempts: max_attempts,
        max_run,
    })
}

/// Length of the longest stretch of equal neighbours
pub fn longest_run<T: PartialEq>(items: &[T]) -> usize {
    let mut best = 0;
    let mut run = 0;
    for (i, item) in items.iter().enumerate() {
        run = if i > 0 && items[i - 1] == *item { run + 1 } else { 1 };
        best = best.max(run);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use operant_core::RATIO_LEVELS;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn runs_are_measured() {
        assert_eq!(longest_run::<u8>(&[]), 0);
        assert_eq!(longest_run(&[1]), 1);
        assert_eq!(longest_run(&[1, 1, 2, 2, 2, 1]), 3);
        assert_eq!(longest_run(&[3, 3, 3, 3]), 4);
    }

    #[test]
    fn rejects_uneven_lengths() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            generate_sequence(Contingency::Omission, 0, &mut rng, 10),
            Err(SequenceError::UnevenLength(0))
        );
        assert_eq!(
            generate_sequence(Contingency::Omission, 10, &mut rng, 10),
            Err(SequenceError::UnevenLength(10))
        );
    }

    #[test]
    fn gives_up_on_impossible_orderings() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut same = [7u8; 8];
        assert_eq!(
            shuffle_without_runs(&mut same, MAX_RUN, &mut rng, 25),
            Err(SequenceError::NotConverged {
                attempts: 25,
                max_run: MAX_RUN
            })
        );
    }

    #[test]
    fn standard_session_order() {
        let mut rng = StdRng::seed_from_u64(80);
        let seq = generate_sequence(Contingency::Instrumental, 80, &mut rng, DEFAULT_MAX_ATTEMPTS)
            .unwrap();
        assert_eq!(seq.len(), 80);
        for ratio in RATIO_LEVELS {
            assert_eq!(seq.iter().filter(|t| t.ratio == ratio).count(), 20);
        }
        assert!(seq.iter().all(|t| t.contingency == Contingency::Instrumental));
        assert!(longest_run(&seq) <= MAX_RUN);
    }

    proptest! {
        #[test]
        fn generated_orders_are_balanced_and_run_free(
            seed in any::<u64>(),
            quarter in 1usize..=30,
            omission in any::<bool>(),
        ) {
            let condition =
                if omission { Contingency::Omission } else { Contingency::Instrumental };
            let mut rng = StdRng::seed_from_u64(seed);
            let seq =
                generate_sequence(condition, quarter * 4, &mut rng, DEFAULT_MAX_ATTEMPTS).unwrap();
            prop_assert_eq!(seq.len(), quarter * 4);
            for tt in TrialType::for_condition(condition) {
                prop_assert_eq!(seq.iter().filter(|t| **t == tt).count(), quarter);
            }
            prop_assert!(longest_run(&seq) <= MAX_RUN);
        }
    }
}
