use operant_core::{Contingency, TrialType};
use rand::Rng;

/// Decides whether a trial is reinforced.
///
/// Starts from the contingency's default and rolls one `1/ratio` die per peck;
/// each success writes the contingency's success value (INS: reinforced,
/// OMS: not reinforced).
pub fn resolve_outcome<R: Rng>(trial_type: TrialType, pecks: u32, rng: &mut R) -> bool {
    let ratio = trial_type.ratio.max(1);
    let mut reinforced = trial_type.contingency.default_reinforced();
    for _ in 0..pecks {
        if rng.random_range(0..ratio) == 0 {
            reinforced = trial_type.contingency.reinforced_on_success();
        }
    }
    reinforced
}

/// Probability that [`resolve_outcome`] returns true
pub fn reinforcement_probability(trial_type: TrialType, pecks: u32) -> f64 {
    let ratio = trial_type.ratio.max(1) as f64;
    let all_miss = (1.0 - 1.0 / ratio).powi(pecks as i32);
    match trial_type.contingency {
        Contingency::Instrumental => 1.0 - all_miss,
        Contingency::Omission => all_miss,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const SIMULATIONS: usize = 10_000;

    fn observed_rate(tt: TrialType, pecks: u32, rng: &mut StdRng) -> f64 {
        let hits = (0..SIMULATIONS)
            .filter(|_| resolve_outcome(tt, pecks, rng))
            .count();
        hits as f64 / SIMULATIONS as f64
    }

    #[test]
    fn zero_pecks_keep_the_default() {
        let mut rng = StdRng::seed_from_u64(0);
        for tt in TrialType::ALL {
            for _ in 0..100 {
                assert_eq!(
                    resolve_outcome(tt, 0, &mut rng),
                    tt.contingency.default_reinforced()
                );
            }
            assert_eq!(
                reinforcement_probability(tt, 0),
                if tt.contingency.default_reinforced() { 1.0 } else { 0.0 }
            );
        }
    }

    #[test]
    fn rates_match_theory_for_every_schedule() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for tt in TrialType::ALL {
            for pecks in [1, 3, 10, 40] {
                let expected = reinforcement_probability(tt, pecks);
                let observed = observed_rate(tt, pecks, &mut rng);
                // 5 standard errors of a binomial proportion, floored for p near 0/1
                let tolerance = (5.0 * (expected * (1.0 - expected) / SIMULATIONS as f64).sqrt())
                    .max(0.005);
                assert!(
                    (observed - expected).abs() <= tolerance,
                    "{tt} with {pecks} pecks: observed {observed:.4}, expected {expected:.4}"
                );
            }
        }
    }

    #[test]
    fn instrumental_rr2_with_fifty_pecks_is_near_certain() {
        let mut rng = StdRng::seed_from_u64(50);
        let tt = TrialType::new(Contingency::Instrumental, 2);
        assert!(observed_rate(tt, 50, &mut rng) > 0.999);
    }

    #[test]
    fn omission_rr2_with_fifty_pecks_is_near_impossible() {
        let mut rng = StdRng::seed_from_u64(51);
        let tt = TrialType::new(Contingency::Omission, 2);
        assert!(observed_rate(tt, 50, &mut rng) < 0.001);
    }

    #[test]
    fn theory_formulas() {
        let ins5 = TrialType::new(Contingency::Instrumental, 5);
        let oms5 = TrialType::new(Contingency::Omission, 5);
        assert!((reinforcement_probability(ins5, 2) - 0.36).abs() < 1e-12);
        assert!((reinforcement_probability(oms5, 2) - 0.64).abs() < 1e-12);
    }
}
