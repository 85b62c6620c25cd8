// Wait-time estimation policy
//
// Deterministic placeholder: no feedback from real consultation durations yet.

use std::cmp::Ordering;

use crate::domain::{Department, Token};

/// Triage/registration delay before the first service slot begins
pub const DEFAULT_FIXED_OVERHEAD_MINUTES: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimatePolicy {
    pub fixed_overhead_minutes: u32,
}

impl Default for EstimatePolicy {
    fn default() -> Self {
        Self {
            fixed_overhead_minutes: DEFAULT_FIXED_OVERHEAD_MINUTES,
        }
    }
}

impl EstimatePolicy {
    pub fn new(fixed_overhead_minutes: u32) -> Self {
        Self {
            fixed_overhead_minutes,
        }
    }

    /// Priority tokens are fast-tracked: half the baseline, whatever their rank
    pub fn priority_wait(&self, department: &Department) -> u32 {
        department.baseline_service_minutes / 2
    }

    /// `standard_rank` is the zero-based rank among waiting non-priority tokens
    pub fn standard_wait(&self, department: &Department, standard_rank: u32) -> u32 {
        self.fixed_overhead_minutes
            .saturating_add(standard_rank.saturating_mul(department.baseline_service_minutes))
    }
}

/// Serving order: priority before normal, then FIFO by creation time.
/// Sequence numbers break ties between tokens created in the same millisecond.
pub fn serving_order(a: &Token, b: &Token) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.sequence_number.cmp(&b.sequence_number))
}

/// Position and estimate for each token of an already sorted waiting list
pub fn assign_estimates<'a, I>(
    department: &Department,
    policy: &EstimatePolicy,
    ordered: I,
) -> Vec<(u32, u32)>
where
    I: IntoIterator<Item = &'a Token>,
{
    let mut standard_rank = 0u32;

    ordered
        .into_iter()
        .enumerate()
        .map(|(rank, token)| {
            let position = rank as u32 + 1;
            let wait = if token.priority {
                policy.priority_wait(department)
            } else {
                let wait = policy.standard_wait(department, standard_rank);
                standard_rank += 1;
                wait
            };
            (position, wait)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gen() -> Department {
        Department::new("GEN", "General Consultation", 15).unwrap()
    }

    fn token(seq: u64, priority: bool, created_at: i64) -> Token {
        Token::new(format!("t-{}", seq), "GEN", "GEN", seq, priority, created_at)
    }

    #[test]
    fn test_priority_wait_is_half_baseline_floored() {
        let policy = EstimatePolicy::default();
        assert_eq!(policy.priority_wait(&gen()), 7);
    }

    #[test]
    fn test_standard_wait_grows_with_rank() {
        let policy = EstimatePolicy::default();
        let dept = gen();
        assert_eq!(policy.standard_wait(&dept, 0), 20);
        assert_eq!(policy.standard_wait(&dept, 1), 35);
        assert_eq!(policy.standard_wait(&dept, 2), 50);
    }

    #[test]
    fn test_standard_wait_saturates() {
        let policy = EstimatePolicy::new(u32::MAX - 1);
        assert_eq!(policy.standard_wait(&gen(), 10), u32::MAX);
    }

    #[test]
    fn test_serving_order() {
        let mut tokens = vec![
            token(1, false, 100),
            token(2, false, 200),
            token(3, true, 300),
            token(4, true, 250),
            token(5, false, 200),
        ];
        tokens.sort_by(serving_order);
        let order: Vec<u64> = tokens.iter().map(|t| t.sequence_number).collect();
        assert_eq!(order, vec![4, 3, 1, 2, 5]);
    }

    #[test]
    fn test_priority_does_not_consume_standard_rank() {
        let tokens = [
            token(4, true, 400),
            token(1, false, 100),
            token(2, false, 200),
            token(3, false, 300),
        ];
        let estimates = assign_estimates(&gen(), &EstimatePolicy::default(), tokens.iter());
        assert_eq!(estimates, vec![(1, 7), (2, 20), (3, 35), (4, 50)]);
    }
}
