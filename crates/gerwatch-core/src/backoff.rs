use std::time::Duration;

pub const DEFAULT_EXPONENT: u32 = 2;

/// Delay schedule for reconnect attempts: `exponent^0, exponent^1, ...`,
/// one entry per attempt. A non-positive attempt budget yields an empty
/// schedule; entries past the u64 range saturate instead of overflowing.
/// The result is a plain value, so iterating it twice gives the same
/// delays both times.
pub fn delays(attempts: i32, exponent: u32) -> Vec<Duration> {
    if attempts <= 0 {
        return Vec::new();
    }
    (0..attempts as u32)
        .map(|i| {
            u64::from(exponent)
                .checked_pow(i)
                .map(Duration::from_secs)
                .unwrap_or(Duration::MAX)
        })
        .collect()
}

pub fn connect_delays(attempts: i32) -> Vec<Duration> {
    delays(attempts, DEFAULT_EXPONENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_attempts_doubles_from_one_second() {
        let secs: Vec<u64> = delays(5, 2).iter().map(Duration::as_secs).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 16]);
    }

    #[test]
    fn zero_or_negative_attempts_yield_nothing() {
        assert!(delays(0, 2).is_empty());
        assert!(delays(-3, 2).is_empty());
    }

    #[test]
    fn schedule_is_repeatable() {
        let schedule = connect_delays(4);
        let first: Vec<u64> = schedule.iter().map(Duration::as_secs).collect();
        let second: Vec<u64> = schedule.iter().map(Duration::as_secs).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec![1, 2, 4, 8]);
    }

    #[test]
    fn oversized_budget_saturates_instead_of_overflowing() {
        let schedule = delays(70, 2);
        assert_eq!(schedule.len(), 70);
        assert_eq!(schedule[63], Duration::from_secs(1u64 << 63));
        assert_eq!(schedule[64], Duration::MAX);
        assert_eq!(schedule[69], Duration::MAX);
        assert!(schedule.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn exponent_three_grows_accordingly() {
        let secs: Vec<u64> = delays(4, 3).iter().map(Duration::as_secs).collect();
        assert_eq!(secs, vec![1, 3, 9, 27]);
    }
}
