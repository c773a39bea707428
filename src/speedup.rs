/// Tolerance for floating point comparisons across the crate.
pub const EPSILON: f64 = 1e-6;

/// Amdahl speedup of a job whose parallelizable fraction is `p` when it runs
/// on `servers` servers (fractional counts allowed): `1 / (p/servers + 1 - p)`.
///
/// The result is floored at [`EPSILON`] so that a job momentarily holding
/// zero servers keeps a nonzero rate instead of poisoning later divisions.
pub fn speedup_factor(p: f64, servers: f64) -> f64 {
    (1.0 / (p / servers + 1.0 - p)).max(EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speedup_factor_sequential_job() {
        // p = 0: no parallelizable work, extra servers change nothing
        assert_eq!(speedup_factor(0.0, 1.0), 1.0);
        assert_eq!(speedup_factor(0.0, 64.0), 1.0);
    }

    #[test]
    fn test_speedup_factor_fully_parallel_job() {
        // p = 1: speedup is exactly the server count
        for k in 1..10 {
            let s = speedup_factor(1.0, k as f64);
            assert!((s - k as f64).abs() < EPSILON);
        }
    }

    #[test]
    fn test_speedup_factor_zero_servers_floored() {
        assert_eq!(speedup_factor(0.5, 0.0), EPSILON);
        assert_eq!(speedup_factor(1.0, 0.0), EPSILON);
        // 0/0 is NaN inside the formula; the floor absorbs it
        assert_eq!(speedup_factor(0.0, 0.0), EPSILON);
    }

    #[test]
    fn test_speedup_factor_monotone_in_servers() {
        for p in [0.0, 0.1, 0.5, 0.9, 1.0] {
            let mut prev = speedup_factor(p, 0.0);
            for k in 1..=50 {
                let cur = speedup_factor(p, k as f64 / 2.0);
                assert!(cur >= prev, "not monotone at p={} k={}", p, k);
                prev = cur;
            }
        }
    }

    #[test]
    fn test_speedup_factor_fractional_servers() {
        // half a server on a half-parallel job: 1 / (0.5/0.5 + 0.5) = 2/3
        let s = speedup_factor(0.5, 0.5);
        assert!((s - 2.0 / 3.0).abs() < EPSILON);
    }
}
