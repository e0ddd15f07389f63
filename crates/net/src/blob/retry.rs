//! Backoff between blob attempts

use super::config::BlobDownloadConfig;
use rand::Rng;
use std::time::Duration;

/// `backoff_base ^ attempt`, scaled by a uniform jitter factor and capped
pub(super) fn calculate_backoff_delay(config: &BlobDownloadConfig, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let delay = config.backoff_base.powi(exponent);

    let jitter = if config.jitter_max > config.jitter_min {
        rand::rng().random_range(config.jitter_min..config.jitter_max)
    } else {
        config.jitter_min
    };

    Duration::try_from_secs_f64((delay * jitter).max(0.0))
        .unwrap_or(config.max_backoff)
        .min(config.max_backoff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_with_attempts_within_jitter_bounds() {
        let config = BlobDownloadConfig::default();
        for _ in 0..50 {
            let first = calculate_backoff_delay(&config, 1);
            assert!(first >= Duration::from_secs_f64(2.5) && first <= Duration::from_secs_f64(7.5));
            let second = calculate_backoff_delay(&config, 2);
            assert!(second >= Duration::from_secs_f64(12.5) && second <= Duration::from_secs_f64(37.5));
        }
    }

    #[test]
    fn delay_is_capped() {
        let config = BlobDownloadConfig::default();
        assert_eq!(calculate_backoff_delay(&config, 10), config.max_backoff);
        assert_eq!(calculate_backoff_delay(&config, u32::MAX), config.max_backoff);
    }

    #[test]
    fn fixed_jitter_when_range_is_empty() {
        let config = BlobDownloadConfig {
            backoff_base: 2.0,
            jitter_min: 1.0,
            jitter_max: 1.0,
            ..BlobDownloadConfig::default()
        };
        assert_eq!(calculate_backoff_delay(&config, 3), Duration::from_secs(8));
    }
}
