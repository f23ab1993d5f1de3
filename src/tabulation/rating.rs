/// One review's contribution to a proposal's overall rating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingInput {
    pub rating: f64,
    pub weight: f64,
}

/// Aggregate of a proposal's ratings, weighted by reviewer expertise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub mean: f64,
    /// Weighted population standard deviation.
    pub std_dev: f64,
    /// Unweighted sample standard deviation; `None` with fewer than two ratings.
    pub sample_std_dev: Option<f64>,
    pub count: usize,
    pub total_weight: f64,
}

/// Weighted mean and spread of the ratings. Inputs with a negative or
/// non-finite weight are ignored; `None` when no weight remains.
pub fn summarize(inputs: &[RatingInput]) -> Option<RatingSummary> {
    let usable: Vec<RatingInput> = inputs
        .iter()
        .copied()
        .filter(|i| i.rating.is_finite() && i.weight.is_finite() && i.weight >= 0.0)
        .collect();

    let total_weight: f64 = usable.iter().map(|i| i.weight).sum();
    if usable.is_empty() || total_weight <= 0.0 {
        return None;
    }

    let mean = usable.iter().map(|i| i.weight * i.rating).sum::<f64>() / total_weight;
    let variance = usable
        .iter()
        .map(|i| i.weight * (i.rating - mean).powi(2))
        .sum::<f64>()
        / total_weight;

    let n = usable.len();
    let sample_std_dev = (n > 1).then(|| {
        let plain_mean = usable.iter().map(|i| i.rating).sum::<f64>() / n as f64;
        let ss: f64 = usable.iter().map(|i| (i.rating - plain_mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    });

    Some(RatingSummary {
        mean,
        std_dev: variance.sqrt(),
        sample_std_dev,
        count: n,
        total_weight,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(rating: f64, weight: f64) -> RatingInput {
        RatingInput { rating, weight }
    }

    #[test]
    fn equal_weights_match_plain_statistics() {
        let s = summarize(&[input(60.0, 50.0), input(80.0, 50.0)]).unwrap();
        assert!((s.mean - 70.0).abs() < 1e-12);
        assert!((s.std_dev - 10.0).abs() < 1e-12);
        assert!((s.sample_std_dev.unwrap() - 200f64.sqrt()).abs() < 1e-12);
        assert_eq!(s.count, 2);
    }

    #[test]
    fn expertise_pulls_mean() {
        let s = summarize(&[input(90.0, 100.0), input(30.0, 25.0), input(60.0, 0.0)]).unwrap();
        // (9000 + 750 + 0) / 125
        assert!((s.mean - 78.0).abs() < 1e-12);
        // (100 * 144 + 25 * 2304) / 125
        assert!((s.std_dev - (72_000.0f64 / 125.0).sqrt()).abs() < 1e-9);
        assert_eq!(s.count, 3);
        assert!((s.total_weight - 125.0).abs() < 1e-12);
    }

    #[test]
    fn single_rating_has_no_spread() {
        let s = summarize(&[input(42.0, 10.0)]).unwrap();
        assert_eq!(s.mean, 42.0);
        assert_eq!(s.std_dev, 0.0);
        assert_eq!(s.sample_std_dev, None);
    }

    #[test]
    fn no_usable_weight() {
        assert_eq!(summarize(&[]), None);
        assert_eq!(summarize(&[input(50.0, 0.0)]), None);
        assert_eq!(summarize(&[input(50.0, -1.0), input(f64::NAN, 10.0)]), None);
    }
}
