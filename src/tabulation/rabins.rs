/// A target's position and requested time, for RA charting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetTime {
    /// ICRS right ascension in degrees, `None` when the target has no coordinates.
    pub ra_deg: Option<f64>,
    pub hours: f64,
}

/// Requested hours in 24 one-hour right-ascension bins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RaBins {
    bins: [f64; 24],
    unknown: f64,
}

impl RaBins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, target: TargetTime) {
        if !(target.hours.is_finite() && target.hours > 0.0) {
            return;
        }
        match target.ra_deg.filter(|ra| ra.is_finite()) {
            Some(ra) => {
                let bin = ((ra.rem_euclid(360.0) / 15.0).floor() as usize).min(23);
                self.bins[bin] += target.hours;
            }
            None => self.unknown += target.hours,
        }
    }

    pub fn bins(&self) -> &[f64; 24] {
        &self.bins
    }

    pub fn unknown(&self) -> f64 {
        self.unknown
    }

    pub fn total(&self) -> f64 {
        self.bins.iter().sum::<f64>() + self.unknown
    }

    /// Largest single bin, for scaling a bar chart.
    pub fn max_bin(&self) -> f64 {
        self.bins.iter().copied().fold(0.0, f64::max)
    }
}

impl FromIterator<TargetTime> for RaBins {
    fn from_iter<I: IntoIterator<Item = TargetTime>>(iter: I) -> Self {
        let mut bins = RaBins::new();
        for target in iter {
            bins.add(target);
        }
        bins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bins_by_hour() {
        let bins: RaBins = [
            TargetTime { ra_deg: Some(0.0), hours: 1.0 },
            TargetTime { ra_deg: Some(14.99), hours: 2.0 },
            TargetTime { ra_deg: Some(15.0), hours: 4.0 },
            TargetTime { ra_deg: Some(359.99), hours: 0.5 },
            TargetTime { ra_deg: None, hours: 3.0 },
        ]
        .into_iter()
        .collect();

        assert_eq!(bins.bins()[0], 3.0);
        assert_eq!(bins.bins()[1], 4.0);
        assert_eq!(bins.bins()[23], 0.5);
        assert_eq!(bins.unknown(), 3.0);
        assert_eq!(bins.total(), 10.5);
        assert_eq!(bins.max_bin(), 4.0);
    }

    #[test]
    fn ignores_targets_without_time() {
        let mut bins = RaBins::new();
        bins.add(TargetTime { ra_deg: Some(10.0), hours: 0.0 });
        bins.add(TargetTime { ra_deg: None, hours: f64::NAN });
        assert_eq!(bins.total(), 0.0);
    }
}
