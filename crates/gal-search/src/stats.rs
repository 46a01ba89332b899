use crate::instance::Instance;

/// Summary of the fitness distribution of a population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitnessStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    /// Instances that have not been scored yet (excluded from the other fields).
    pub unscored: usize,
}

impl FitnessStats {
    /// Computes statistics over the scored members of `instances`.
    ///
    /// Returns `None` if no instance has been scored.
    #[must_use]
    pub fn from_population<I>(instances: &[I]) -> Option<Self>
    where
        I: Instance,
    {
        Self::from_values(instances.iter().map(Instance::fitness))
    }

    /// Computes statistics over raw fitness values, treating NaN as unscored.
    ///
    /// # Examples
    ///
    /// ```
    /// # use gal_search::stats::FitnessStats;
    /// let stats = FitnessStats::from_values([0.5, 0.1, 0.3, f64::NAN]).unwrap();
    /// assert_eq!(stats.max, 0.5);
    /// assert_eq!(stats.median, 0.3);
    /// assert_eq!(stats.unscored, 1);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_values<V>(values: V) -> Option<Self>
    where
        V: IntoIterator<Item = f64>,
    {
        let (mut scored, unscored): (Vec<f64>, Vec<f64>) =
            values.into_iter().partition(|v| !v.is_nan());
        scored.sort_by(f64::total_cmp);

        let min = *scored.first()?;
        let max = *scored.last()?;
        let n = scored.len() as f64;
        let mean = scored.iter().sum::<f64>() / n;
        let median = scored[scored.len() / 2];
        let variance = scored.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Some(Self {
            min,
            max,
            mean,
            median,
            std_dev: variance.sqrt(),
            unscored: unscored.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_none() {
        assert!(FitnessStats::from_values([]).is_none());
        assert!(FitnessStats::from_values([f64::NAN]).is_none());
    }

    #[test]
    fn test_basic_values() {
        let stats = FitnessStats::from_values([1.0, 3.0, 2.0, 4.0]).unwrap();
        assert!((stats.min - 1.0).abs() < 1e-12);
        assert!((stats.max - 4.0).abs() < 1e-12);
        assert!((stats.mean - 2.5).abs() < 1e-12);
        assert!((stats.median - 3.0).abs() < 1e-12);
        assert!((stats.std_dev - 1.25f64.sqrt()).abs() < 1e-12);
        assert_eq!(stats.unscored, 0);
    }

    #[test]
    fn test_negative_fitness() {
        let stats = FitnessStats::from_values([-0.5, 0.25]).unwrap();
        assert!((stats.min + 0.5).abs() < 1e-12);
        assert!((stats.mean + 0.125).abs() < 1e-12);
    }
}
