/// Weights and shape parameters of the automaton fitness function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitnessParams {
    pub weight_consistency: f64,
    pub weight_size: f64,
    pub weight_generalization: f64,
    /// Target language size = corpus size × multiplier (truncated).
    pub target_size_multiplier: f64,
    /// Half-width of the peaked region around the target language size.
    pub generalization_limit: f64,
    /// Steepness of the peak.
    pub generalization_m1: f64,
    /// Linear decay per unit of distance beyond the limit.
    pub generalization_m2: f64,
    /// Peak height, also used to normalize the generalization score.
    pub generalization_max: f64,
    /// State count at which the size score reaches zero.
    pub size_max: f64,
}

impl Default for FitnessParams {
    fn default() -> Self {
        Self {
            weight_consistency: 0.33,
            weight_size: 0.33,
            weight_generalization: 0.33,
            target_size_multiplier: 2.0,
            generalization_limit: 0.5,
            generalization_m1: 2.0,
            generalization_m2: 0.025,
            generalization_max: 20.0,
            size_max: 20.0,
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ParamsError {
    #[display("{name} must be a finite number, got {value}")]
    NotFinite { name: &'static str, value: f64 },
    #[display("{name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[display("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },
}

impl FitnessParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        let all = [
            ("weightConsistency", self.weight_consistency),
            ("weightSize", self.weight_size),
            ("weightGeneralization", self.weight_generalization),
            ("targetSizeMultiplier", self.target_size_multiplier),
            ("generalizationLimit", self.generalization_limit),
            ("generalizationM1", self.generalization_m1),
            ("generalizationM2", self.generalization_m2),
            ("generalizationMax", self.generalization_max),
            ("sizeMax", self.size_max),
        ];
        if let Some(&(name, value)) = all.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ParamsError::NotFinite { name, value });
        }
        for (name, value) in [
            ("targetSizeMultiplier", self.target_size_multiplier),
            ("generalizationLimit", self.generalization_limit),
            ("generalizationM1", self.generalization_m1),
        ] {
            if value < 0.0 {
                return Err(ParamsError::Negative { name, value });
            }
        }
        for (name, value) in [
            ("generalizationMax", self.generalization_max),
            ("sizeMax", self.size_max),
        ] {
            if value <= 0.0 {
                return Err(ParamsError::NotPositive { name, value });
            }
        }
        Ok(())
    }
}
