/// Parameters of the automaton representation's genetic operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutomatonParams {
    /// Smallest state count of a fresh random automaton.
    pub new_instance_min: usize,
    /// Exclusive upper bound of the state count of a fresh random automaton.
    pub new_instance_max: usize,
    /// Smallest state-count drift of a crossover child.
    pub offset_minus: i32,
    /// Exclusive upper bound of the state-count drift of a crossover child.
    pub offset_plus: i32,
    /// Mutate exactly one transition instead of re-rolling each with probability `1/len`.
    pub targeted_mutations: bool,
    /// Probability that a re-rolled transition is removed.
    pub no_transition_probability: f64,
    /// Probability that a kept transition targets a lower-indexed state.
    pub lower_state_probability: f64,
}

impl Default for AutomatonParams {
    fn default() -> Self {
        Self {
            new_instance_min: 6,
            new_instance_max: 12,
            offset_minus: -2,
            offset_plus: 2,
            targeted_mutations: false,
            no_transition_probability: 0.3,
            lower_state_probability: 0.5,
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ParamsError {
    #[display("{name} must be within [0, 1], got {value}")]
    OutOfRange { name: &'static str, value: f64 },
    #[display("{name} range [{min}, {max}) is empty")]
    EmptyRange {
        name: &'static str,
        min: i64,
        max: i64,
    },
    #[display("newInstanceMin must be at least 1")]
    NoStates,
}

impl AutomatonParams {
    #[expect(clippy::cast_possible_wrap)]
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.new_instance_min == 0 {
            return Err(ParamsError::NoStates);
        }
        if self.new_instance_min >= self.new_instance_max {
            return Err(ParamsError::EmptyRange {
                name: "newInstance",
                min: self.new_instance_min as i64,
                max: self.new_instance_max as i64,
            });
        }
        if self.offset_minus >= self.offset_plus {
            return Err(ParamsError::EmptyRange {
                name: "offset",
                min: self.offset_minus.into(),
                max: self.offset_plus.into(),
            });
        }
        for (name, value) in [
            ("noTransitionProbability", self.no_transition_probability),
            ("lowerStateProbability", self.lower_state_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ParamsError::OutOfRange { name, value });
            }
        }
        Ok(())
    }
}
