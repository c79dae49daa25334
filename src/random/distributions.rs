use rand::Rng;
use rand_distr::{Distribution, Gamma, LogNormal, Uniform, Weibull};
use serde_derive::{Deserialize, Serialize};

use crate::error::AbmError;

/// A parametric distribution as written in a parameter file.
///
/// In the labelled table format a distribution is one line: the family name followed by its
/// parameters, e.g. `lognormal 1.6 0.4` or `fixed 5`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DistributionSpec {
    Fixed { value: f64 },
    Uniform { low: f64, high: f64 },
    Gamma { shape: f64, scale: f64 },
    LogNormal { mu: f64, sigma: f64 },
    Weibull { shape: f64, scale: f64 },
}

impl DistributionSpec {
    /// Parses the tokens of a table line, e.g. `["gamma", "2.0", "1.5"]`.
    pub fn from_tokens(tokens: &[String]) -> Result<DistributionSpec, AbmError> {
        let (family, values) = tokens
            .split_first()
            .ok_or_else(|| AbmError::config("empty distribution"))?;
        let values = values
            .iter()
            .map(|token| {
                token.parse::<f64>().map_err(|_| {
                    AbmError::ParseError(format!("'{token}' is not a distribution parameter"))
                })
            })
            .collect::<Result<Vec<f64>, AbmError>>()?;
        let arity = |n: usize| -> Result<(), AbmError> {
            if values.len() == n {
                Ok(())
            } else {
                Err(AbmError::config(format!(
                    "distribution '{family}' takes {n} parameter(s), got {}",
                    values.len()
                )))
            }
        };
        match family.to_lowercase().as_str() {
            "fixed" => {
                arity(1)?;
                Ok(DistributionSpec::Fixed { value: values[0] })
            }
            "uniform" => {
                arity(2)?;
                Ok(DistributionSpec::Uniform {
                    low: values[0],
                    high: values[1],
                })
            }
            "gamma" => {
                arity(2)?;
                Ok(DistributionSpec::Gamma {
                    shape: values[0],
                    scale: values[1],
                })
            }
            "lognormal" => {
                arity(2)?;
                Ok(DistributionSpec::LogNormal {
                    mu: values[0],
                    sigma: values[1],
                })
            }
            "weibull" => {
                arity(2)?;
                Ok(DistributionSpec::Weibull {
                    shape: values[0],
                    scale: values[1],
                })
            }
            other => Err(AbmError::config(format!(
                "unknown distribution family '{other}'"
            ))),
        }
    }

    /// Validates the parameters and builds a sampler.
    pub fn build(&self) -> Result<Sampler, AbmError> {
        let invalid = |e: &dyn std::fmt::Display| {
            AbmError::config(format!("invalid distribution {self:?}: {e}"))
        };
        match *self {
            DistributionSpec::Fixed { value } => {
                if value.is_finite() {
                    Ok(Sampler::Fixed(value))
                } else {
                    Err(invalid(&"value must be finite"))
                }
            }
            DistributionSpec::Uniform { low, high } => Uniform::new(low, high)
                .map(Sampler::Uniform)
                .map_err(|e| invalid(&e)),
            DistributionSpec::Gamma { shape, scale } => Gamma::new(shape, scale)
                .map(Sampler::Gamma)
                .map_err(|e| invalid(&e)),
            DistributionSpec::LogNormal { mu, sigma } => LogNormal::new(mu, sigma)
                .map(Sampler::LogNormal)
                .map_err(|e| invalid(&e)),
            DistributionSpec::Weibull { shape, scale } => Weibull::new(scale, shape)
                .map(Sampler::Weibull)
                .map_err(|e| invalid(&e)),
        }
    }
}

/// A validated distribution ready to draw from.
#[derive(Clone, Debug)]
pub enum Sampler {
    Fixed(f64),
    Uniform(Uniform<f64>),
    Gamma(Gamma<f64>),
    LogNormal(LogNormal<f64>),
    Weibull(Weibull<f64>),
}

impl Sampler {
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self, Sampler::Fixed(_))
    }

    pub(super) fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        match self {
            Sampler::Fixed(value) => *value,
            Sampler::Uniform(d) => d.sample(rng),
            Sampler::Gamma(d) => d.sample(rng),
            Sampler::LogNormal(d) => d.sample(rng),
            Sampler::Weibull(d) => d.sample(rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::RngService;

    fn tokens(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn parses_table_lines() {
        assert_eq!(
            DistributionSpec::from_tokens(&tokens("lognormal 1.6 0.4")).unwrap(),
            DistributionSpec::LogNormal {
                mu: 1.6,
                sigma: 0.4
            }
        );
        assert_eq!(
            DistributionSpec::from_tokens(&tokens("Fixed 5")).unwrap(),
            DistributionSpec::Fixed { value: 5.0 }
        );
    }

    #[test]
    fn rejects_bad_lines() {
        assert!(matches!(
            DistributionSpec::from_tokens(&tokens("gamma 1.0")),
            Err(AbmError::ConfigError(_))
        ));
        assert!(matches!(
            DistributionSpec::from_tokens(&tokens("cauchy 1 2")),
            Err(AbmError::ConfigError(_))
        ));
        assert!(matches!(
            DistributionSpec::from_tokens(&tokens("gamma one 2")),
            Err(AbmError::ParseError(_))
        ));
    }

    #[test]
    fn invalid_parameters_are_config_errors() {
        let spec = DistributionSpec::Gamma {
            shape: -1.0,
            scale: 1.0,
        };
        assert!(matches!(spec.build(), Err(AbmError::ConfigError(_))));
        let spec = DistributionSpec::Uniform {
            low: 2.0,
            high: 1.0,
        };
        assert!(spec.build().is_err());
    }

    #[test]
    fn samples_stay_in_support() {
        let mut rng = RngService::new(0);
        let uniform = DistributionSpec::Uniform {
            low: 2.0,
            high: 4.0,
        }
        .build()
        .unwrap();
        let weibull = DistributionSpec::Weibull {
            shape: 2.0,
            scale: 3.0,
        }
        .build()
        .unwrap();
        for _ in 0..1000 {
            let x = rng.sample(&uniform);
            assert!((2.0..4.0).contains(&x));
            assert!(rng.sample(&weibull) >= 0.0);
        }
    }

    #[test]
    fn json_round_trip_uses_type_tag() {
        let spec: DistributionSpec =
            serde_json::from_str(r#"{"type": "gamma", "shape": 2.0, "scale": 1.5}"#).unwrap();
        assert_eq!(
            spec,
            DistributionSpec::Gamma {
                shape: 2.0,
                scale: 1.5
            }
        );
    }
}
