//! Thrust calibration curves.
//!
//! Lookup tables measured on the test stand map thrust (in N) to current draw (in A)
//! and to ESC pulse width (in us). At startup each table is fitted once with a
//! fixed-degree polynomial; the fitted curves are immutable afterwards.

use std::fs;
use std::path::Path;

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::CalibrationLoadError;

mod polynomial;
pub use polynomial::{Polynomial, REAL_ROOT_TOLERANCE};

/// Degree of the thrust to current curve.
pub const CURRENT_DEGREE: usize = 6;

/// Degree of the thrust to PWM curve.
pub const PWM_DEGREE: usize = 5;

/// Singular values below this fraction of the largest are ignored when fitting.
const FIT_RCOND: f64 = 1e-12;

/// Measured `(thrust, value)` samples.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleTable {
    pub thrust: Vec<f64>,
    pub value: Vec<f64>,
}

impl SampleTable {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let (thrust, value) = pairs.into_iter().unzip();
        Self { thrust, value }
    }

    /// Load a table of `thrust<TAB>value` lines.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CalibrationLoadError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| CalibrationLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&path.display().to_string(), &contents)
    }

    /// Parse table text. Blank lines and `#` comments are skipped.
    /// `source_name` is only used in error messages.
    pub fn parse(source_name: &str, contents: &str) -> Result<Self, CalibrationLoadError> {
        let mut table = SampleTable::default();

        for (i, line) in contents.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = trimmed.split('\t').collect();
            if fields.len() != 2 {
                return Err(CalibrationLoadError::ColumnCount {
                    source_name: source_name.to_owned(),
                    line: i + 1,
                    found: fields.len(),
                });
            }

            let parse = |field: &str| {
                field
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| CalibrationLoadError::InvalidNumber {
                        source_name: source_name.to_owned(),
                        line: i + 1,
                        field: field.to_owned(),
                    })
            };

            table.thrust.push(parse(fields[0])?);
            table.value.push(parse(fields[1])?);
        }

        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.thrust.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thrust.is_empty()
    }
}

/// A named polynomial fitted to a sample table.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationCurve {
    name: &'static str,
    polynomial: Polynomial,
}

impl CalibrationCurve {
    pub fn new(name: &'static str, polynomial: Polynomial) -> Self {
        Self { name, polynomial }
    }

    /// Least-squares fit of a `degree` polynomial to `table`.
    ///
    /// The model is linear in its coefficients, so the optimum is the solution
    /// of the Vandermonde system. Columns are normalised before the SVD solve
    /// since thrust^6 spans many orders of magnitude.
    pub fn fit(
        name: &'static str,
        degree: usize,
        table: &SampleTable,
    ) -> Result<Self, CalibrationLoadError> {
        let terms = degree + 1;
        if table.len() < terms {
            return Err(CalibrationLoadError::TooFewSamples {
                name,
                required: terms,
                found: table.len(),
            });
        }

        let scales: Vec<f64> = (0..terms)
            .map(|k| {
                let norm = table
                    .thrust
                    .iter()
                    .map(|x| x.powi(k as i32).powi(2))
                    .sum::<f64>()
                    .sqrt();
                if norm > 0. {
                    norm
                } else {
                    1.
                }
            })
            .collect();

        let vandermonde = DMatrix::from_fn(table.len(), terms, |i, k| {
            table.thrust[i].powi(k as i32) / scales[k]
        });
        let values = DVector::from_column_slice(&table.value);

        let svd = vandermonde.svd(true, true);
        let eps = FIT_RCOND * svd.singular_values.max();
        let solution = svd
            .solve(&values, eps)
            .map_err(|reason| CalibrationLoadError::Fit {
                name,
                reason: reason.to_owned(),
            })?;

        let coefficients: Vec<f64> = solution
            .iter()
            .zip(&scales)
            .map(|(c, scale)| c / scale)
            .collect();

        if !coefficients.iter().all(|c| c.is_finite()) {
            return Err(CalibrationLoadError::Fit {
                name,
                reason: "non-finite coefficients".to_owned(),
            });
        }

        debug!(name, ?coefficients, samples = table.len(), "fitted calibration curve");

        Ok(Self::new(name, Polynomial::new(coefficients)))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn polynomial(&self) -> &Polynomial {
        &self.polynomial
    }

    pub fn eval(&self, thrust: f64) -> f64 {
        self.polynomial.eval(thrust)
    }
}

/// Both calibration curves the engine needs.
#[derive(Clone, Debug, PartialEq)]
pub struct Calibration {
    /// Current draw (in A) of one thruster at a given thrust (in N)
    pub thrust_to_current: CalibrationCurve,
    /// ESC pulse width (in us) producing a given thrust (in N)
    pub thrust_to_pwm: CalibrationCurve,
}

impl Calibration {
    pub fn fit(current: &SampleTable, pwm: &SampleTable) -> Result<Self, CalibrationLoadError> {
        Ok(Self {
            thrust_to_current: CalibrationCurve::fit("thrust_to_current", CURRENT_DEGREE, current)?,
            thrust_to_pwm: CalibrationCurve::fit("thrust_to_pwm", PWM_DEGREE, pwm)?,
        })
    }

    /// Load and fit both tables. Any failure here is fatal for the engine.
    pub fn load<P, Q>(current: P, pwm: Q) -> Result<Self, CalibrationLoadError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let current = SampleTable::from_file(current)?;
        let pwm = SampleTable::from_file(pwm)?;
        Self::fit(&current, &pwm)
    }
}
