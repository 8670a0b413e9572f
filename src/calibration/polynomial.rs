use nalgebra::{linalg::Schur, Complex, DMatrix};

/// Schur iterations allowed per degree before root finding gives up.
const SCHUR_ITERATIONS_PER_DEGREE: usize = 200;

/// A root is real when its imaginary part is this small relative to its magnitude.
pub const REAL_ROOT_TOLERANCE: f64 = 1e-9;

/// A real polynomial with coefficients in ascending order, `c[0] + c[1] x + ...`.
#[derive(Clone, Debug, PartialEq)]
pub struct Polynomial {
    coefficients: Vec<f64>,
}

impl Polynomial {
    pub fn new(coefficients: Vec<f64>) -> Self {
        if coefficients.is_empty() {
            Self::zero()
        } else {
            Self { coefficients }
        }
    }

    pub fn zero() -> Self {
        Self {
            coefficients: vec![0.],
        }
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Nominal degree, including any vanishing leading coefficients.
    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Evaluate with Horner's method.
    pub fn eval(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0., |acc, c| acc * x + c)
    }

    /// Drop leading coefficients that vanish relative to the largest one.
    pub fn trimmed(&self) -> Polynomial {
        let largest = self
            .coefficients
            .iter()
            .fold(0f64, |acc, c| acc.max(c.abs()));
        let cutoff = largest * f64::EPSILON;

        match self.coefficients.iter().rposition(|c| c.abs() > cutoff) {
            Some(last) => Polynomial::new(self.coefficients[..=last].to_vec()),
            None => Polynomial::zero(),
        }
    }

    /// All complex roots, or `None` if the eigenvalue iteration failed to converge.
    ///
    /// Roots are the eigenvalues of the companion matrix of the trimmed polynomial.
    /// The variable is rescaled so the roots have unit geometric mean before the
    /// companion matrix is formed, which keeps its entries balanced.
    /// Constant polynomials have no roots.
    pub fn roots(&self) -> Option<Vec<Complex<f64>>> {
        let trimmed = self.trimmed();
        let c = trimmed.coefficients();
        let n = trimmed.degree();

        match n {
            0 => return Some(Vec::new()),
            1 => return Some(vec![Complex::new(-c[0] / c[1], 0.)]),
            _ => {}
        }

        // Exact zero roots are factored out so the scale is well defined
        let zeros = c.iter().take_while(|c| **c == 0.).count();
        let c = &c[zeros..];
        let m = c.len() - 1;

        let mut roots = vec![Complex::new(0., 0.); zeros];
        match m {
            0 => return Some(roots),
            1 => {
                roots.push(Complex::new(-c[0] / c[1], 0.));
                return Some(roots);
            }
            _ => {}
        }

        let scale = (c[0] / c[m]).abs().powf(1. / m as f64);
        let scaled: Vec<f64> = c
            .iter()
            .enumerate()
            .map(|(k, c)| c * scale.powi(k as i32))
            .collect();
        let lead = scaled[m];

        let mut companion = DMatrix::<f64>::zeros(m, m);
        for i in 0..m {
            if i > 0 {
                companion[(i, i - 1)] = 1.;
            }
            companion[(i, m - 1)] = -scaled[i] / lead;
        }

        let schur = Schur::try_new(companion, f64::EPSILON, SCHUR_ITERATIONS_PER_DEGREE * m)?;
        roots.extend(
            schur
                .complex_eigenvalues()
                .iter()
                .map(|root| Complex::new(root.re * scale, root.im * scale)),
        );

        Some(roots)
    }

    /// Real roots with non-negative real part, ascending.
    /// Complex roots are filtered out, never coerced to their real part.
    pub fn real_non_negative_roots(&self) -> Option<Vec<f64>> {
        let mut roots: Vec<f64> = self
            .roots()?
            .into_iter()
            .filter(|root| root.im.abs() <= REAL_ROOT_TOLERANCE * root.re.abs().max(1.))
            .map(|root| root.re)
            .filter(|re| *re >= 0.)
            .collect();
        roots.sort_by(|a, b| a.total_cmp(b));

        Some(roots)
    }
}
