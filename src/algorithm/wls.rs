//! Weighted least squares with robust standard errors.
//!
//! Solves `β = (X'WX)⁻¹ X'Wy` and reports a sandwich covariance
//! `V = c · (X'WX)⁻¹ B (X'WX)⁻¹`:
//!
//! - clustered (Liang–Zeger): `B = Σ_g s_g s_g'`, `s_g = Σ_{i∈g} w_i e_i x_i`,
//!   `c = G/(G−1) · (N−1)/(N−K)`, inference on `t(G−1)`;
//! - HC1: `B = Σ_i (w_i e_i)² x_i x_i'`, `c = N/(N−K)`, inference on `t(N−K)`.
//!
//! Before solving, the weighted Gram matrix is factorised with a pivot
//! tolerance so that a collinear column is named instead of being silently
//! absorbed by a pseudo-inverse.
//!
//! # References
//!
//! - Cameron & Miller (2015), "A Practitioner's Guide to Cluster-Robust
//!   Inference." *Journal of Human Resources*.

use std::collections::BTreeMap;

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::algorithm::design::DesignMatrix;
use crate::config::ClusterBy;
use crate::error::{AbsenceError, Result};

/// Relative pivot below which a column counts as collinear
const COLLINEARITY_TOLERANCE: f64 = 1e-10;

/// A fitted weighted regression
#[derive(Debug, Clone)]
pub struct WlsFit {
    pub coefficients: DVector<f64>,
    /// Robust covariance of the coefficients
    pub covariance: DMatrix<f64>,
    /// Weighted R²
    pub r_squared: f64,
    pub n_obs: usize,
    pub n_params: usize,
    /// Clusters used (rows for HC1)
    pub clusters: usize,
    /// Degrees of freedom for t critical values
    pub df: f64,
    pub policy: ClusterBy,
}

impl WlsFit {
    #[must_use]
    pub fn std_error(&self, j: usize) -> f64 {
        self.covariance[(j, j)].max(0.0).sqrt()
    }

    /// Two-sided confidence interval for coefficient `j`
    pub fn confidence_interval(&self, j: usize, level: f64) -> Result<(f64, f64)> {
        let t = StudentsT::new(0.0, 1.0, self.df).map_err(|e| {
            AbsenceError::InvalidConfig(format!("t distribution with df={}: {e}", self.df))
        })?;
        let critical = t.inverse_cdf(1.0 - (1.0 - level) / 2.0);
        let beta = self.coefficients[j];
        let half_width = critical * self.std_error(j);
        Ok((beta - half_width, beta + half_width))
    }
}

/// Cholesky factor of `gram`, or the index of the first column that is
/// (numerically) a linear combination of the columns before it.
///
/// A factor whose squared pivot falls below a relative tolerance counts as
/// rank-deficient even when nalgebra accepts it.
pub fn factor_gram(gram: &DMatrix<f64>) -> std::result::Result<Cholesky<f64, Dyn>, usize> {
    if let Some(chol) = gram.clone().cholesky() {
        return match weak_pivot(&chol, gram) {
            Some(j) => Err(j),
            None => Ok(chol),
        };
    }

    // Grow the leading block until it stops factoring cleanly
    let k = gram.nrows();
    for n in 1..=k {
        let block = gram.view((0, 0), (n, n)).clone_owned();
        match block.clone().cholesky() {
            None => return Err(n - 1),
            Some(chol) => {
                if let Some(j) = weak_pivot(&chol, &block) {
                    return Err(j);
                }
            }
        }
    }
    Err(k.saturating_sub(1))
}

fn weak_pivot(chol: &Cholesky<f64, Dyn>, gram: &DMatrix<f64>) -> Option<usize> {
    let l = chol.l_dirty();
    (0..gram.nrows()).find(|&j| {
        let diag = gram[(j, j)];
        let pivot = l[(j, j)] * l[(j, j)];
        diag <= 0.0 || pivot.is_nan() || pivot <= COLLINEARITY_TOLERANCE * diag
    })
}

/// Fit `design` by WLS with the given standard-error policy
pub fn fit_wls(design: &DesignMatrix, policy: ClusterBy) -> Result<WlsFit> {
    let n = design.n_obs();
    let k = design.n_params();
    let insufficient = |reason: String| AbsenceError::insufficient_data(&design.label, reason);

    if n <= k {
        return Err(insufficient(format!(
            "{n} cells cannot identify {k} parameters"
        )));
    }

    let x = &design.x;
    let w = &design.weights;
    let xw = DMatrix::from_fn(n, k, |i, j| x[(i, j)] * w[i]);
    let gram = x.transpose() * &xw;

    let chol = factor_gram(&gram).map_err(|j| {
        insufficient(format!(
            "design is rank-deficient: column {} is collinear with earlier columns",
            design.columns[j]
        ))
    })?;
    let beta = chol.solve(&(xw.transpose() * &design.y));
    let gram_inv = chol.inverse();

    let fitted = x * &beta;
    let resid = &design.y - &fitted;

    let weight_sum: f64 = w.iter().sum();
    let y_bar = w.dot(&design.y) / weight_sum;
    let tss: f64 = w
        .iter()
        .zip(design.y.iter())
        .map(|(wi, yi)| wi * (yi - y_bar).powi(2))
        .sum();
    let rss: f64 = w.iter().zip(resid.iter()).map(|(wi, ei)| wi * ei * ei).sum();
    let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { 0.0 };

    let (scores, clusters) = match policy {
        ClusterBy::State => cluster_scores(x, w, &resid, &design.clusters),
        ClusterBy::Unclustered => {
            let scores = DMatrix::from_fn(n, k, |i, j| w[i] * resid[i] * x[(i, j)]);
            (scores, n)
        }
    };

    let n_f = n as f64;
    let k_f = k as f64;
    let (correction, df) = match policy {
        ClusterBy::State => {
            if clusters < 2 {
                return Err(insufficient(format!(
                    "clustered standard errors need at least 2 clusters, found {clusters}"
                )));
            }
            let g = clusters as f64;
            ((g / (g - 1.0)) * ((n_f - 1.0) / (n_f - k_f)), g - 1.0)
        }
        ClusterBy::Unclustered => (n_f / (n_f - k_f), n_f - k_f),
    };

    let meat = scores.transpose() * &scores;
    let covariance = (&gram_inv * meat * &gram_inv) * correction;

    Ok(WlsFit {
        coefficients: beta,
        covariance,
        r_squared,
        n_obs: n,
        n_params: k,
        clusters,
        df,
        policy,
    })
}

/// Per-cluster score sums `s_g = Σ_{i∈g} w_i e_i x_i`, one row per cluster in
/// ascending cluster-id order
fn cluster_scores(
    x: &DMatrix<f64>,
    w: &DVector<f64>,
    resid: &DVector<f64>,
    cluster_ids: &[u64],
) -> (DMatrix<f64>, usize) {
    // Dense ids in ascending cluster order keep the summation reproducible
    let mut index: BTreeMap<u64, usize> = cluster_ids.iter().map(|&id| (id, 0)).collect();
    for (dense, slot) in index.values_mut().enumerate() {
        *slot = dense;
    }

    let g = index.len();
    let k = x.ncols();
    let mut scores = DMatrix::<f64>::zeros(g, k);
    for (i, id) in cluster_ids.iter().enumerate() {
        let row = index[id];
        let u = w[i] * resid[i];
        for j in 0..k {
            scores[(row, j)] += u * x[(i, j)];
        }
    }
    (scores, g)
}
