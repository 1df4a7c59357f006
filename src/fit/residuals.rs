//! Normalized residuals across the four datasets.
//!
//! A residual is `(observed - predicted) / uncertainty`. The joint objective
//! handed to the minimizer is the concatenation of every dataset's residuals in
//! a fixed order, so the vector length and segment layout never change between
//! calls within one fit.

use nalgebra::DMatrix;

use crate::domain::{Dataset, DatasetGroup, N_PARAMS, ParamVector, Process};
use crate::error::FitError;
use crate::models::{ModelFn, gradient, model_for};

/// A dataset together with the process whose model predicts it.
pub type DatasetModelPair<'a> = (&'a Dataset, Process);

/// Elementwise `(observed - predicted) / uncertainty`.
///
/// Zero uncertainties are not special-cased here; `Dataset` already rejects them.
pub fn residual(observed: &[f64], predicted: &[f64], uncertainty: &[f64]) -> Result<Vec<f64>, FitError> {
    if observed.len() != predicted.len() || observed.len() != uncertainty.len() {
        return Err(FitError::schema(
            "residual",
            format!(
                "length mismatch: observed={}, predicted={}, uncertainty={}",
                observed.len(),
                predicted.len(),
                uncertainty.len()
            ),
        ));
    }

    Ok(observed
        .iter()
        .zip(predicted)
        .zip(uncertainty)
        .map(|((&o, &p), &e)| (o - p) / e)
        .collect())
}

/// Residuals of one dataset under `model`.
pub fn residual_for_dataset(dataset: &Dataset, model: ModelFn, params: &ParamVector) -> Result<Vec<f64>, FitError> {
    let predicted = model(dataset.x(), params);
    residual(dataset.exp_y(), &predicted, dataset.err())
        .map_err(|e| relabel(e, dataset.process()))
}

/// Concatenated residuals of every pair, in the given order.
pub fn residual_for_all(pairs: &[DatasetModelPair<'_>], params: &ParamVector) -> Result<Vec<f64>, FitError> {
    let total: usize = pairs.iter().map(|(d, _)| d.len()).sum();
    let mut out = Vec::with_capacity(total);
    for &(dataset, process) in pairs {
        out.extend(residual_for_dataset(dataset, model_for(process), params)?);
    }
    Ok(out)
}

/// Jacobian of `residual_for_all` with respect to the parameters.
///
/// Row `i` corresponds to residual `i`; since the residual is
/// `(y - f) / err`, each row is `-∇f / err`.
pub fn jacobian_for_all(pairs: &[DatasetModelPair<'_>], params: &ParamVector) -> DMatrix<f64> {
    let total: usize = pairs.iter().map(|(d, _)| d.len()).sum();
    let mut jac = DMatrix::<f64>::zeros(total, N_PARAMS);

    let mut i = 0;
    for &(dataset, process) in pairs {
        for (&x, &err) in dataset.x().iter().zip(dataset.err()) {
            let g = gradient(process, x, params);
            for j in 0..N_PARAMS {
                jac[(i, j)] = -g[j] / err;
            }
            i += 1;
        }
    }
    jac
}

/// Pair every dataset of the group with its own process model, in canonical order.
pub fn canonical_pairs(group: &DatasetGroup) -> Vec<DatasetModelPair<'_>> {
    group.iter().map(|d| (d, d.process())).collect()
}

/// Sum of squared residuals.
pub fn chi_squared(residuals: &[f64]) -> f64 {
    residuals.iter().map(|r| r * r).sum()
}

fn relabel(err: FitError, process: Process) -> FitError {
    match err {
        FitError::Schema { message, .. } => FitError::schema(process.label(), message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DataRow;
    use crate::models::{predict, theor_dpp};
    use approx::assert_relative_eq;

    const P: ParamVector = ParamVector([2.0, 3.0, 4.0, 5.0, 1.0]);

    fn dataset(process: Process, n: usize) -> Dataset {
        let rows = (0..n).map(|i| {
            let x = 0.1 * (i + 1) as f64;
            DataRow {
                x,
                exp_y: predict(process, x, &P) * 1.1,
                err: 0.05 + 0.01 * i as f64,
            }
        });
        Dataset::new(process, rows).unwrap()
    }

    #[test]
    fn residual_is_normalized_difference() {
        let r = residual(&[3.0, 1.0], &[1.0, 2.0], &[0.5, 2.0]).unwrap();
        assert_eq!(r, vec![4.0, -0.5]);
    }

    #[test]
    fn residual_rejects_mismatched_lengths() {
        let err = residual(&[1.0, 2.0], &[1.0], &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, FitError::Schema { .. }));
    }

    #[test]
    fn dataset_residual_length_matches_rows() {
        for n in [1, 3, 17] {
            let ds = dataset(Process::Dpp, n);
            let r = residual_for_dataset(&ds, theor_dpp, &P).unwrap();
            assert_eq!(r.len(), n);
        }
    }

    #[test]
    fn residual_is_zero_at_exact_data() {
        let rows = [0.2, 0.4].map(|x| DataRow {
            x,
            exp_y: predict(Process::Dpp, x, &P),
            err: 0.1,
        });
        let ds = Dataset::new(Process::Dpp, rows).unwrap();
        let r = residual_for_dataset(&ds, theor_dpp, &P).unwrap();
        assert!(r.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn concatenation_length_is_sum_of_rows_for_any_order() {
        let ds: Vec<Dataset> = Process::ALL
            .iter()
            .zip([3, 5, 2, 7])
            .map(|(&p, n)| dataset(p, n))
            .collect();

        let forward: Vec<DatasetModelPair<'_>> = ds.iter().map(|d| (d, d.process())).collect();
        let backward: Vec<DatasetModelPair<'_>> = forward.iter().rev().copied().collect();

        assert_eq!(residual_for_all(&forward, &P).unwrap().len(), 17);
        assert_eq!(residual_for_all(&backward, &P).unwrap().len(), 17);
    }

    #[test]
    fn concatenation_preserves_segment_order() {
        let group = DatasetGroup::new(Process::ALL.map(|p| dataset(p, 2))).unwrap();
        let pairs = canonical_pairs(&group);
        let all = residual_for_all(&pairs, &P).unwrap();
        let ppp = residual_for_dataset(group.get(Process::Ppp), model_for(Process::Ppp), &P).unwrap();
        assert_eq!(&all[4..6], ppp.as_slice());
        assert_eq!(all, residual_for_all(&pairs, &P).unwrap());
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let group = DatasetGroup::new(Process::ALL.map(|p| dataset(p, 3))).unwrap();
        let pairs = canonical_pairs(&group);
        let q = ParamVector([1.5, 2.5, 3.5, 4.5, 0.8]);
        let jac = jacobian_for_all(&pairs, &q);
        assert_eq!(jac.shape(), (12, N_PARAMS));

        let h = 1e-7;
        for j in 0..N_PARAMS {
            let mut up = q;
            let mut down = q;
            up.0[j] += h;
            down.0[j] -= h;
            let r_up = residual_for_all(&pairs, &up).unwrap();
            let r_down = residual_for_all(&pairs, &down).unwrap();
            for i in 0..12 {
                let numeric = (r_up[i] - r_down[i]) / (2.0 * h);
                assert_relative_eq!(jac[(i, j)], numeric, epsilon = 1e-5, max_relative = 1e-5);
            }
        }
    }

    #[test]
    fn chi_squared_sums_squares() {
        assert_eq!(chi_squared(&[1.0, -2.0, 3.0]), 14.0);
    }
}
