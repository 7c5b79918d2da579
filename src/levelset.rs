//! Initial level-set builders: a filled circle/ball and a checkerboard
//! pattern, for any number of dimensions.

use ndarray::{ArrayD, IxDyn};

#[cfg(feature = "python")]
use numpy::{IntoPyArray, PyArrayDyn};
#[cfg(feature = "python")]
use pyo3::exceptions::PyValueError;
#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Binary level set that is 1 inside a circle (sphere in 3-D and above).
///
/// `center` defaults to the middle of the grid and `radius` to 3/8 of the
/// smallest extent.
pub fn circle_level_set(shape: &[usize], center: Option<&[f64]>, radius: Option<f64>) -> ArrayD<u8> {
    let center: Vec<f64> = match center {
        Some(c) => {
            assert_eq!(c.len(), shape.len(), "center must have one entry per axis");
            c.to_vec()
        }
        None => shape.iter().map(|&extent| extent as f64 / 2.0).collect(),
    };
    let radius = radius
        .unwrap_or_else(|| shape.iter().copied().min().unwrap_or(0) as f64 * 3.0 / 8.0);

    ArrayD::from_shape_fn(IxDyn(shape), |idx| {
        let mut dist2 = 0.0;
        for (i, c) in center.iter().enumerate() {
            let d = idx[i] as f64 - c;
            dist2 += d * d;
        }
        u8::from(dist2 < radius * radius)
    })
}

/// Binary checkerboard level set with cells of `square_size` grid points.
pub fn checkerboard_level_set(shape: &[usize], square_size: usize) -> ArrayD<u8> {
    assert!(square_size > 0, "square_size must be positive");
    ArrayD::from_shape_fn(IxDyn(shape), |idx| {
        let mut parity = 0;
        for i in 0..shape.len() {
            parity ^= (idx[i] / square_size) % 2;
        }
        parity as u8
    })
}

// ── PyO3 wrappers ───────────────────────────────────────────────────────────

/// Circle/sphere level set (PyO3 wrapper).
#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "circle_level_set", signature = (shape, center=None, radius=None))]
pub fn circle_level_set_py(
    py: Python<'_>,
    shape: Vec<usize>,
    center: Option<Vec<f64>>,
    radius: Option<f64>,
) -> PyResult<Py<PyArrayDyn<u8>>> {
    if let Some(ref c) = center {
        if c.len() != shape.len() {
            return Err(PyValueError::new_err(
                "center must have one entry per axis",
            ));
        }
    }
    let result = circle_level_set(&shape, center.as_deref(), radius);
    Ok(result.into_pyarray(py).unbind())
}

/// Checkerboard level set (PyO3 wrapper).
#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "checkerboard_level_set", signature = (shape, square_size=5))]
pub fn checkerboard_level_set_py(
    py: Python<'_>,
    shape: Vec<usize>,
    square_size: usize,
) -> PyResult<Py<PyArrayDyn<u8>>> {
    if square_size == 0 {
        return Err(PyValueError::new_err("square_size must be positive"));
    }
    let result = checkerboard_level_set(&shape, square_size);
    Ok(result.into_pyarray(py).unbind())
}
