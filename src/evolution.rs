//! Evolution controllers: one `step()` applies balloon (GAC only), image
//! attachment, the alternating curvature passes, and a band cleanup.
//!
//! The `morphological_chan_vese` / `morphological_geodesic_active_contour`
//! drivers wrap the controllers behind an ndarray boundary: they binarise
//! the initial level set, evolve an owned copy in place, and return it.

use ndarray::{Array, ArrayD, ArrayView, Dim, Dimension, Ix2, Ix3};

#[cfg(feature = "python")]
use numpy::{IntoPyArray, PyArrayDyn, PyReadonlyArrayDyn};
#[cfg(feature = "python")]
use pyo3::exceptions::PyValueError;
#[cfg(feature = "python")]
use pyo3::prelude::*;

use crate::attachment::{image_attachment_acwe, image_attachment_gac};
use crate::grid::{GridView, GridViewMut, Shape, Stride};
use crate::narrow_band::{AcweNarrowBand, BandOps, NarrowBand};
use crate::operators::{curv, dilate_masked, erode_masked};
use crate::preprocess::gradient;

fn fixed_shape<const D: usize>(shape: &[usize]) -> Shape<D> {
    let mut out = [0usize; D];
    out.copy_from_slice(shape);
    out
}

fn fixed_strides<const D: usize>(strides: &[isize]) -> Stride<D> {
    let mut out = [0isize; D];
    out.copy_from_slice(strides);
    out
}

fn grid_view<'v, const D: usize>(
    array: &ArrayView<'v, f64, Dim<[usize; D]>>,
) -> GridView<'v, f64, D>
where
    Dim<[usize; D]>: Dimension,
{
    let data = match array.to_slice() {
        Some(slice) => slice,
        None => panic!("image arrays must be in standard (row-major, contiguous) layout"),
    };
    GridView::new(data, fixed_shape(array.shape()), fixed_strides(array.strides()))
}

/// Morphological Chan–Vese evolution over an ACWE narrow band.
pub struct MorphAcwe<'a, const D: usize> {
    band: AcweNarrowBand<'a, D>,
    smoothing: usize,
    lambda1: f64,
    lambda2: f64,
    curv_is: bool,
}

impl<'a, const D: usize> MorphAcwe<'a, D> {
    pub fn new(band: AcweNarrowBand<'a, D>, smoothing: usize, lambda1: f64, lambda2: f64) -> Self {
        assert!(
            lambda1 > 0.0 && lambda2 > 0.0,
            "region weights lambda1 and lambda2 must be positive"
        );
        MorphAcwe {
            band,
            smoothing,
            lambda1,
            lambda2,
            curv_is: false,
        }
    }

    /// One evolution step: attachment, `smoothing` curvature passes with
    /// alternating polarity, then cleanup. The alternation state carries
    /// over to the next step.
    pub fn step(&mut self) {
        image_attachment_acwe(&mut self.band, self.lambda1, self.lambda2);
        for _ in 0..self.smoothing {
            curv(self.curv_is, &mut self.band);
            self.curv_is = !self.curv_is;
        }
        self.band.cleanup();
    }

    pub fn run(&mut self, iterations: usize) {
        for _ in 0..iterations {
            self.step();
        }
    }

    pub fn band(&self) -> &AcweNarrowBand<'a, D> {
        &self.band
    }
}

/// Morphological geodesic active contour evolution.
pub struct MorphGac<'a, const D: usize> {
    band: NarrowBand<'a, D>,
    gimage: GridView<'a, f64, D>,
    grads: [GridView<'a, f64, D>; D],
    smoothing: usize,
    threshold: f64,
    balloon: f64,
    curv_is: bool,
}

impl<'a, const D: usize> MorphGac<'a, D> {
    pub fn new(
        band: NarrowBand<'a, D>,
        gimage: GridView<'a, f64, D>,
        grads: [GridView<'a, f64, D>; D],
        smoothing: usize,
        threshold: f64,
        balloon: f64,
    ) -> Self {
        MorphGac {
            band,
            gimage,
            grads,
            smoothing,
            threshold,
            balloon,
            curv_is: false,
        }
    }

    /// One evolution step: balloon (when non-zero), attachment, `smoothing`
    /// curvature passes with alternating polarity, then cleanup.
    pub fn step(&mut self) {
        let gimage = &self.gimage;
        let threshold = self.threshold;
        let balloon = self.balloon;
        if balloon > 0.0 {
            dilate_masked(&mut self.band, |p| {
                gimage.get_at(&p.coord) > threshold / balloon
            });
        } else if balloon < 0.0 {
            erode_masked(&mut self.band, |p| {
                gimage.get_at(&p.coord) > -threshold / balloon
            });
        }

        image_attachment_gac(&mut self.band, &self.grads);

        for _ in 0..self.smoothing {
            curv(self.curv_is, &mut self.band);
            self.curv_is = !self.curv_is;
        }
        self.band.cleanup();
    }

    pub fn run(&mut self, iterations: usize) {
        for _ in 0..iterations {
            self.step();
        }
    }

    pub fn band(&self) -> &NarrowBand<'a, D> {
        &self.band
    }
}

/// Run a full Chan–Vese evolution and return the final embedding.
///
/// The initial level set is binarised (non-zero → 1) and must split the grid
/// into a non-empty interior and exterior.
pub fn morphological_chan_vese<const D: usize>(
    image: ArrayView<'_, f64, Dim<[usize; D]>>,
    init_level_set: ArrayView<'_, u8, Dim<[usize; D]>>,
    iterations: usize,
    smoothing: usize,
    lambda1: f64,
    lambda2: f64,
) -> Array<u8, Dim<[usize; D]>>
where
    Dim<[usize; D]>: Dimension,
{
    assert_eq!(
        image.shape(),
        init_level_set.shape(),
        "image and initial level set must have the same shape"
    );
    let image = image.as_standard_layout();
    let mut embedding = init_level_set.mapv(|v| u8::from(v != 0));

    let shape = fixed_shape::<D>(embedding.shape());
    let stride = fixed_strides::<D>(embedding.strides());
    {
        let image_view = grid_view(&image.view());
        let data = match embedding.as_slice_mut() {
            Some(slice) => slice,
            None => panic!("embedding must be in standard (row-major, contiguous) layout"),
        };
        let band = AcweNarrowBand::new(GridViewMut::new(data, shape, stride), image_view);
        let mut solver = MorphAcwe::new(band, smoothing, lambda1, lambda2);
        solver.run(iterations);
    }
    embedding
}

/// Run a full geodesic evolution over the edge indicator `gimage` and return
/// the final embedding. The g-gradients are computed internally.
pub fn morphological_geodesic_active_contour<const D: usize>(
    gimage: ArrayView<'_, f64, Dim<[usize; D]>>,
    init_level_set: ArrayView<'_, u8, Dim<[usize; D]>>,
    iterations: usize,
    smoothing: usize,
    threshold: f64,
    balloon: f64,
) -> Array<u8, Dim<[usize; D]>>
where
    Dim<[usize; D]>: Dimension,
{
    assert_eq!(
        gimage.shape(),
        init_level_set.shape(),
        "edge indicator and initial level set must have the same shape"
    );
    let gimage = gimage.as_standard_layout();
    let grads = gradient(gimage.view());
    let mut embedding = init_level_set.mapv(|v| u8::from(v != 0));

    let shape = fixed_shape::<D>(embedding.shape());
    let stride = fixed_strides::<D>(embedding.strides());
    {
        let g_view = grid_view(&gimage.view());
        let grad_views: [GridView<'_, f64, D>; D] =
            std::array::from_fn(|i| grid_view(&grads[i].view()));
        let data = match embedding.as_slice_mut() {
            Some(slice) => slice,
            None => panic!("embedding must be in standard (row-major, contiguous) layout"),
        };
        let band = NarrowBand::new(GridViewMut::new(data, shape, stride));
        let mut solver = MorphGac::new(band, g_view, grad_views, smoothing, threshold, balloon);
        solver.run(iterations);
    }
    embedding
}

/// Rank-dispatching front for dynamic-dimensional arrays (2-D or 3-D).
pub fn morphological_chan_vese_dyn(
    image: &ArrayD<f64>,
    init_level_set: &ArrayD<u8>,
    iterations: usize,
    smoothing: usize,
    lambda1: f64,
    lambda2: f64,
) -> Result<ArrayD<u8>, &'static str> {
    if image.shape() != init_level_set.shape() {
        return Err("image and initial level set must have the same shape");
    }
    match image.ndim() {
        2 => {
            let image = view_as::<Ix2, f64>(image)?;
            let init = view_as::<Ix2, u8>(init_level_set)?;
            Ok(
                morphological_chan_vese::<2>(image, init, iterations, smoothing, lambda1, lambda2)
                    .into_dyn(),
            )
        }
        3 => {
            let image = view_as::<Ix3, f64>(image)?;
            let init = view_as::<Ix3, u8>(init_level_set)?;
            Ok(
                morphological_chan_vese::<3>(image, init, iterations, smoothing, lambda1, lambda2)
                    .into_dyn(),
            )
        }
        _ => Err("only 2-D and 3-D arrays are supported"),
    }
}

/// Rank-dispatching front for dynamic-dimensional arrays (2-D or 3-D).
pub fn morphological_geodesic_active_contour_dyn(
    gimage: &ArrayD<f64>,
    init_level_set: &ArrayD<u8>,
    iterations: usize,
    smoothing: usize,
    threshold: f64,
    balloon: f64,
) -> Result<ArrayD<u8>, &'static str> {
    if gimage.shape() != init_level_set.shape() {
        return Err("edge indicator and initial level set must have the same shape");
    }
    match gimage.ndim() {
        2 => {
            let gimage = view_as::<Ix2, f64>(gimage)?;
            let init = view_as::<Ix2, u8>(init_level_set)?;
            Ok(morphological_geodesic_active_contour::<2>(
                gimage, init, iterations, smoothing, threshold, balloon,
            )
            .into_dyn())
        }
        3 => {
            let gimage = view_as::<Ix3, f64>(gimage)?;
            let init = view_as::<Ix3, u8>(init_level_set)?;
            Ok(morphological_geodesic_active_contour::<3>(
                gimage, init, iterations, smoothing, threshold, balloon,
            )
            .into_dyn())
        }
        _ => Err("only 2-D and 3-D arrays are supported"),
    }
}

fn view_as<Dm: Dimension, T>(array: &ArrayD<T>) -> Result<ArrayView<'_, T, Dm>, &'static str> {
    array
        .view()
        .into_dimensionality::<Dm>()
        .map_err(|_| "array rank does not match the requested dimensionality")
}

// ── PyO3 wrappers ───────────────────────────────────────────────────────────

/// Morphological Chan–Vese segmentation (PyO3 wrapper).
///
/// Args:
///     image: 2D or 3D array (float64).
///     iterations: Number of evolution steps.
///     init_level_set: Initial level set, same shape (uint8; non-zero → 1).
///     smoothing: Curvature passes per step.
///     lambda1, lambda2: Inside/outside region weights.
///
/// Returns:
///     Final binary level set (uint8).
#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(
    name = "morphological_chan_vese",
    signature = (image, iterations, init_level_set, smoothing=1, lambda1=1.0, lambda2=1.0)
)]
pub fn morphological_chan_vese_py(
    py: Python<'_>,
    image: PyReadonlyArrayDyn<'_, f64>,
    iterations: usize,
    init_level_set: PyReadonlyArrayDyn<'_, u8>,
    smoothing: usize,
    lambda1: f64,
    lambda2: f64,
) -> PyResult<Py<PyArrayDyn<u8>>> {
    let image = image.as_array().to_owned();
    let init = init_level_set.as_array().to_owned();

    let result = py
        .allow_threads(|| {
            morphological_chan_vese_dyn(&image, &init, iterations, smoothing, lambda1, lambda2)
        })
        .map_err(PyValueError::new_err)?;
    Ok(result.into_pyarray(py).unbind())
}

/// Morphological geodesic active contour segmentation (PyO3 wrapper).
///
/// Args:
///     gimage: Edge indicator g, 2D or 3D (float64); see
///         `inverse_gaussian_gradient`.
///     iterations: Number of evolution steps.
///     init_level_set: Initial level set, same shape (uint8; non-zero → 1).
///     smoothing: Curvature passes per step.
///     threshold: Balloon activity threshold.
///     balloon: Balloon force (positive inflates, negative deflates, 0 off).
///
/// Returns:
///     Final binary level set (uint8).
#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(
    name = "morphological_geodesic_active_contour",
    signature = (gimage, iterations, init_level_set, smoothing=1, threshold=0.0, balloon=0.0)
)]
pub fn morphological_geodesic_active_contour_py(
    py: Python<'_>,
    gimage: PyReadonlyArrayDyn<'_, f64>,
    iterations: usize,
    init_level_set: PyReadonlyArrayDyn<'_, u8>,
    smoothing: usize,
    threshold: f64,
    balloon: f64,
) -> PyResult<Py<PyArrayDyn<u8>>> {
    let gimage = gimage.as_array().to_owned();
    let init = init_level_set.as_array().to_owned();

    let result = py
        .allow_threads(|| {
            morphological_geodesic_active_contour_dyn(
                &gimage, &init, iterations, smoothing, threshold, balloon,
            )
        })
        .map_err(PyValueError::new_err)?;
    Ok(result.into_pyarray(py).unbind())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levelset::circle_level_set;
    use ndarray::Array2;

    fn sym_diff(a: &Array2<u8>, b: &Array2<u8>) -> u32 {
        a.iter().zip(b.iter()).map(|(&x, &y)| u32::from(x != y)).sum()
    }

    #[test]
    fn test_chan_vese_recovers_disk() {
        // Binary disk image; a smaller concentric disk must grow onto it.
        let target = circle_level_set(&[64, 64], None, Some(15.0));
        let target: Array2<u8> = target.into_dimensionality().unwrap();
        let image = target.mapv(f64::from);
        let init = circle_level_set(&[64, 64], None, Some(10.0));
        let init: Array2<u8> = init.into_dimensionality().unwrap();

        let result =
            morphological_chan_vese::<2>(image.view(), init.view(), 200, 1, 1.0, 1.0);

        let diff = sym_diff(&result, &target);
        // Tolerate a thin rim: a small fraction of the perimeter (2π·15 ≈ 94).
        assert!(diff <= 60, "symmetric difference {diff} too large");
    }

    #[test]
    fn test_chan_vese_shrinks_onto_disk_from_outside() {
        let target = circle_level_set(&[64, 64], None, Some(12.0));
        let target: Array2<u8> = target.into_dimensionality().unwrap();
        let image = target.mapv(f64::from);
        let init = circle_level_set(&[64, 64], None, Some(20.0));
        let init: Array2<u8> = init.into_dimensionality().unwrap();

        let result =
            morphological_chan_vese::<2>(image.view(), init.view(), 200, 1, 1.0, 1.0);
        let diff = sym_diff(&result, &target);
        assert!(diff <= 60, "symmetric difference {diff} too large");
    }

    #[test]
    fn test_geodesic_contour_locks_onto_square_trough() {
        // g is 1 everywhere except a deep trough on the outline of the
        // square [22, 42) x [22, 42); a deflating balloon shrinks the
        // initial disk until the contour rests on the trough.
        let mut gimage = Array2::<f64>::from_elem((64, 64), 1.0);
        for r in 22..42 {
            for c in 22..42 {
                if r == 22 || r == 41 || c == 22 || c == 41 {
                    gimage[[r, c]] = 0.05;
                }
            }
        }
        let init = circle_level_set(&[64, 64], None, Some(26.0));
        let init: Array2<u8> = init.into_dimensionality().unwrap();

        let result = morphological_geodesic_active_contour::<2>(
            gimage.view(),
            init.view(),
            100,
            2,
            0.4,
            -1.0,
        );

        let target = Array2::from_shape_fn((64, 64), |(r, c)| {
            u8::from((22..42).contains(&r) && (22..42).contains(&c))
        });
        let diff = sym_diff(&result, &target);
        // Within a couple of pixels of the square's edge (perimeter ≈ 80).
        assert!(diff <= 100, "symmetric difference {diff} too large");

        // The contour never escapes the initial disk.
        for ((r, c), &v) in result.indexed_iter() {
            if v == 1 {
                assert_eq!(init[[r, c]], 1, "escaped at ({r}, {c})");
            }
        }
    }

    #[test]
    fn test_chan_vese_recovers_ball_3d() {
        use ndarray::Array3;

        let target = circle_level_set(&[24, 24, 24], None, Some(7.0));
        let target: Array3<u8> = target.into_dimensionality().unwrap();
        let image = target.mapv(f64::from);
        let init = circle_level_set(&[24, 24, 24], None, Some(5.0));
        let init: Array3<u8> = init.into_dimensionality().unwrap();

        let result =
            morphological_chan_vese::<3>(image.view(), init.view(), 60, 1, 1.0, 1.0);

        let diff: u32 = result
            .iter()
            .zip(target.iter())
            .map(|(&x, &y)| u32::from(x != y))
            .sum();
        // Small relative to the ball surface (4π·7² ≈ 616).
        assert!(diff <= 300, "symmetric difference {diff} too large");
    }

    #[test]
    fn test_dyn_front_rejects_unsupported_rank() {
        let image = ArrayD::<f64>::zeros(vec![4, 4, 4, 4]);
        let init = ArrayD::<u8>::zeros(vec![4, 4, 4, 4]);
        assert!(morphological_chan_vese_dyn(&image, &init, 1, 1, 1.0, 1.0).is_err());

        let image = ArrayD::<f64>::zeros(vec![4, 4]);
        let init = ArrayD::<u8>::zeros(vec![4, 5]);
        assert!(morphological_chan_vese_dyn(&image, &init, 1, 1, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_balloon_inflates_and_deflates() {
        // Uniform g = 1 with zero gradient: only the balloon acts.
        let gimage = Array2::<f64>::from_elem((32, 32), 1.0);
        let init = circle_level_set(&[32, 32], None, Some(6.0));
        let init: Array2<u8> = init.into_dimensionality().unwrap();
        let area_before: u32 = init.iter().map(|&v| u32::from(v)).sum();

        let grown = morphological_geodesic_active_contour::<2>(
            gimage.view(),
            init.view(),
            3,
            0,
            0.0,
            1.0,
        );
        let area_grown: u32 = grown.iter().map(|&v| u32::from(v)).sum();
        assert!(area_grown > area_before);

        let shrunk = morphological_geodesic_active_contour::<2>(
            gimage.view(),
            init.view(),
            3,
            0,
            0.0,
            -1.0,
        );
        let area_shrunk: u32 = shrunk.iter().map(|&v| u32::from(v)).sum();
        assert!(area_shrunk < area_before);
    }
}
