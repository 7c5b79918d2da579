//! Morphological active contours on a sparse narrow band.
//!
//! Implements the morphological approach to curvature-based evolution of
//! curves and surfaces (Márquez-Neila, Baumela, Álvarez, IEEE TPAMI 2014):
//! the PDE terms of the classical active-contour models are replaced by
//! binary morphological operators applied only on the cells adjacent to the
//! contour, so the embedding stays a 0/1 array and every step is a handful
//! of cheap local decisions.
//!
//! Two evolutions are provided, for 2-D and 3-D grids alike:
//!
//! - [`morphological_chan_vese`] — region competition between the running
//!   inside/outside intensity means (active contours without edges).
//! - [`morphological_geodesic_active_contour`] — attraction to the troughs
//!   of an edge indicator `g`, with an optional balloon force; build `g`
//!   with [`inverse_gaussian_gradient`].
//!
//! [`morphological_chan_vese`]: evolution::morphological_chan_vese
//! [`morphological_geodesic_active_contour`]: evolution::morphological_geodesic_active_contour
//! [`inverse_gaussian_gradient`]: preprocess::inverse_gaussian_gradient

#[cfg(feature = "python")]
use pyo3::prelude::*;

pub mod attachment;
pub mod evolution;
pub mod grid;
pub mod levelset;
pub mod narrow_band;
pub mod operators;
pub mod preprocess;

pub use attachment::{has_zero_gradient, image_attachment_acwe, image_attachment_gac};
pub use evolution::{
    morphological_chan_vese, morphological_chan_vese_dyn,
    morphological_geodesic_active_contour, morphological_geodesic_active_contour_dyn, MorphAcwe,
    MorphGac,
};
pub use grid::{GridView, GridViewMut, NeighborOffsets, Position};
pub use levelset::{checkerboard_level_set, circle_level_set};
pub use narrow_band::{AcweNarrowBand, BandOps, Cell, CellMap, NarrowBand};
pub use operators::{
    curv, dilate, dilate_masked, erode, erode_masked, morph_op, OperatorDescriptor, CURVATURE_2D,
    CURVATURE_3D, DILATE_ERODE_2D, DILATE_ERODE_3D,
};
pub use preprocess::{
    gaussian_filter, gaussian_gradient_magnitude, gradient, inverse_gaussian_gradient, rgb2gray,
};

#[cfg(feature = "python")]
#[pymodule]
fn morphsnakes(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    py_module.add_function(wrap_pyfunction!(
        evolution::morphological_chan_vese_py,
        py_module
    )?)?;
    py_module.add_function(wrap_pyfunction!(
        evolution::morphological_geodesic_active_contour_py,
        py_module
    )?)?;
    py_module.add_function(wrap_pyfunction!(
        preprocess::inverse_gaussian_gradient_py,
        py_module
    )?)?;
    py_module.add_function(wrap_pyfunction!(preprocess::gaussian_filter_py, py_module)?)?;
    py_module.add_function(wrap_pyfunction!(levelset::circle_level_set_py, py_module)?)?;
    py_module.add_function(wrap_pyfunction!(
        levelset::checkerboard_level_set_py,
        py_module
    )?)?;

    py_module.add(
        "__doc__",
        "Morphological active contours (ACWE and geodesic) on a sparse narrow band.",
    )?;

    Ok(())
}
