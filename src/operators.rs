//! Structuring-element descriptors and the morphological operators built on
//! them: dilation, erosion, and the inf-sup / sup-inf curvature compositions.
//!
//! A descriptor is a family of structuring elements, each listing the
//! row-major neighborhood indices it touches (center at 4 in 2-D, 13 in
//! 3-D). `morph_op` evaluates every cell of the band against the frozen
//! embedding, stages the toggles, and commits them in one band update.

use crate::grid::Position;
use crate::narrow_band::BandOps;

/// A structuring-element family: rows of neighborhood indices.
pub type OperatorDescriptor = &'static [&'static [usize]];

/// The four discrete diameters of the 3×3 neighborhood.
pub const CURVATURE_2D: OperatorDescriptor = &[&[0, 8], &[1, 7], &[2, 6], &[3, 5]];

/// Every non-center neighbor of the 3×3 neighborhood.
pub const DILATE_ERODE_2D: OperatorDescriptor = &[&[0, 1, 2, 3, 5, 6, 7, 8]];

/// The nine discrete planes of the 3×3×3 neighborhood through its center.
pub const CURVATURE_3D: OperatorDescriptor = &[
    &[6, 7, 8, 12, 14, 18, 19, 20],
    &[9, 10, 11, 12, 14, 15, 16, 17],
    &[0, 1, 2, 12, 14, 24, 25, 26],
    &[0, 4, 8, 9, 17, 18, 22, 26],
    &[3, 4, 5, 12, 14, 21, 22, 23],
    &[2, 4, 6, 11, 15, 20, 22, 24],
    &[2, 5, 8, 10, 16, 18, 21, 24],
    &[1, 4, 7, 10, 16, 19, 22, 25],
    &[0, 3, 6, 10, 16, 20, 23, 26],
];

/// Every non-center neighbor of the 3×3×3 neighborhood.
pub const DILATE_ERODE_3D: OperatorDescriptor = &[&[
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26,
]];

/// Curvature descriptor for the given dimensionality.
///
/// Panics for dimensions other than 2 and 3; higher ranks have no defined
/// structuring-element family here.
pub fn curvature_descriptor(dim: usize) -> OperatorDescriptor {
    match dim {
        2 => CURVATURE_2D,
        3 => CURVATURE_3D,
        _ => panic!("curvature structuring elements are defined for 2-D and 3-D grids only"),
    }
}

/// Dilation/erosion descriptor for the given dimensionality.
pub fn dilate_erode_descriptor(dim: usize) -> OperatorDescriptor {
    match dim {
        2 => DILATE_ERODE_2D,
        3 => DILATE_ERODE_3D,
        _ => panic!("dilate/erode structuring elements are defined for 2-D and 3-D grids only"),
    }
}

/// Apply a structuring-element family over the narrow band.
///
/// A cell toggles when every element row has at least one referenced
/// neighbor matching the polarity (`inf_sup`): dilation for polarity 1,
/// erosion for polarity 0. Decisions read only the pre-commit embedding;
/// the single `update` at the end makes the result scan-order independent.
pub fn morph_op<'a, const D: usize, B, M>(
    descriptor: OperatorDescriptor,
    inf_sup: bool,
    band: &mut B,
    mask: M,
) where
    B: BandOps<'a, D>,
    M: Fn(&Position<D>) -> bool,
{
    let polarity = inf_sup as u8;
    let mut staged: Vec<Position<D>> = Vec::new();

    let embedding = band.embedding();
    for position in band.cells().keys() {
        // A cell already at the operator's polarity cannot change.
        if embedding.get(position.offset) == polarity || !mask(position) {
            continue;
        }

        let neighborhood = embedding.neighborhood(position);
        let mut should_toggle = true;
        for element in descriptor {
            let active = element
                .iter()
                .any(|&index| embedding.get(neighborhood.get(index).offset) == polarity);
            if !active {
                should_toggle = false;
                break;
            }
        }
        if should_toggle {
            staged.push(*position);
        }
    }

    for position in &staged {
        band.toggle_cell(position);
    }
    band.update();
}

/// Binary dilation with the full 3^D − 1 structuring element.
pub fn dilate<'a, const D: usize, B: BandOps<'a, D>>(band: &mut B) {
    morph_op(dilate_erode_descriptor(D), true, band, |_| true);
}

/// Binary erosion with the full 3^D − 1 structuring element.
pub fn erode<'a, const D: usize, B: BandOps<'a, D>>(band: &mut B) {
    morph_op(dilate_erode_descriptor(D), false, band, |_| true);
}

/// Dilation restricted to cells where `mask` holds.
pub fn dilate_masked<'a, const D: usize, B, M>(band: &mut B, mask: M)
where
    B: BandOps<'a, D>,
    M: Fn(&Position<D>) -> bool,
{
    morph_op(dilate_erode_descriptor(D), true, band, mask);
}

/// Erosion restricted to cells where `mask` holds.
pub fn erode_masked<'a, const D: usize, B, M>(band: &mut B, mask: M)
where
    B: BandOps<'a, D>,
    M: Fn(&Position<D>) -> bool,
{
    morph_op(dilate_erode_descriptor(D), false, band, mask);
}

/// One curvature-smoothing pass. Alternate `inf_sup` between successive
/// calls to approximate symmetric mean-curvature motion.
pub fn curv<'a, const D: usize, B: BandOps<'a, D>>(inf_sup: bool, band: &mut B) {
    morph_op(curvature_descriptor(D), inf_sup, band, |_| true);
}
