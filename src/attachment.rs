//! Image attachment: the data terms that decide which boundary cells flip.
//!
//! The geodesic driver compares the embedding's central-difference gradient
//! against the gradient of the edge indicator g; the Chan–Vese driver
//! compares each cell's intensity against the running inside/outside means
//! maintained by the ACWE band. Both stage their toggles against the frozen
//! embedding and commit with a single band update.

use crate::grid::{GridView, GridViewMut, Position};
use crate::narrow_band::{AcweNarrowBand, BandOps};

/// Geodesic (GAC) attachment.
///
/// For each cell, `dot = Σ_i ∂g/∂x_i · (u[p + e_i] − u[p − e_i])`; a one-cell
/// flips when riding downhill on g (`dot < 0`) and a zero-cell when riding
/// uphill (`dot > 0`), pulling the contour into edge troughs.
pub fn image_attachment_gac<'a, 'g, const D: usize, B>(
    band: &mut B,
    grads: &[GridView<'g, f64, D>; D],
) where
    B: BandOps<'a, D>,
{
    let mut staged: Vec<Position<D>> = Vec::new();

    let embedding = band.embedding();
    let stride = *embedding.stride();
    for position in band.cells().keys() {
        let mut dot = 0.0;
        for i in 0..D {
            let grad_i = grads[i].get_at(&position.coord);
            let u_next = embedding.get(position.offset + stride[i]) as f64;
            let u_prev = embedding.get(position.offset - stride[i]) as f64;
            dot += grad_i * (u_next - u_prev);
        }

        let val = embedding.get(position.offset);
        if (val == 1 && dot < 0.0) || (val == 0 && dot > 0.0) {
            staged.push(*position);
        }
    }

    for position in &staged {
        band.toggle_cell(position);
    }
    band.update();
}

/// True when the embedding's central difference vanishes along every axis,
/// i.e. the level set has no local normal direction at `position`.
pub fn has_zero_gradient<const D: usize>(
    embedding: &GridViewMut<'_, u8, D>,
    position: &Position<D>,
) -> bool {
    let stride = embedding.stride();
    for i in 0..D {
        let u_next = embedding.get(position.offset + stride[i]);
        let u_prev = embedding.get(position.offset - stride[i]);
        if u_next != u_prev {
            return false;
        }
    }
    true
}

/// Chan–Vese (ACWE) attachment.
///
/// With `c_in`/`c_out` the current region means, a cell flips when the
/// criterion `λ₁ (I − c_in)² − λ₂ (I − c_out)²` favours the other side.
/// Cells with zero embedding gradient are skipped; the commit still re-seeds
/// around flipped cells without that check.
pub fn image_attachment_acwe<const D: usize>(
    band: &mut AcweNarrowBand<'_, D>,
    lambda1: f64,
    lambda2: f64,
) {
    let average_in = band.average_inside();
    let average_out = band.average_outside();

    let mut staged: Vec<Position<D>> = Vec::new();
    let embedding = band.embedding();
    let image = band.image();
    for position in band.cells().keys() {
        if has_zero_gradient(embedding, position) {
            continue;
        }

        let image_val = image.get_at(&position.coord);
        let diff_in = image_val - average_in;
        let diff_out = image_val - average_out;
        let criterion = lambda1 * diff_in * diff_in - lambda2 * diff_out * diff_out;

        let val = embedding.get(position.offset);
        if (val == 0 && criterion < 0.0) || (val == 1 && criterion > 0.0) {
            staged.push(*position);
        }
    }

    for position in &staged {
        band.toggle_cell(position);
    }
    band.update();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{contiguous_strides, offset_of};
    use crate::narrow_band::NarrowBand;

    #[test]
    fn test_has_zero_gradient() {
        let shape = [5usize, 5];
        let stride = contiguous_strides(&shape);
        let mut data = vec![0u8; 25];
        // Vertical edge between columns 2 and 3.
        for r in 0..5 {
            for c in 3..5 {
                data[r * 5 + c] = 1;
            }
        }
        let view = GridViewMut::new(&mut data, shape, stride);

        let flat = Position {
            coord: [2, 1],
            offset: offset_of(&[2, 1], &stride),
        };
        assert!(has_zero_gradient(&view, &flat));

        let on_edge = Position {
            coord: [2, 3],
            offset: offset_of(&[2, 3], &stride),
        };
        assert!(!has_zero_gradient(&view, &on_edge));
    }

    #[test]
    fn test_gac_attachment_shifts_region_along_gradient() {
        // Rectangle of ones; a uniform +1 gradient along axis 1 pushes the
        // region one column towards lower column indices.
        let shape = [12usize, 12];
        let stride = contiguous_strides(&shape);
        let mut data = vec![0u8; 144];
        for r in 2..9 {
            for c in 3..7 {
                data[r * 12 + c] = 1;
            }
        }

        let grad0_data = vec![0.0f64; 144];
        let grad1_data = vec![1.0f64; 144];
        let grads = [
            GridView::new(&grad0_data[..], shape, stride),
            GridView::new(&grad1_data[..], shape, stride),
        ];

        let mut band = NarrowBand::new(GridViewMut::new(&mut data, shape, stride));
        image_attachment_gac(&mut band, &grads);
        drop(band);

        for r in 2..9 {
            for c in 0..12 {
                let expected = u8::from((2..6).contains(&c));
                assert_eq!(data[r * 12 + c], expected, "({r}, {c})");
            }
        }
    }

    #[test]
    fn test_acwe_attachment_grows_towards_bright_region() {
        let shape = [12usize, 12];
        let stride = contiguous_strides(&shape);
        // Bright square 3..9 x 3..9; embedding starts as the inner square.
        let mut image = vec![0.0f64; 144];
        for r in 3..9 {
            for c in 3..9 {
                image[r * 12 + c] = 1.0;
            }
        }
        let mut data = vec![0u8; 144];
        for r in 5..7 {
            for c in 5..7 {
                data[r * 12 + c] = 1;
            }
        }

        let before: u32 = data.iter().map(|&v| v as u32).sum();
        let mut band = AcweNarrowBand::new(
            GridViewMut::new(&mut data, shape, stride),
            GridView::new(&image[..], shape, stride),
        );
        image_attachment_acwe(&mut band, 1.0, 1.0);
        band.cleanup();
        drop(band);

        let after: u32 = data.iter().map(|&v| v as u32).sum();
        assert!(after > before, "region should grow ({before} -> {after})");
        // Growth must stay inside the bright square.
        for r in 0..12 {
            for c in 0..12 {
                if data[r * 12 + c] == 1 {
                    assert!((3..9).contains(&r) && (3..9).contains(&c));
                }
            }
        }
    }
}
