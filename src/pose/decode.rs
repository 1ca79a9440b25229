use ndarray::{ArrayD, ArrayViewD, Axis, Ix2};

use crate::error::DecodeError;
use crate::pose::keypoint::{Keypoint, KeypointIndex};
use crate::pose::preprocess::Letterbox;

/// Raw engine output: `(y, x, score)` rows normalised to the model input
/// square, optionally wrapped in leading unit axes (`[1, 1, 17, 3]`).
pub type RawOutput = ArrayD<f32>;

/// Map raw output onto frame pixel coordinates.
///
/// An output with zero rows is an empty pose, not an error. Any row count
/// other than zero or [`KeypointIndex::COUNT`] is a shape mismatch.
pub fn decode(raw: &RawOutput, letterbox: &Letterbox) -> Result<Vec<Keypoint>, DecodeError> {
    let rows = squeeze_leading(raw.view());

    let shape = rows.shape().to_vec();
    if shape.len() != 2 || shape[1] != 3 {
        return Err(DecodeError::ShapeMismatch {
            expected: KeypointIndex::COUNT,
            actual: raw.shape().to_vec(),
        });
    }
    match shape[0] {
        0 => return Ok(Vec::new()),
        KeypointIndex::COUNT => {}
        _ => {
            return Err(DecodeError::ShapeMismatch {
                expected: KeypointIndex::COUNT,
                actual: raw.shape().to_vec(),
            })
        }
    }

    let rows = rows
        .into_dimensionality::<Ix2>()
        .map_err(|_| DecodeError::ShapeMismatch {
            expected: KeypointIndex::COUNT,
            actual: raw.shape().to_vec(),
        })?;

    rows.axis_iter(Axis(0))
        .enumerate()
        .map(|(index, row)| {
            let (y_norm, x_norm, score) = (row[0], row[1], row[2]);
            if !(y_norm.is_finite() && x_norm.is_finite() && score.is_finite()) {
                return Err(DecodeError::NonFinite { index });
            }
            let (x, y) = letterbox.to_frame(x_norm, y_norm);
            Ok(Keypoint::new(x, y, score.clamp(0.0, 1.0)))
        })
        .collect()
}

fn squeeze_leading(mut view: ArrayViewD<'_, f32>) -> ArrayViewD<'_, f32> {
    while view.ndim() > 2 && view.shape()[0] == 1 {
        view = view.index_axis_move(Axis(0), 0);
    }
    view
}
