//! Pick-buffer pixel format.
//!
//! ```text
//!   R = feature_id        & 0xff
//!   G = feature_id >>  8  & 0xff
//!   B = feature_id >> 16  & 0xff
//!   A = worker_id              (255 = no feature)
//! ```

use crate::worker::WorkerId;

/// Alpha value marking an empty pixel.
pub const EMPTY_ALPHA: u8 = 255;

/// Pixel the pick buffer is cleared to.
pub const EMPTY_PIXEL: [u8; 4] = [0, 0, 0, EMPTY_ALPHA];

/// Largest feature id representable in the RGB channels.
pub const MAX_FEATURE_ID: u32 = (1 << 24) - 1;

/// Identity of a feature as drawn into the pick buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectionColor {
    pub feature_id: u32,
    pub worker_id: WorkerId,
}

impl SelectionColor {
    /// Creates a color; the feature id is truncated to 24 bits.
    pub fn new(feature_id: u32, worker_id: WorkerId) -> Self {
        debug_assert!(worker_id.get() != EMPTY_ALPHA, "worker id 255 is reserved");
        Self {
            feature_id: feature_id & MAX_FEATURE_ID,
            worker_id,
        }
    }

    pub fn encode(&self) -> [u8; 4] {
        [
            (self.feature_id & 0xff) as u8,
            ((self.feature_id >> 8) & 0xff) as u8,
            ((self.feature_id >> 16) & 0xff) as u8,
            self.worker_id.get(),
        ]
    }

    /// Encoded color as normalized floats, as shaders consume it.
    pub fn to_rgba_f32(&self) -> [f32; 4] {
        self.encode().map(|c| c as f32 / 255.0)
    }
}

/// Result of decoding a pick-buffer pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Picked {
    Empty,
    Feature(SelectionColor),
}

/// Decodes a pick-buffer pixel.
pub fn decode(pixel: [u8; 4]) -> Picked {
    let [r, g, b, a] = pixel;
    if a == EMPTY_ALPHA {
        return Picked::Empty;
    }
    Picked::Feature(SelectionColor {
        feature_id: r as u32 | (g as u32) << 8 | (b as u32) << 16,
        worker_id: WorkerId::new(a),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_pixel() {
        assert_eq!(decode(EMPTY_PIXEL), Picked::Empty);
        assert_eq!(decode([12, 34, 56, 255]), Picked::Empty);
    }

    #[test]
    fn test_known_encoding() {
        let color = SelectionColor::new(0x0a0b0c, WorkerId::new(3));
        assert_eq!(color.encode(), [0x0c, 0x0b, 0x0a, 3]);
    }

    #[test]
    fn test_feature_id_truncated() {
        let color = SelectionColor::new(0x01ff_ffff, WorkerId::new(0));
        assert_eq!(color.feature_id, MAX_FEATURE_ID);
    }

    proptest! {
        #[test]
        fn prop_round_trip(feature_id in 0u32..=MAX_FEATURE_ID, worker in 0u8..=254) {
            let color = SelectionColor::new(feature_id, WorkerId::new(worker));
            prop_assert_eq!(decode(color.encode()), Picked::Feature(color));
        }
    }
}
