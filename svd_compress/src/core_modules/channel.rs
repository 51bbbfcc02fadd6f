// THEORY:
// The `Channel` module is the most fundamental data unit of the compression engine.
// An RGB image is never compressed as a whole; it is split into three independent
// color planes and each plane runs its own decomposition. A `Channel` is a "dumb"
// container for one of those planes.
//
// Key architectural principles:
// 1.  **Two Representations**: The raw channel keeps the original 0..255 intensities
//     and is the reference for error measurement. The normalized channel (0..1) is the
//     one all of the algebra runs on. Both are immutable once created.
// 2.  **Row/Column Convention**: A channel is an M x N matrix where M is the image
//     height (rows) and N is the image width (columns). The Gram matrix is therefore
//     N x N and the right singular vectors live in column space.
// 3.  **Labelled Data**: Every channel knows which color it is. The label carries no
//     numerical meaning but makes every log line and error point at the right plane.

pub mod channel {
    use crate::error::{CompressionError, Result};
    use nalgebra::DMatrix;
    use serde::{Deserialize, Serialize};
    use std::fmt;

    pub type Intensity = f64;
    pub type NormalizedIntensity = f64;

    /// The maximum value of an 8-bit intensity, used to move between the raw and
    /// normalized representations.
    pub const MAX_INTENSITY: f64 = 255.0;

    /// Which color plane a channel belongs to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum ChannelKind {
        Red,
        Green,
        Blue,
    }

    impl ChannelKind {
        pub const ALL: [ChannelKind; 3] = [ChannelKind::Red, ChannelKind::Green, ChannelKind::Blue];

        /// Index of this channel inside an interleaved RGB pixel.
        pub fn index(self) -> usize {
            match self {
                ChannelKind::Red => 0,
                ChannelKind::Green => 1,
                ChannelKind::Blue => 2,
            }
        }
    }

    impl fmt::Display for ChannelKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let name = match self {
                ChannelKind::Red => "red",
                ChannelKind::Green => "green",
                ChannelKind::Blue => "blue",
            };
            f.write_str(name)
        }
    }

    /// A raw color plane with intensities in 0..255.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Channel {
        /// The color this plane represents.
        pub kind: ChannelKind,
        /// The M x N intensity grid.
        data: DMatrix<Intensity>,
    }

    impl Channel {
        pub fn new(kind: ChannelKind, data: DMatrix<Intensity>) -> Self {
            Self { kind, data }
        }

        /// Builds a channel from a row-major byte buffer of `rows * cols` entries.
        pub fn from_row_major_bytes(kind: ChannelKind, rows: usize, cols: usize, bytes: &[u8]) -> Result<Self> {
            if bytes.len() != rows * cols {
                return Err(CompressionError::dimension_mismatch(
                    "channel from bytes",
                    format!("{} bytes ({rows}x{cols})", rows * cols),
                    format!("{} bytes", bytes.len()),
                ));
            }
            let data = DMatrix::from_row_iterator(rows, cols, bytes.iter().map(|&b| b as Intensity));
            Ok(Self { kind, data })
        }

        pub fn rows(&self) -> usize {
            self.data.nrows()
        }

        pub fn cols(&self) -> usize {
            self.data.ncols()
        }

        pub fn shape(&self) -> (usize, usize) {
            self.data.shape()
        }

        pub fn data(&self) -> &DMatrix<Intensity> {
            &self.data
        }

        /// Scales the channel into 0..1 for the algebra stages.
        pub fn normalize(&self) -> NormalizedChannel {
            NormalizedChannel {
                kind: self.kind,
                data: self.data.map(|value| value / MAX_INTENSITY),
            }
        }
    }

    /// A color plane scaled into 0..1.
    #[derive(Debug, Clone, PartialEq)]
    pub struct NormalizedChannel {
        pub kind: ChannelKind,
        data: DMatrix<NormalizedIntensity>,
    }

    impl NormalizedChannel {
        pub fn data(&self) -> &DMatrix<NormalizedIntensity> {
            &self.data
        }

        pub fn shape(&self) -> (usize, usize) {
            self.data.shape()
        }
    }

    /// The three planes of one image. All three always share a shape.
    #[derive(Debug, Clone, PartialEq)]
    pub struct RgbChannels {
        pub red: Channel,
        pub green: Channel,
        pub blue: Channel,
    }

    impl RgbChannels {
        pub fn new(red: Channel, green: Channel, blue: Channel) -> Result<Self> {
            let shape = red.shape();
            for other in [&green, &blue] {
                if other.shape() != shape {
                    return Err(CompressionError::dimension_mismatch(
                        "rgb channels",
                        format!("{}x{}", shape.0, shape.1),
                        format!("{}x{} ({} channel)", other.rows(), other.cols(), other.kind),
                    ));
                }
            }
            Ok(Self { red, green, blue })
        }

        /// The shared (rows, cols) of the three planes.
        pub fn shape(&self) -> (usize, usize) {
            self.red.shape()
        }

        pub fn iter(&self) -> impl Iterator<Item = &Channel> {
            [&self.red, &self.green, &self.blue].into_iter()
        }

        pub fn into_array(self) -> [Channel; 3] {
            [self.red, self.green, self.blue]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::channel::*;
    use nalgebra::DMatrix;

    #[test]
    fn from_row_major_bytes_keeps_row_order() {
        let channel = Channel::from_row_major_bytes(ChannelKind::Red, 2, 3, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(channel.shape(), (2, 3));
        assert_eq!(channel.data()[(0, 2)], 3.0);
        assert_eq!(channel.data()[(1, 0)], 4.0);
    }

    #[test]
    fn from_row_major_bytes_rejects_wrong_length() {
        let result = Channel::from_row_major_bytes(ChannelKind::Red, 2, 3, &[1, 2, 3]);
        assert!(result.is_err());
    }

    #[test]
    fn normalize_scales_into_unit_range() {
        let channel = Channel::new(ChannelKind::Blue, DMatrix::from_row_slice(1, 3, &[0.0, 51.0, 255.0]));
        let normalized = channel.normalize();
        assert_eq!(normalized.kind, ChannelKind::Blue);
        assert_eq!(normalized.data()[(0, 0)], 0.0);
        assert_eq!(normalized.data()[(0, 1)], 0.2);
        assert_eq!(normalized.data()[(0, 2)], 1.0);
    }

    #[test]
    fn rgb_channels_require_matching_shapes() {
        let red = Channel::new(ChannelKind::Red, DMatrix::zeros(2, 2));
        let green = Channel::new(ChannelKind::Green, DMatrix::zeros(2, 2));
        let blue = Channel::new(ChannelKind::Blue, DMatrix::zeros(2, 3));
        assert!(RgbChannels::new(red, green, blue).is_err());
    }

    #[test]
    fn channel_kinds_map_to_interleaved_offsets() {
        let offsets: Vec<usize> = ChannelKind::ALL.iter().map(|kind| kind.index()).collect();
        assert_eq!(offsets, vec![0, 1, 2]);
    }
}
