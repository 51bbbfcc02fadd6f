// The I/O boundary of the engine. Nothing in `core_modules` touches files; this is
// where images become channels and reconstructed channels become PNGs again.

pub mod image_helper {
    use crate::core_modules::channel::channel::{Channel, ChannelKind, RgbChannels};
    use crate::core_modules::rank_reconstructor::RankApproximation;
    use crate::error::{CompressionError, Result};
    use image::codecs::png::PngEncoder;
    use image::{ImageEncoder, RgbImage};
    use std::path::{Path, PathBuf};
    use tracing::{debug, info};

    /// File name of the reconstruction at rank `k`.
    pub fn rank_image_filename(k: usize) -> String {
        format!("compressed_k{k}.png")
    }

    /// Loads any supported image, converts it to 8-bit RGB and splits it into planes.
    pub fn load_rgb_channels<P: AsRef<Path>>(path: P) -> Result<RgbChannels> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CompressionError::ResourceNotFound {
                path: path.to_path_buf(),
            });
        }

        let image = image::open(path)?.to_rgb8();
        info!(path = %path.display(), width = image.width(), height = image.height(), "image loaded");
        split_channels(&image)
    }

    /// Splits an RGB image into three M x N planes (M = height, N = width).
    pub fn split_channels(image: &RgbImage) -> Result<RgbChannels> {
        let (width, height) = image.dimensions();
        let (rows, cols) = (height as usize, width as usize);
        let plane = |kind: ChannelKind| {
            let bytes: Vec<u8> = image.as_raw().iter().skip(kind.index()).step_by(3).copied().collect();
            Channel::from_row_major_bytes(kind, rows, cols, &bytes)
        };
        RgbChannels::new(plane(ChannelKind::Red)?, plane(ChannelKind::Green)?, plane(ChannelKind::Blue)?)
    }

    /// Interleaves three reconstructed planes back into an RGB image.
    pub fn merge_channels(
        red: &RankApproximation,
        green: &RankApproximation,
        blue: &RankApproximation,
    ) -> Result<RgbImage> {
        let (rows, cols) = red.shape();
        for plane in [green, blue] {
            if plane.shape() != (rows, cols) {
                return Err(CompressionError::dimension_mismatch(
                    "merge channels",
                    format!("{rows}x{cols}"),
                    format!("{}x{}", plane.shape().0, plane.shape().1),
                ));
            }
        }

        let planes = [red.to_row_major_bytes(), green.to_row_major_bytes(), blue.to_row_major_bytes()];
        let mut interleaved = Vec::with_capacity(rows * cols * 3);
        for index in 0..rows * cols {
            interleaved.extend(planes.iter().map(|plane| plane[index]));
        }

        RgbImage::from_raw(cols as u32, rows as u32, interleaved).ok_or_else(|| {
            CompressionError::dimension_mismatch("merge channels", format!("{rows}x{cols} RGB buffer"), "short buffer")
        })
    }

    /// Writes `image` as `compressed_k<k>.png` inside `directory` and returns the path.
    pub fn save_rank_image<P: AsRef<Path>>(directory: P, k: usize, image: &RgbImage) -> Result<PathBuf> {
        let path = directory.as_ref().join(rank_image_filename(k));
        let output = std::fs::File::create(&path)?;
        let encoder = PngEncoder::new(output);

        encoder.write_image(image.as_raw(), image.width(), image.height(), image::ExtendedColorType::Rgb8)?;

        debug!(path = %path.display(), k, "rank image written");
        Ok(path)
    }
}
