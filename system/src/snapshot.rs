use crate::error::SnapshotError;
use crate::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Largest accepted width or height. Bounds the allocation a received snapshot can ask for.
pub const MAX_SIDE: u32 = 8192;

/// A PNG image of the whole drawing surface at one instant.
///
/// Snapshots are never mutated: every edit produces a new one. The buffer is
/// shared, so handing the same snapshot to many connections does not copy it.
#[derive(Clone, Serialize, Deserialize)]
pub struct Snapshot(Arc<[u8]>);

/// Pixels recovered from a [`Snapshot`], row-major.
#[derive(Debug)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl Snapshot {
    /// Writes `pixels`, which must hold `width * height` entries, as an 8-bit RGBA PNG.
    pub fn encode(width: u32, height: u32, pixels: &[Color]) -> Result<Self, SnapshotError> {
        let rgba = pixels
            .iter()
            .flat_map(|c| [c.r, c.g, c.b, c.a])
            .collect::<Vec<u8>>();
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, width, height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&rgba)?;
            writer.finish()?;
        }
        Ok(Self(bytes.into()))
    }

    /// Decodes any 8- or 16-bit PNG; palette and low bit depth images are expanded.
    pub fn decode(&self) -> Result<DecodedImage, SnapshotError> {
        let mut decoder = png::Decoder::new(&self.0[..]);
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder.read_info()?;

        let (width, height) = (reader.info().width, reader.info().height);
        if width > MAX_SIDE || height > MAX_SIDE {
            return Err(SnapshotError::TooLarge {
                width,
                height,
                limit: MAX_SIDE,
            });
        }

        let mut buf = vec![0; reader.output_buffer_size()];
        let frame = reader.next_frame(&mut buf)?;
        let data = &buf[..frame.buffer_size()];
        let pixels = match frame.color_type {
            png::ColorType::Rgba => data
                .chunks_exact(4)
                .map(|p| Color::rgba(p[0], p[1], p[2], p[3]))
                .collect(),
            png::ColorType::Rgb => data
                .chunks_exact(3)
                .map(|p| Color::rgb(p[0], p[1], p[2]))
                .collect(),
            png::ColorType::GrayscaleAlpha => data
                .chunks_exact(2)
                .map(|p| Color::rgba(p[0], p[0], p[0], p[1]))
                .collect(),
            png::ColorType::Grayscale => data.iter().map(|g| Color::rgb(*g, *g, *g)).collect(),
            other => return Err(SnapshotError::ColorType(other)),
        };
        Ok(DecodedImage {
            width,
            height,
            pixels,
        })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether both handles point at the same encoded buffer.
    pub fn ptr_eq(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Snapshot({} bytes)", self.0.len())
    }
}
