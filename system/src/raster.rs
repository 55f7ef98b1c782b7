use crate::error::SnapshotError;
use crate::surface::{Brush, Surface};
use crate::{Color, Point, Snapshot, MAX_SIDE};

/// Font size as a multiple of the stroke width.
const FONT_SCALE: f32 = 5.0;
/// Glyph cell width as a fraction of the font size.
const GLYPH_ASPECT: f32 = 0.6;

/// In-memory RGBA pixel grid implementing [`Surface`].
#[derive(Debug, Clone)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl Raster {
    /// Dimensions are clamped to `1..=MAX_SIDE`.
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = (clamp_side(width), clamp_side(height));
        Self {
            width,
            height,
            pixels: vec![Color::TRANSPARENT; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x < self.width && y < self.height {
            Some(self.pixels[self.index(x, y)])
        } else {
            None
        }
    }

    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    /// Flattens to `[r, g, b, a, ...]`, the layout of a browser `ImageData`.
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|c| [c.r, c.g, c.b, c.a])
            .collect()
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|c| *c == Color::TRANSPARENT)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn put(&mut self, x: i64, y: i64, color: Color) {
        if x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64 {
            let index = self.index(x as u32, y as u32);
            self.pixels[index] = color;
        }
    }

    fn dab(&mut self, center: Point, brush: &Brush) {
        let radius = (brush.width / 2.0).max(0.5);
        let reach = radius.ceil() as i64;
        let (cx, cy) = (center.x.round() as i64, center.y.round() as i64);
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                if ((dx * dx + dy * dy) as f32) <= radius * radius {
                    self.put(cx + dx, cy + dy, brush.color);
                }
            }
        }
    }

    /// Copies the overlapping top-left region of `pixels` into the surface.
    fn blit(&mut self, width: u32, height: u32, pixels: &[Color]) {
        let rows = height.min(self.height);
        let cols = width.min(self.width) as usize;
        for y in 0..rows {
            let src = y as usize * width as usize;
            let dst = self.index(0, y);
            self.pixels[dst..dst + cols].copy_from_slice(&pixels[src..src + cols]);
        }
    }

    fn fill_rect(&mut self, min: Point, max: Point, color: Color) {
        for y in min.y.round() as i64..max.y.round() as i64 {
            for x in min.x.round() as i64..max.x.round() as i64 {
                self.put(x, y, color);
            }
        }
    }
}

impl Surface for Raster {
    fn snapshot(&self) -> Result<Snapshot, SnapshotError> {
        Snapshot::encode(self.width, self.height, &self.pixels)
    }

    fn restore(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let image = snapshot.decode()?;
        self.clear();
        self.blit(image.width, image.height, &image.pixels);
        Ok(())
    }

    fn clear(&mut self) {
        for pixel in self.pixels.iter_mut() {
            *pixel = Color::TRANSPARENT;
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (clamp_side(width), clamp_side(height));
        if (width, height) == (self.width, self.height) {
            return;
        }
        let old = std::mem::replace(self, Raster::new(width, height));
        self.blit(old.width, old.height, &old.pixels);
    }

    fn stroke(&mut self, from: Point, to: Point, brush: &Brush) {
        let steps = (to - from).length().ceil().max(1.0) as u32;
        for step in 0..=steps {
            self.dab(from.lerp(to, step as f32 / steps as f32), brush);
        }
    }

    fn rectangle(&mut self, corner: Point, opposite: Point, brush: &Brush) {
        let top_right = Point::new(opposite.x, corner.y);
        let bottom_left = Point::new(corner.x, opposite.y);
        self.stroke(corner, top_right, brush);
        self.stroke(top_right, opposite, brush);
        self.stroke(opposite, bottom_left, brush);
        self.stroke(bottom_left, corner, brush);
    }

    fn ellipse(&mut self, center: Point, edge: Point, brush: &Brush) {
        let radius = (edge - center).length();
        let segments = (std::f32::consts::TAU * radius).ceil().max(16.0) as u32;
        let at = |i: u32| {
            let angle = std::f32::consts::TAU * i as f32 / segments as f32;
            Point::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            )
        };
        for i in 0..segments {
            self.stroke(at(i), at(i + 1), brush);
        }
    }

    // Glyph outlines belong to the UI toolkit; the raster marks each glyph's cell
    // so the stamped text occupies the right pixels in every snapshot.
    fn text(&mut self, at: Point, text: &str, brush: &Brush) {
        let size = brush.width * FONT_SCALE;
        let advance = size * GLYPH_ASPECT;
        for (i, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let left = at.x + advance * i as f32;
            self.fill_rect(
                Point::new(left + 1.0, at.y - size),
                Point::new(left + advance - 1.0, at.y),
                brush.color,
            );
        }
    }
}

fn clamp_side(side: u32) -> u32 {
    side.clamp(1, MAX_SIDE)
}
