use std::sync::Arc;

/// 4x4 Bayer threshold matrix, values 0..16
const BAYER_4X4: [[u8; 4]; 4] = [
    [0, 8, 2, 10],
    [12, 4, 14, 6],
    [3, 11, 1, 9],
    [15, 7, 13, 5],
];

pub const RGB565_BLACK: u16 = 0x0000;
pub const RGB565_WHITE: u16 = 0xFFFF;

/// Preview/capture frame in RGB565, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Sensor frame counter
    pub id: u64,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel data (shared ownership so preview copies stay cheap)
    pub pixels: Arc<Vec<u16>>,
}

impl Frame {
    pub fn new(id: u64, width: u32, height: u32, pixels: Vec<u16>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize);
        Self {
            id,
            width,
            height,
            pixels: Arc::new(pixels),
        }
    }

    /// Frame filled with a single colour
    pub fn solid(id: u64, width: u32, height: u32, color: u16) -> Self {
        Self::new(id, width, height, vec![color; width as usize * height as usize])
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn same_dimensions(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Blend `self` (weight `alpha`) over `newest` (weight `1 - alpha`).
    /// Returns `None` when the dimensions differ, e.g. after a resolution change.
    pub fn blend_over(&self, newest: &Frame, alpha: f32) -> Option<Frame> {
        if !self.same_dimensions(newest) {
            return None;
        }

        let alpha = alpha.clamp(0.0, 1.0);
        let pixels = self
            .pixels
            .iter()
            .zip(newest.pixels.iter())
            .map(|(old, new)| {
                let [or, og, ob] = rgb565_to_rgb8(*old);
                let [nr, ng, nb] = rgb565_to_rgb8(*new);
                rgb8_to_rgb565([
                    mix(or, nr, alpha),
                    mix(og, ng, alpha),
                    mix(ob, nb, alpha),
                ])
            })
            .collect();

        Some(Frame::new(newest.id, newest.width, newest.height, pixels))
    }

    /// Ordered dither to pure black and white
    pub fn dithered(&self) -> Frame {
        let width = self.width as usize;
        let pixels = self
            .pixels
            .iter()
            .enumerate()
            .map(|(i, px)| {
                let (x, y) = (i % width, i / width);
                let threshold = (BAYER_4X4[y % 4][x % 4] as u16 * 16) + 8;
                if luma(*px) as u16 >= threshold {
                    RGB565_WHITE
                } else {
                    RGB565_BLACK
                }
            })
            .collect();

        Frame::new(self.id, self.width, self.height, pixels)
    }

    /// Packed RGB8 bytes for encoders
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|px| rgb565_to_rgb8(*px))
            .collect()
    }
}

fn mix(old: u8, new: u8, alpha: f32) -> u8 {
    (old as f32 * alpha + new as f32 * (1.0 - alpha)).round() as u8
}

/// Rec. 601 luma of an RGB565 pixel, 0..=255
pub fn luma(px: u16) -> u8 {
    let [r, g, b] = rgb565_to_rgb8(px);
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
}

pub fn rgb565_to_rgb8(px: u16) -> [u8; 3] {
    let r = ((px >> 11) & 0x1F) as u8;
    let g = ((px >> 5) & 0x3F) as u8;
    let b = (px & 0x1F) as u8;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
}

pub fn rgb8_to_rgb565([r, g, b]: [u8; 3]) -> u16 {
    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3)
}
