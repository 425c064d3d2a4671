#![cfg(feature = "host")]
//! Host-side previews of an SSD1306 [`Frame`] as PNG files.

use crate::ssd1306::{Frame, HEIGHT, WIDTH};
use png::{BitDepth, ColorType, Encoder};
use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Colour of a lit pixel in the preview.
pub const ON_COLOR: [u8; 3] = [0x9C, 0xDC, 0xFE];
/// Colour of a dark pixel in the preview.
pub const OFF_COLOR: [u8; 3] = [0x00, 0x00, 0x00];

/// Render `frame` into an 8-bit RGB PNG, each display pixel a `scale` x `scale` square.
///
/// Parent directories are created as needed.
///
/// # Errors
///
/// Returns file system and PNG encoding errors.
///
/// # Panics
///
/// Panics if `scale` is zero.
pub fn write_frame_png(
    frame: &Frame,
    output_path: impl AsRef<Path>,
    scale: u32,
) -> Result<(), Box<dyn Error>> {
    let output_path = output_path.as_ref();
    let (width, height, pixels) = frame_pixels(frame, scale);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(output_path)?;
    let mut encoder = Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(ColorType::Rgb);
    encoder.set_depth(BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&pixels)?;
    writer.finish()?;
    println!("wrote PNG to {}", output_path.display());
    Ok(())
}

/// Scaled RGB bytes of `frame`, row-major, with the image width and height.
///
/// # Panics
///
/// Panics if `scale` is zero.
#[must_use]
pub fn frame_pixels(frame: &Frame, scale: u32) -> (u32, u32, Vec<u8>) {
    assert!(scale > 0, "scale must be positive");
    let scale = scale as usize;
    let width = WIDTH * scale;
    let height = HEIGHT * scale;
    let mut bytes = Vec::with_capacity(width * height * 3);

    for y in 0..height {
        for x in 0..width {
            let color = if frame.pixel(x / scale, y / scale) {
                ON_COLOR
            } else {
                OFF_COLOR
            };
            bytes.extend_from_slice(&color);
        }
    }

    let width = u32::try_from(width).expect("scaled width must fit in u32");
    let height = u32::try_from(height).expect("scaled height must fit in u32");
    (width, height, bytes)
}
