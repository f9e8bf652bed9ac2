//! Tray icon images: the themed base icon with a brightness gauge drawn over it

use anyhow::Context;
use image::RgbaImage;

const ICON_LIGHT: &[u8] = include_bytes!("../assets/icon-light.png");
const ICON_DARK: &[u8] = include_bytes!("../assets/icon-dark.png");

/// Proportions of the gauge, relative to a 64px icon
const REFERENCE_SIZE: f64 = 64.0;
const SHAPE_SIZE: f64 = 57.0;
const PEN_WIDTH: f64 = 5.0;
const FILL_INSET: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

/// Reads `SystemUsesLightTheme`, a missing value means light
#[cfg(windows)]
pub fn system_theme() -> Theme {
    const PERSONALIZE: &str = r"Software\Microsoft\Windows\CurrentVersion\Themes\Personalize";
    let value = crate::registry::RegKey::open_read(PERSONALIZE)
        .and_then(|key| key.get_dword("SystemUsesLightTheme"));
    match value {
        Ok(Some(0)) => Theme::Dark,
        Ok(_) => Theme::Light,
        Err(e) => {
            log::debug!("Unable to read the system theme: {}", e);
            Theme::Light
        }
    }
}

pub fn read_icon(theme: Theme) -> anyhow::Result<RgbaImage> {
    let bytes = match theme {
        Theme::Light => ICON_LIGHT,
        Theme::Dark => ICON_DARK,
    };
    let decoder = png::Decoder::new(bytes);
    let mut reader = decoder.read_info().context("Unable to read icon header")?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).context("Unable to decode icon")?;
    anyhow::ensure!(
        info.color_type == png::ColorType::Rgba && info.bit_depth == png::BitDepth::Eight,
        "Icon must be 8-bit RGBA, found {:?} {:?}",
        info.color_type,
        info.bit_depth
    );
    buf.truncate(info.buffer_size());
    RgbaImage::from_raw(info.width, info.height, buf).context("Icon buffer size mismatch")
}

/// Draws a ring with a disc inside, filled from the left in proportion to `brightness`.
/// The colour is taken from the top centre of the base image.
pub fn render(base: &RgbaImage, brightness: Option<u32>) -> RgbaImage {
    let mut img = base.clone();
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img;
    }
    let fraction = brightness.map_or(0.0, |b| b.min(100) as f64 / 100.0);
    let scale = width as f64 / REFERENCE_SIZE;
    let radius = SHAPE_SIZE * scale / 2.0;
    let half_pen = PEN_WIDTH * scale / 2.0;
    let inner_radius = radius - FILL_INSET * scale;
    let colour = *img.get_pixel(width / 2, 2.min(height - 1));

    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    let fill_right = (cx - inner_radius) + fraction * inner_radius * 2.0;

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let (px, py) = (x as f64 + 0.5, y as f64 + 0.5);
        let distance = ((px - cx).powi(2) + (py - cy).powi(2)).sqrt();
        let on_ring = (distance - radius).abs() <= half_pen;
        let filled = distance <= inner_radius && (x as f64) < fill_right;
        if on_ring || filled {
            *pixel = colour;
        }
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_both_themes() {
        for theme in [Theme::Light, Theme::Dark] {
            let icon = read_icon(theme).unwrap();
            assert_eq!(icon.dimensions(), (64, 64));
        }
    }

    #[test]
    fn unknown_brightness_draws_only_the_ring() {
        let base = read_icon(Theme::Light).unwrap();
        let colour = *base.get_pixel(32, 2);
        let img = render(&base, None);
        assert_eq!(*img.get_pixel(60, 32), colour);
        assert_eq!(*img.get_pixel(32, 32), *base.get_pixel(32, 32));
    }

    #[test]
    fn full_brightness_fills_the_disc() {
        let base = read_icon(Theme::Dark).unwrap();
        let colour = *base.get_pixel(32, 2);
        let img = render(&base, Some(100));
        assert_eq!(*img.get_pixel(32, 32), colour);
        assert_eq!(*img.get_pixel(44, 32), colour);
    }

    #[test]
    fn half_brightness_fills_the_left_half() {
        let base = read_icon(Theme::Light).unwrap();
        let colour = *base.get_pixel(32, 2);
        let img = render(&base, Some(50));
        assert_eq!(*img.get_pixel(25, 32), colour);
        assert_eq!(*img.get_pixel(38, 32), *base.get_pixel(38, 32));
        assert_ne!(*img.get_pixel(38, 32), colour);
    }
}
