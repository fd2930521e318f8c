//! Button icon compositing.
//!
//! Every function here is a pure transform: they take pixels (or colours)
//! and return new ones without touching the filesystem, except
//! [`render_button_icon`] which decodes the source file first.
//!
//! The pipeline for an icon is *decode → [`fit_to_box`] → [`apply_opacity`]*.
//! Opacity must come last: resizing after attenuating alpha would resample
//! the already-reduced alpha channel.

use crate::config::{ButtonConfig, Theme};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use log::warn;
use std::fmt;
use std::path::Path;

/// Width of a rendered button in pixels.
pub const BUTTON_WIDTH: u32 = 150;
/// Height of a rendered button in pixels.
pub const BUTTON_HEIGHT: u32 = 100;
/// Largest intermediate image [`fit_to_box`] will allocate before cropping.
pub const MAX_SCALED_PIXELS: u64 = 16 * 1024 * 1024;

/// Errors produced while compositing.
#[derive(Debug, thiserror::Error)]
pub enum CompositeError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("cannot fit into an empty box ({width}x{height})")]
    EmptyBox { width: u32, height: u32 },
    #[error("source image has no pixels")]
    EmptyImage,
    #[error("invalid colour {0:?}, expected #RRGGBB")]
    InvalidColor(String),
}

//  Colours

/// An opaque RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` (the leading `#` is required, hex digits are
    /// case-insensitive).
    pub fn from_hex(s: &str) -> Result<Self, CompositeError> {
        let invalid = || CompositeError::InvalidColor(s.to_string());
        let digits = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid());
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Lower-case `#rrggbb`.
    pub fn to_hex(self) -> String {
        self.to_string()
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Simulate a translucent background colour over a solid backdrop.
///
/// Each channel is linearly interpolated,
/// `source * opacity + background * (1 - opacity)`, and rounded.  This is
/// not alpha compositing: the result is only correct when the widget really
/// is drawn over `background`.  At 100 % the input string is returned as
/// given.
pub fn blend_over_background(
    hex_color: &str,
    opacity_percent: u8,
    background: impl Into<Rgb>,
) -> Result<String, CompositeError> {
    let source = Rgb::from_hex(hex_color)?;
    if opacity_percent >= 100 {
        return Ok(hex_color.to_string());
    }
    let background = background.into();
    let opacity = f64::from(opacity_percent) / 100.0;
    let mix = |s: u8, b: u8| (f64::from(s) * opacity + f64::from(b) * (1.0 - opacity)).round() as u8;
    Ok(Rgb::new(
        mix(source.r, background.r),
        mix(source.g, background.g),
        mix(source.b, background.b),
    )
    .to_hex())
}

//  Images

/// Scale `image` to cover a `box_width × box_height` box, then center-crop
/// the overflow so the result is exactly the box size.
///
/// A relatively wider image is scaled to the box height and loses columns
/// on both sides; otherwise it is scaled to the box width and loses rows.
/// When the scaled image would exceed [`MAX_SCALED_PIXELS`] (an extreme
/// aspect ratio), the same center region is cropped from the source first
/// and only that is scaled.
pub fn fit_to_box(
    image: &DynamicImage,
    box_width: u32,
    box_height: u32,
) -> Result<DynamicImage, CompositeError> {
    if box_width == 0 || box_height == 0 {
        return Err(CompositeError::EmptyBox {
            width: box_width,
            height: box_height,
        });
    }
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(CompositeError::EmptyImage);
    }

    let img_ratio = f64::from(width) / f64::from(height);
    let box_ratio = f64::from(box_width) / f64::from(box_height);
    let (new_width, new_height) = if img_ratio > box_ratio {
        ((f64::from(box_height) * img_ratio).round() as u32, box_height)
    } else {
        (box_width, (f64::from(box_width) / img_ratio).round() as u32)
    };
    // Guard against float rounding landing one pixel short of the box.
    let new_width = new_width.max(box_width);
    let new_height = new_height.max(box_height);

    if u64::from(new_width) * u64::from(new_height) > MAX_SCALED_PIXELS {
        // Crop the surviving center out of the source first and scale only that.
        let (crop_width, crop_height) = if img_ratio > box_ratio {
            (((f64::from(height) * box_ratio).round() as u32).clamp(1, width), height)
        } else {
            (width, ((f64::from(width) / box_ratio).round() as u32).clamp(1, height))
        };
        let center = image.crop_imm(
            (width - crop_width) / 2,
            (height - crop_height) / 2,
            crop_width,
            crop_height,
        );
        return Ok(center.resize_exact(box_width, box_height, FilterType::Lanczos3));
    }

    let resized = image.resize_exact(new_width, new_height, FilterType::Lanczos3);
    let left = (new_width - box_width) / 2;
    let top = (new_height - box_height) / 2;
    Ok(resized.crop_imm(left, top, box_width, box_height))
}

/// Multiply every alpha value by `opacity_percent / 100`.
///
/// At 100 % (or above) the image is returned untouched.  Otherwise it is
/// converted to RGBA first, so opaque formats gain an alpha channel.
pub fn apply_opacity(image: DynamicImage, opacity_percent: u8) -> DynamicImage {
    if opacity_percent >= 100 {
        return image;
    }
    let mut rgba = image.into_rgba8();
    let factor = u32::from(opacity_percent);
    for pixel in rgba.pixels_mut() {
        pixel[3] = (u32::from(pixel[3]) * factor / 100) as u8;
    }
    DynamicImage::ImageRgba8(rgba)
}

/// Downscale `image` to fit within `max_width × max_height`, keeping its
/// aspect ratio.  Images that already fit are returned as they are.
pub fn thumbnail(image: &DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    if image.width() <= max_width && image.height() <= max_height {
        return image.clone();
    }
    image.thumbnail(max_width, max_height)
}

/// What a button displays.
#[derive(Debug, Clone, PartialEq)]
pub enum ButtonFace {
    /// The composited icon, exactly the requested size.
    Icon(DynamicImage),
    /// A solid background, as returned by [`ButtonConfig::display_color`].
    Color(String),
}

/// Compose the face of `button` for a box of the given size.
///
/// Buttons without an icon, and buttons whose icon fails to decode or fit,
/// show their background colour instead.  Failures are logged, never
/// returned.
pub fn button_face(button: &ButtonConfig, theme: Theme, box_width: u32, box_height: u32) -> ButtonFace {
    let Some(path) = button.image_path.as_deref() else {
        return ButtonFace::Color(button.display_color(theme));
    };
    match render_button_icon(path, box_width, box_height, button.image_opacity) {
        Ok(image) => ButtonFace::Icon(image),
        Err(e) => {
            warn!("{} ({}), showing background colour", e, path.display());
            ButtonFace::Color(button.display_color(theme))
        }
    }
}

/// Decode the icon at `path` and prepare it for a button of the given size.
pub fn render_button_icon(
    path: &Path,
    box_width: u32,
    box_height: u32,
    opacity_percent: u8,
) -> Result<DynamicImage, CompositeError> {
    let image = image::open(path)?;
    let fitted = fit_to_box(&image, box_width, box_height)?;
    Ok(apply_opacity(fitted, opacity_percent))
}
