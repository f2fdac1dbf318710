//! Caption styling for burned-in subtitles
//!
//! Builds the ffmpeg `-vf` filter chain: optional scaling, the `subtitles`
//! filter with an ASS `force_style`, and an optional `drawtext` watermark.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::error::ValidationError;

/// Fonts offered for captions
pub const FONT_FAMILIES: &[&str] = &["Arial", "Impact", "Arial Black", "Verdana", "Courier New"];

/// Caption background treatment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMode {
    #[default]
    None,
    DropShadow,
    Box,
}

/// Output resolution for the captioned video
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputScale {
    Original,
    #[serde(rename = "1080p")]
    P1080,
    #[default]
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
}

impl OutputScale {
    fn filter_prefix(&self) -> &'static str {
        match self {
            OutputScale::Original => "",
            OutputScale::P1080 => "scale=-2:1080,",
            OutputScale::P720 => "scale=-2:720,",
            OutputScale::P480 => "scale=-2:480,",
        }
    }
}

/// Caption appearance, scale and watermark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionStyle {
    pub font_family: String,
    pub font_size: u32,
    /// `#RRGGBB`
    pub text_color: String,
    pub stroke_width: u32,
    pub stroke_color: String,
    pub background: BackgroundMode,
    /// Used with [`BackgroundMode::DropShadow`]
    pub shadow_distance: u32,
    /// Shadow colour or box colour
    pub background_color: String,
    /// Box opacity in percent, used with [`BackgroundMode::Box`]
    pub box_opacity: u8,
    pub scale: OutputScale,
    /// Empty for no watermark
    pub watermark_text: String,
    pub watermark_size: u32,
    /// 0.0 – 1.0
    pub watermark_opacity: f32,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_family: "Arial".to_string(),
            font_size: 24,
            text_color: "#FFFFFF".to_string(),
            stroke_width: 2,
            stroke_color: "#000000".to_string(),
            background: BackgroundMode::None,
            shadow_distance: 2,
            background_color: "#000000".to_string(),
            box_opacity: 80,
            scale: OutputScale::P720,
            watermark_text: String::new(),
            watermark_size: 24,
            watermark_opacity: 0.5,
        }
    }
}

impl CaptionStyle {
    /// Reject values that would break or escape the filter graph
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |msg: String| Err(ValidationError::InvalidRequest(msg));

        if !FONT_FAMILIES.contains(&self.font_family.as_str()) {
            return invalid(format!("Unsupported font: {}", self.font_family));
        }
        if !(10..=100).contains(&self.font_size) {
            return invalid("font_size must be between 10 and 100".to_string());
        }
        if self.stroke_width > 10 {
            return invalid("stroke_width must be between 0 and 10".to_string());
        }
        if !(1..=10).contains(&self.shadow_distance) {
            return invalid("shadow_distance must be between 1 and 10".to_string());
        }
        if self.box_opacity > 100 {
            return invalid("box_opacity must be between 0 and 100".to_string());
        }
        if !(10..=100).contains(&self.watermark_size) {
            return invalid("watermark_size must be between 10 and 100".to_string());
        }
        if !(0.0..=1.0).contains(&self.watermark_opacity) {
            return invalid("watermark_opacity must be between 0.0 and 1.0".to_string());
        }
        if self.watermark_text.chars().count() > 100
            || self.watermark_text.chars().any(|c| c.is_control())
        {
            return invalid("watermark_text must be at most 100 printable characters".to_string());
        }
        for color in [&self.text_color, &self.stroke_color, &self.background_color] {
            hex_to_ass(color, 100)?;
        }
        Ok(())
    }

    /// ASS `force_style` value
    pub fn force_style(&self) -> Result<String, ValidationError> {
        let (border_style, shadow, back_colour) = match self.background {
            BackgroundMode::None => (1, 0, hex_to_ass("#000000", 0)?),
            BackgroundMode::DropShadow => {
                (1, self.shadow_distance, hex_to_ass(&self.background_color, 100)?)
            }
            BackgroundMode::Box => (3, 0, hex_to_ass(&self.background_color, self.box_opacity)?),
        };

        Ok(format!(
            "FontName={},Fontsize={},PrimaryColour={},OutlineColour={},BackColour={},\
             BorderStyle={},Outline={},Shadow={},Alignment=2",
            self.font_family,
            self.font_size,
            hex_to_ass(&self.text_color, 100)?,
            hex_to_ass(&self.stroke_color, 100)?,
            back_colour,
            border_style,
            self.stroke_width,
            shadow,
        ))
    }

    /// Full `-vf` argument burning `subtitles` into the video
    pub fn video_filter(&self, subtitles: &Path) -> Result<String, ValidationError> {
        self.validate()?;

        let mut filter = format!(
            "{}subtitles={}:force_style='{}'",
            self.scale.filter_prefix(),
            escape_filter_value(&subtitles.to_string_lossy()),
            self.force_style()?,
        );

        let watermark = self.watermark_text.trim();
        if !watermark.is_empty() {
            filter.push_str(&format!(
                ",drawtext=text='{}':fontcolor=white@{}:fontsize={}:x=w-tw-20:y=20",
                escape_quoted_text(watermark),
                self.watermark_opacity,
                self.watermark_size,
            ));
        }

        Ok(filter)
    }

    /// Stable 16 hex digit fingerprint, part of the output file name
    pub fn digest(&self) -> String {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        let hex = format!("{:x}", Sha256::digest(&encoded));
        hex[..16].to_string()
    }
}

/// Convert `#RRGGBB` plus opacity percent to ASS `&HAABBGGRR`
///
/// ASS alpha is inverted: `00` is opaque, `FF` fully transparent.
pub fn hex_to_ass(hex_code: &str, opacity_percent: u8) -> Result<String, ValidationError> {
    let hex = hex_code.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidRequest(format!(
            "Invalid colour: {} (expected #RRGGBB)",
            hex_code
        )));
    }
    let hex = hex.to_ascii_uppercase();
    let (r, g, b) = (&hex[0..2], &hex[2..4], &hex[4..6]);

    let transparency = 100 - u32::from(opacity_percent.min(100));
    let alpha = 255 * transparency / 100;

    Ok(format!("&H{:02X}{}{}{}", alpha, b, g, r))
}

/// Escape text placed inside a single-quoted drawtext option
fn escape_quoted_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}

/// Escape an unquoted value embedded in an ffmpeg filter argument
fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | ':' | ',' | '[' | ']' | ';') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
