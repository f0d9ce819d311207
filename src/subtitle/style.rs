//! Subtitle style resolution for the burn-in renderer
//!
//! Callers hand over a partial [`SubtitleStyle`] (every field optional) and
//! get back a [`ResolvedStyle`] with defaults filled in and every color in
//! the renderer's `BBGGRR` byte order.

use serde::{Deserialize, Serialize};

/// Renderer encoding of white, used as the final color fallback
pub const WHITE: &str = "FFFFFF";

/// Vertical margin (pixels) applied to top and bottom placement
const MARGIN_V: u32 = 20;

/// Named colors, already in renderer byte order
const NAMED_COLORS: &[(&str, &str)] = &[
    ("white", "FFFFFF"),
    ("black", "000000"),
    ("red", "0000FF"),
    ("green", "00FF00"),
    ("blue", "FF0000"),
    ("yellow", "00FFFF"),
    ("cyan", "FFFF00"),
    ("magenta", "FF00FF"),
];

/// Where the subtitle block sits in the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitlePosition {
    Top,
    Center,
    /// Standard subtitle position
    #[default]
    Bottom,
}

impl SubtitlePosition {
    /// Numpad-style alignment understood by the renderer (bottom/center/top
    /// center column)
    #[must_use]
    pub fn alignment(self) -> u8 {
        match self {
            Self::Bottom => 2,
            Self::Center => 5,
            Self::Top => 8,
        }
    }
}

impl std::str::FromStr for SubtitlePosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "center" | "middle" => Ok(Self::Center),
            "bottom" => Ok(Self::Bottom),
            other => Err(format!("unknown subtitle position: {other}")),
        }
    }
}

/// Caller-supplied style; any field left out takes its default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,
    #[serde(default, alias = "fontSizePx", skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline_color: Option<String>,
    #[serde(default, alias = "outlineWidthPx", skip_serializing_if = "Option::is_none")]
    pub outline_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<SubtitlePosition>,
}

impl SubtitleStyle {
    pub const DEFAULT_FONT_NAME: &'static str = "Arial";
    pub const DEFAULT_FONT_SIZE: u32 = 24;
    pub const DEFAULT_FONT_COLOR: &'static str = "white";
    pub const DEFAULT_BACKGROUND_COLOR: &'static str = "black@0.5";
    pub const DEFAULT_OUTLINE_COLOR: &'static str = "black";
    pub const DEFAULT_OUTLINE_WIDTH: u32 = 2;

    #[must_use]
    pub fn with_font_color(mut self, color: impl Into<String>) -> Self {
        self.font_color = Some(color.into());
        self
    }

    #[must_use]
    pub fn with_position(mut self, position: SubtitlePosition) -> Self {
        self.position = Some(position);
        self
    }
}

/// Style with every field decided and colors in renderer encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStyle {
    pub font_name: String,
    pub font_size: u32,
    /// `BBGGRR`
    pub font_color: String,
    /// `BBGGRR`
    pub background_color: String,
    /// Background transparency, 0 = opaque, 255 = invisible
    pub background_alpha: u8,
    /// `BBGGRR`
    pub outline_color: String,
    pub outline_width: u32,
    pub position: SubtitlePosition,
}

impl Default for ResolvedStyle {
    fn default() -> Self {
        resolve(&SubtitleStyle::default())
    }
}

impl ResolvedStyle {
    /// Renderer `force_style` override string.
    ///
    /// Uses an opaque box behind the text (`BorderStyle=3`) and places the
    /// block with the numpad alignment of [`SubtitlePosition`].
    #[must_use]
    pub fn force_style(&self) -> String {
        format!(
            "FontName={},FontSize={},PrimaryColour=&H{},OutlineColour=&H{},\
             BackColour=&H{:02X}{},Outline={},BorderStyle=3,Alignment={},MarginV={}",
            sanitize_font_name(&self.font_name),
            self.font_size,
            self.font_color,
            self.outline_color,
            self.background_alpha,
            self.background_color,
            self.outline_width,
            self.position.alignment(),
            MARGIN_V,
        )
    }
}

/// Fill defaults and normalise colors. Never fails.
#[must_use]
pub fn resolve(style: &SubtitleStyle) -> ResolvedStyle {
    let font_name = style
        .font_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(SubtitleStyle::DEFAULT_FONT_NAME)
        .to_string();

    let background = style
        .background_color
        .as_deref()
        .unwrap_or(SubtitleStyle::DEFAULT_BACKGROUND_COLOR);

    ResolvedStyle {
        font_name,
        font_size: style
            .font_size
            .filter(|&size| size > 0)
            .unwrap_or(SubtitleStyle::DEFAULT_FONT_SIZE),
        font_color: resolve_color(
            style
                .font_color
                .as_deref()
                .unwrap_or(SubtitleStyle::DEFAULT_FONT_COLOR),
        ),
        background_color: resolve_color(background),
        background_alpha: alpha_from_suffix(background),
        outline_color: resolve_color(
            style
                .outline_color
                .as_deref()
                .unwrap_or(SubtitleStyle::DEFAULT_OUTLINE_COLOR),
        ),
        outline_width: style
            .outline_width
            .unwrap_or(SubtitleStyle::DEFAULT_OUTLINE_WIDTH),
        position: style.position.unwrap_or_default(),
    }
}

/// Map a human color to renderer `BBGGRR` encoding.
///
/// Named colors are matched case-insensitively, `#RRGGBB` is byte-swapped,
/// `base@alpha` resolves `base`, and anything else falls back to white.
#[must_use]
pub fn resolve_color(color: &str) -> String {
    let color = color.trim();

    let lower = color.to_lowercase();
    if let Some((_, code)) = NAMED_COLORS.iter().find(|(name, _)| *name == lower) {
        return (*code).to_string();
    }

    if let Some(hex) = color.strip_prefix('#') {
        if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            let hex = hex.to_ascii_uppercase();
            return format!("{}{}{}", &hex[4..6], &hex[2..4], &hex[0..2]);
        }
    }

    if let Some((base, _)) = color.split_once('@') {
        return resolve_color(base);
    }

    WHITE.to_string()
}

/// Transparency byte from an `@opacity` suffix (`black@0.5` -> 0x80).
/// No suffix, or one that is not a number in `0.0..=1.0`, means opaque.
fn alpha_from_suffix(color: &str) -> u8 {
    color
        .split_once('@')
        .and_then(|(_, opacity)| opacity.trim().parse::<f32>().ok())
        .filter(|opacity| (0.0..=1.0).contains(opacity))
        .map_or(0, |opacity| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let alpha = ((1.0 - opacity) * 255.0).round() as u8;
            alpha
        })
}

/// Characters that would break out of the renderer filter argument
fn sanitize_font_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ',' | '\'' | ':' | '\\' | '='))
        .collect()
}
