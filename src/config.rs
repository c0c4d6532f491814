//! Host-supplied options for the chat widget and the model viewer.
//!
//! Both artifacts are configured from a JSON object handed over by the
//! embedding page. Every key is optional on the wire; missing keys fall back
//! to the defaults below, supplied keys win one by one.

use anyhow::{Context as _, bail};
use egui::Color32;
use serde::{Deserialize, Deserializer};

pub const DEFAULT_API_ENDPOINT: &str = "https://your-lambda-api-endpoint.amazonaws.com/prod/chat";
pub const DEFAULT_TITLE: &str = "Business Assistant";
pub const DEFAULT_PRIMARY_COLOR: Color32 = Color32::from_rgb(0x4a, 0x90, 0xe2);
pub const DEFAULT_INITIAL_MESSAGE: &str = "Hello! How can I help you today?";
pub const DEFAULT_PLACEHOLDER: &str = "Type your question here...";
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Which bottom corner of the page the widget sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Left,
    #[default]
    Right,
}

/// Raw options as the host page writes them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetOptions {
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
    pub widget_title: Option<String>,
    pub primary_color: Option<String>,
    pub position: Option<Position>,
    /// Outer `None`: key absent. `Some(None)`: explicit `null`.
    #[serde(default, deserialize_with = "present")]
    pub initial_message: Option<Option<String>>,
    pub placeholder: Option<String>,
    pub history_window: Option<usize>,
}

/// Keeps an explicit `null` apart from a missing key.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl WidgetOptions {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).context("invalid chat widget options")
    }
}

/// Resolved widget configuration. Immutable once the widget exists.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetConfig {
    pub api_key: String,
    pub api_endpoint: String,
    pub widget_title: String,
    pub primary_color: Color32,
    pub position: Position,
    /// `None` when the host disabled the greeting with `""` or `null`.
    pub initial_message: Option<String>,
    pub placeholder: String,
    pub history_window: usize,
}

impl WidgetConfig {
    /// Merges `options` over the defaults.
    ///
    /// Fails when no API key was supplied; the widget must not be built
    /// without one.
    pub fn from_options(options: WidgetOptions) -> anyhow::Result<Self> {
        let api_key = match options.api_key {
            Some(key) if !key.trim().is_empty() => key,
            _ => bail!("API key is required for the chat widget"),
        };

        let primary_color = match options.primary_color.as_deref() {
            None => DEFAULT_PRIMARY_COLOR,
            Some(hex) => parse_hex_color(hex).unwrap_or_else(|| {
                log::warn!("ignoring invalid primaryColor {hex:?}");
                DEFAULT_PRIMARY_COLOR
            }),
        };

        let initial_message = match options.initial_message {
            None => Some(DEFAULT_INITIAL_MESSAGE.to_owned()),
            Some(None) => None,
            Some(Some(text)) if text.is_empty() => None,
            Some(Some(text)) => Some(text),
        };

        Ok(Self {
            api_key,
            api_endpoint: options
                .api_endpoint
                .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_owned()),
            widget_title: options.widget_title.unwrap_or_else(|| DEFAULT_TITLE.to_owned()),
            primary_color,
            position: options.position.unwrap_or_default(),
            initial_message,
            placeholder: options
                .placeholder
                .unwrap_or_else(|| DEFAULT_PLACEHOLDER.to_owned()),
            history_window: options.history_window.unwrap_or(DEFAULT_HISTORY_WINDOW),
        })
    }
}

/// Parses a CSS-style hex colour (`#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`).
/// The leading `#` may be left off.
pub fn parse_hex_color(text: &str) -> Option<Color32> {
    let text = text.trim();
    // from_hex slices by byte offset
    if !text.is_ascii() {
        return None;
    }
    if text.starts_with('#') {
        Color32::from_hex(text).ok()
    } else {
        Color32::from_hex(&format!("#{text}")).ok()
    }
}

// ── Model viewer ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightOptions {
    pub direction: Option<[f32; 3]>,
    pub color: Option<String>,
    pub intensity: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerOptions {
    pub asset_url: Option<String>,
    pub scale: Option<f32>,
    pub fov_degrees: Option<f32>,
    pub camera_distance: Option<f32>,
    pub model_color: Option<String>,
    pub top_light: Option<LightOptions>,
    pub ambient_light: Option<LightOptions>,
}

impl ViewerOptions {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).context("invalid model viewer options")
    }
}

/// A light as the tessellator consumes it: linear RGB already scaled by
/// intensity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub direction: [f32; 3],
    pub rgb: [f32; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub asset_url: String,
    pub scale: f32,
    pub fov_degrees: f32,
    pub camera_distance: f32,
    pub model_rgb: [f32; 3],
    pub top_light: Light,
    pub ambient_light: Light,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            asset_url: "token.stl".to_owned(),
            scale: 0.5,
            fov_degrees: 75.0,
            camera_distance: 5.0,
            model_rgb: [0.8, 0.8, 0.8],
            top_light: Light { direction: [500.0, 500.0, 500.0], rgb: [1.0, 1.0, 1.0] },
            ambient_light: Light { direction: [0.0, 0.0, 0.0], rgb: rgb_of(Color32::from_gray(0x33)) },
        }
    }
}

impl ViewerConfig {
    pub fn from_options(options: ViewerOptions) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let scale = options.scale.unwrap_or(defaults.scale);
        if !(scale.is_finite() && scale > 0.0) {
            bail!("scale must be a positive number, got {scale}");
        }
        let fov_degrees = options.fov_degrees.unwrap_or(defaults.fov_degrees);
        if !(1.0..=179.0).contains(&fov_degrees) {
            bail!("fovDegrees must lie in 1..=179, got {fov_degrees}");
        }

        let model_rgb = match options.model_color.as_deref() {
            Some(hex) => parse_hex_color(hex)
                .map(rgb_of)
                .with_context(|| format!("invalid modelColor {hex:?}"))?,
            None => defaults.model_rgb,
        };

        Ok(Self {
            asset_url: options.asset_url.unwrap_or(defaults.asset_url),
            scale,
            fov_degrees,
            camera_distance: options.camera_distance.unwrap_or(defaults.camera_distance),
            model_rgb,
            top_light: merge_light(options.top_light, defaults.top_light)?,
            ambient_light: merge_light(options.ambient_light, defaults.ambient_light)?,
        })
    }
}

fn merge_light(options: Option<LightOptions>, default: Light) -> anyhow::Result<Light> {
    let Some(options) = options else {
        return Ok(default);
    };
    let base = match options.color.as_deref() {
        Some(hex) => parse_hex_color(hex)
            .map(rgb_of)
            .with_context(|| format!("invalid light color {hex:?}"))?,
        // default rgb is already intensity-scaled by 1.0
        None => default.rgb,
    };
    let intensity = options.intensity.unwrap_or(1.0);
    Ok(Light {
        direction: options.direction.unwrap_or(default.direction),
        rgb: base.map(|c| c * intensity),
    })
}

fn rgb_of(color: Color32) -> [f32; 3] {
    [color.r(), color.g(), color.b()].map(|c| f32::from(c) / 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(json: &str) -> WidgetOptions {
        WidgetOptions::from_json(json).unwrap()
    }

    #[test]
    fn missing_api_key_is_rejected() {
        assert!(WidgetConfig::from_options(options("{}")).is_err());
        assert!(WidgetConfig::from_options(options(r#"{"apiKey": ""}"#)).is_err());
        assert!(WidgetConfig::from_options(options(r#"{"apiKey": null}"#)).is_err());
    }

    #[test]
    fn defaults_fill_unsupplied_keys() {
        let config = WidgetConfig::from_options(options(r#"{"apiKey": "k"}"#)).unwrap();
        assert_eq!(config.api_key, "k");
        assert_eq!(config.api_endpoint, DEFAULT_API_ENDPOINT);
        assert_eq!(config.widget_title, DEFAULT_TITLE);
        assert_eq!(config.primary_color, DEFAULT_PRIMARY_COLOR);
        assert_eq!(config.position, Position::Right);
        assert_eq!(config.initial_message.as_deref(), Some(DEFAULT_INITIAL_MESSAGE));
        assert_eq!(config.placeholder, DEFAULT_PLACEHOLDER);
        assert_eq!(config.history_window, 10);
    }

    #[test]
    fn supplied_keys_win() {
        let config = WidgetConfig::from_options(options(
            r##"{
                "apiKey": "k",
                "apiEndpoint": "https://example.test/chat",
                "widgetTitle": "Support",
                "primaryColor": "#ff0000",
                "position": "left",
                "placeholder": "Ask away",
                "historyWindow": 4
            }"##,
        ))
        .unwrap();
        assert_eq!(config.api_endpoint, "https://example.test/chat");
        assert_eq!(config.widget_title, "Support");
        assert_eq!(config.primary_color, Color32::from_rgb(255, 0, 0));
        assert_eq!(config.position, Position::Left);
        assert_eq!(config.placeholder, "Ask away");
        assert_eq!(config.history_window, 4);
        // untouched key keeps its default
        assert_eq!(config.initial_message.as_deref(), Some(DEFAULT_INITIAL_MESSAGE));
    }

    #[test]
    fn empty_initial_message_disables_greeting() {
        let config =
            WidgetConfig::from_options(options(r#"{"apiKey": "k", "initialMessage": ""}"#)).unwrap();
        assert_eq!(config.initial_message, None);
    }

    #[test]
    fn null_initial_message_disables_greeting() {
        let config =
            WidgetConfig::from_options(options(r#"{"apiKey": "k", "initialMessage": null}"#)).unwrap();
        assert_eq!(config.initial_message, None);

        let config = WidgetConfig::from_options(options(r#"{"apiKey": "k", "initialMessage": "Hey"}"#))
            .unwrap();
        assert_eq!(config.initial_message.as_deref(), Some("Hey"));
    }

    #[test]
    fn unknown_position_is_a_parse_error() {
        assert!(WidgetOptions::from_json(r#"{"position": "top"}"#).is_err());
    }

    #[test]
    fn bad_color_falls_back_to_default() {
        let config =
            WidgetConfig::from_options(options(r#"{"apiKey": "k", "primaryColor": "blue"}"#)).unwrap();
        assert_eq!(config.primary_color, DEFAULT_PRIMARY_COLOR);
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#fff"), Some(Color32::WHITE));
        assert_eq!(parse_hex_color("4a90e2"), Some(DEFAULT_PRIMARY_COLOR));
        assert_eq!(parse_hex_color(" #4A90E2 "), Some(DEFAULT_PRIMARY_COLOR));
        assert!(parse_hex_color("#ff000080").is_some());
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color(""), None);
        assert_eq!(parse_hex_color("#gggggg"), None);
        assert_eq!(parse_hex_color("#ééé"), None);
    }

    #[test]
    fn viewer_defaults_and_overrides() {
        let config = ViewerConfig::from_options(ViewerOptions::from_json("").unwrap()).unwrap();
        assert_eq!(config, ViewerConfig::default());

        let config = ViewerConfig::from_options(
            ViewerOptions::from_json(
                r##"{"assetUrl": "ship.stl", "scale": 2.0, "topLight": {"color": "#ff0000", "intensity": 0.5}}"##,
            )
            .unwrap(),
        )
        .unwrap();
        assert_eq!(config.asset_url, "ship.stl");
        assert_eq!(config.scale, 2.0);
        assert_eq!(config.top_light.rgb, [0.5, 0.0, 0.0]);
        assert_eq!(config.top_light.direction, [500.0, 500.0, 500.0]);
        assert_eq!(config.ambient_light, ViewerConfig::default().ambient_light);
    }

    #[test]
    fn viewer_rejects_nonsense() {
        let bad = |json: &str| ViewerConfig::from_options(ViewerOptions::from_json(json).unwrap());
        assert!(bad(r#"{"scale": 0}"#).is_err());
        assert!(bad(r#"{"fovDegrees": 200}"#).is_err());
        assert!(bad(r#"{"modelColor": "nope"}"#).is_err());
    }
}
