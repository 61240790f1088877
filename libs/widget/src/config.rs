use std::{fmt, str::FromStr};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

pub const DEFAULT_BUTTON_COLOR: &str = "#0066ff";
pub const DEFAULT_BUTTON_TEXT: &str = "💬";
pub const DEFAULT_BUTTON_SIZE: &str = "60px";
pub const DEFAULT_WINDOW_WIDTH: &str = "400px";
pub const DEFAULT_WINDOW_HEIGHT: &str = "600px";
pub const DEFAULT_Z_INDEX: i64 = 9999;
pub const DEFAULT_TARGET_ELEMENT: &str = "chatkit-container";
pub const DEFAULT_FRAME_PERMISSIONS: &str = "microphone; camera";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
    Inline,
}

impl Position {
    pub fn as_str(self) -> &'static str {
        match self {
            Position::BottomRight => "bottom-right",
            Position::BottomLeft => "bottom-left",
            Position::TopRight => "top-right",
            Position::TopLeft => "top-left",
            Position::Inline => "inline",
        }
    }

    pub fn is_inline(self) -> bool {
        matches!(self, Position::Inline)
    }

    pub fn is_bottom(self) -> bool {
        matches!(self, Position::BottomRight | Position::BottomLeft)
    }

    pub fn is_right(self) -> bool {
        matches!(self, Position::BottomRight | Position::TopRight)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown widget position `{0}`")]
pub struct UnknownPosition(pub String);

impl FromStr for Position {
    type Err = UnknownPosition;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "bottom-right" => Ok(Position::BottomRight),
            "bottom-left" => Ok(Position::BottomLeft),
            "top-right" => Ok(Position::TopRight),
            "top-left" => Ok(Position::TopLeft),
            "inline" => Ok(Position::Inline),
            other => Err(UnknownPosition(other.to_string())),
        }
    }
}

/// Merged configuration of one widget instance. Fixed once the widget is
/// constructed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    base_url: String,
    position: Position,
    button_color: String,
    button_text: String,
    button_size: String,
    window_width: String,
    window_height: String,
    z_index: i64,
    target_element: String,
    frame_permissions: String,
}

impl WidgetConfig {
    /// Documented defaults; `origin` is the host page's own origin.
    pub fn defaults(origin: &str) -> Self {
        Self {
            base_url: origin.to_string(),
            position: Position::default(),
            button_color: DEFAULT_BUTTON_COLOR.into(),
            button_text: DEFAULT_BUTTON_TEXT.into(),
            button_size: DEFAULT_BUTTON_SIZE.into(),
            window_width: DEFAULT_WINDOW_WIDTH.into(),
            window_height: DEFAULT_WINDOW_HEIGHT.into(),
            z_index: DEFAULT_Z_INDEX,
            target_element: DEFAULT_TARGET_ELEMENT.into(),
            frame_permissions: DEFAULT_FRAME_PERMISSIONS.into(),
        }
    }

    /// Shallow merge of host-supplied `overrides` over the defaults.
    ///
    /// Keys are applied one by one. Unknown keys and `null` values are
    /// ignored; a value of the wrong type keeps the default and logs a
    /// warning. Anything other than a JSON object yields the defaults.
    pub fn merge(origin: &str, overrides: &Value) -> Self {
        let mut config = Self::defaults(origin);
        match overrides {
            Value::Object(map) => config.apply(map),
            Value::Null => {}
            other => warn!(
                kind = json_kind(other),
                "widget configuration is not an object; using defaults"
            ),
        }
        config
    }

    fn apply(&mut self, map: &Map<String, Value>) {
        for (key, value) in map {
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "baseUrl" => assign_string(&mut self.base_url, key, value),
                "position" => match value.as_str().map(str::parse::<Position>) {
                    Some(Ok(position)) => self.position = position,
                    Some(Err(err)) => warn!(%err, "ignoring widget position"),
                    None => reject(key, value),
                },
                "buttonColor" => assign_string(&mut self.button_color, key, value),
                "buttonText" => assign_string(&mut self.button_text, key, value),
                "buttonSize" => assign_string(&mut self.button_size, key, value),
                "windowWidth" => assign_string(&mut self.window_width, key, value),
                "windowHeight" => assign_string(&mut self.window_height, key, value),
                "zIndex" => match parse_z_index(value) {
                    Some(z_index) => self.z_index = z_index,
                    None => reject(key, value),
                },
                "targetElement" => assign_string(&mut self.target_element, key, value),
                "framePermissions" => assign_string(&mut self.frame_permissions, key, value),
                _ => {}
            }
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn button_color(&self) -> &str {
        &self.button_color
    }

    pub fn button_text(&self) -> &str {
        &self.button_text
    }

    pub fn button_size(&self) -> &str {
        &self.button_size
    }

    pub fn window_width(&self) -> &str {
        &self.window_width
    }

    pub fn window_height(&self) -> &str {
        &self.window_height
    }

    pub fn z_index(&self) -> i64 {
        self.z_index
    }

    pub fn target_element(&self) -> &str {
        &self.target_element
    }

    pub fn frame_permissions(&self) -> &str {
        &self.frame_permissions
    }
}

fn assign_string(slot: &mut String, key: &str, value: &Value) {
    match value.as_str() {
        Some(text) => *slot = text.to_string(),
        None => reject(key, value),
    }
}

fn parse_z_index(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn reject(key: &str, value: &Value) {
    warn!(key, kind = json_kind(value), "ignoring widget option with unexpected type");
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
