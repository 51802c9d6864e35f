//! Application state data model

use crate::memory::ShallowSize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::mem::size_of;
use std::str::FromStr;

/// Top-level categories shown as hexagonal nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Voice,
    Agent,
    Automate,
    System,
    Customize,
    Monitor,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Voice,
        Category::Agent,
        Category::Automate,
        Category::System,
        Category::Customize,
        Category::Monitor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Voice => "voice",
            Self::Agent => "agent",
            Self::Automate => "automate",
            Self::System => "system",
            Self::Customize => "customize",
            Self::Monitor => "monitor",
        }
    }
}

impl ShallowSize for Category {
    fn shallow_size(&self) -> usize {
        size_of::<Self>()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown category: {s}"))
    }
}

/// A `#RRGGBB` color string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(String);

impl HexColor {
    pub fn parse(text: &str) -> Option<Self> {
        Self::is_valid(text).then(|| Self(text.to_string()))
    }

    pub fn is_valid(text: &str) -> bool {
        text.len() == 7
            && text.starts_with('#')
            && text[1..].chars().all(|c| c.is_ascii_hexdigit())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for HexColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if Self::is_valid(&value) {
            Ok(Self(value))
        } else {
            Err(format!("not a #RRGGBB color: {value}"))
        }
    }
}

impl From<HexColor> for String {
    fn from(value: HexColor) -> Self {
        value.0
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single field value.
///
/// Strings that parse as `#RRGGBB` deserialize as `Color`, everything else
/// as `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Color(HexColor),
    Text(String),
}

impl FieldValue {
    /// String content of `Text` and `Color` values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Color(color) => Some(color.as_str()),
            Self::Bool(_) | Self::Number(_) => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<HexColor> for FieldValue {
    fn from(value: HexColor) -> Self {
        Self::Color(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        value.to_string().into()
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        if HexColor::is_valid(&value) {
            Self::Color(HexColor(value))
        } else {
            Self::Text(value)
        }
    }
}

impl ShallowSize for FieldValue {
    fn shallow_size(&self) -> usize {
        match self {
            Self::Text(text) => size_of::<Self>() + text.capacity(),
            Self::Color(color) => size_of::<Self>() + color.0.capacity(),
            Self::Bool(_) | Self::Number(_) => size_of::<Self>(),
        }
    }
}

/// Field values of one subnode, keyed by field id
pub type SubnodeValues = BTreeMap<String, FieldValue>;

/// Field values of every subnode, keyed by subnode id
pub type FieldValues = BTreeMap<String, SubnodeValues>;

/// Arbitrary values attached to a confirmed node
pub type NodeValues = serde_json::Map<String, serde_json::Value>;

/// Active color theme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorTheme {
    pub primary: String,
    pub glow: String,
    pub font: String,
    pub state_colors_enabled: bool,
    pub idle_color: String,
    pub listening_color: String,
    pub processing_color: String,
    pub error_color: String,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            primary: "#00ff88".to_string(),
            glow: "#00ff88".to_string(),
            font: "#ffffff".to_string(),
            state_colors_enabled: false,
            idle_color: "#00ff88".to_string(),
            listening_color: "#00aaff".to_string(),
            processing_color: "#a855f7".to_string(),
            error_color: "#ff3355".to_string(),
        }
    }
}

impl ColorTheme {
    /// Merge the fields present in `update`; absent fields are left as they are.
    ///
    /// A new glow color also becomes the primary color.
    pub fn apply(&mut self, update: &ThemeUpdate) {
        if let Some(glow) = &update.glow {
            self.glow = glow.clone();
            self.primary = glow.clone();
        }
        if let Some(font) = &update.font {
            self.font = font.clone();
        }
        if let Some(colors) = &update.state_colors {
            if let Some(enabled) = colors.enabled {
                self.state_colors_enabled = enabled;
            }
            if let Some(idle) = &colors.idle {
                self.idle_color = idle.clone();
            }
            if let Some(listening) = &colors.listening {
                self.listening_color = listening.clone();
            }
            if let Some(processing) = &colors.processing {
                self.processing_color = processing.clone();
            }
            if let Some(error) = &colors.error {
                self.error_color = error.clone();
            }
        }
    }
}

impl ShallowSize for ColorTheme {
    fn shallow_size(&self) -> usize {
        size_of::<Self>()
            + self.primary.capacity()
            + self.glow.capacity()
            + self.font.capacity()
            + self.idle_color.capacity()
            + self.listening_color.capacity()
            + self.processing_color.capacity()
            + self.error_color.capacity()
    }
}

/// Partial update of the state colors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateColorsUpdate {
    pub enabled: Option<bool>,
    pub idle: Option<String>,
    pub listening: Option<String>,
    pub processing: Option<String>,
    pub error: Option<String>,
}

/// Partial theme update; only fields that are `Some` are applied
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeUpdate {
    pub glow: Option<String>,
    pub font: Option<String>,
    pub state_colors: Option<StateColorsUpdate>,
}

impl ThemeUpdate {
    pub fn glow(mut self, color: impl Into<String>) -> Self {
        self.glow = Some(color.into());
        self
    }

    pub fn font(mut self, color: impl Into<String>) -> Self {
        self.font = Some(color.into());
        self
    }

    pub fn state_colors(mut self, colors: StateColorsUpdate) -> Self {
        self.state_colors = Some(colors);
        self
    }
}

/// A user-finalized subnode placed in the orbit around the center
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedNode {
    pub id: String,
    pub label: String,
    pub icon: String,
    pub orbit_angle: f64,
    #[serde(default)]
    pub values: NodeValues,
    pub category: String,
}

impl ShallowSize for ConfirmedNode {
    fn shallow_size(&self) -> usize {
        size_of::<Self>()
            + self.id.capacity()
            + self.label.capacity()
            + self.icon.capacity()
            + self.category.capacity()
            + self.values.shallow_size()
    }
}

/// Complete application state of one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppState {
    pub current_category: Option<Category>,
    pub current_subnode: Option<String>,
    pub field_values: FieldValues,
    pub active_theme: ColorTheme,
    pub confirmed_nodes: Vec<ConfirmedNode>,
}

impl AppState {
    pub fn field_value(&self, subnode_id: &str, field_id: &str) -> Option<&FieldValue> {
        self.field_values.get(subnode_id)?.get(field_id)
    }

    /// Store a field value, returning the value it replaced
    pub fn set_field_value(
        &mut self,
        subnode_id: &str,
        field_id: &str,
        value: FieldValue,
    ) -> Option<FieldValue> {
        self.field_values
            .entry(subnode_id.to_string())
            .or_default()
            .insert(field_id.to_string(), value)
    }

    pub fn confirmed_node(&self, id: &str) -> Option<&ConfirmedNode> {
        self.confirmed_nodes.iter().find(|node| node.id == id)
    }

    /// Insert a confirmed node, replacing an entry with the same id in place.
    ///
    /// Returns the replaced node, if any.
    pub fn upsert_confirmed_node(&mut self, node: ConfirmedNode) -> Option<ConfirmedNode> {
        match self.confirmed_nodes.iter_mut().find(|existing| existing.id == node.id) {
            Some(slot) => Some(std::mem::replace(slot, node)),
            None => {
                self.confirmed_nodes.push(node);
                None
            }
        }
    }

    /// Bytes held by the confirmed nodes, as seen by the shallow estimator
    pub fn confirmed_nodes_size(&self) -> usize {
        self.confirmed_nodes
            .iter()
            .map(ShallowSize::shallow_size)
            .sum()
    }
}

impl ShallowSize for AppState {
    fn shallow_size(&self) -> usize {
        size_of::<Self>()
            + self.current_subnode.as_ref().map_or(0, String::capacity)
            + self.field_values.shallow_size()
            + self.confirmed_nodes.shallow_size()
    }
}
