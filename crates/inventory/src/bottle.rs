//! Bottle records as the API serves them, and the drafts and patches sent back.
//!
//! Decoding is lenient where the server is loose (null comments, empty or zero
//! rack coordinates, string ratings); a record with a blank name is rejected.

use core::str::FromStr;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use cellar_core::{BottleId, DomainError, DomainResult};

use crate::rack::RackDimensions;

/// Upper bound of the external rating scale (lower bound is 0).
pub const MAX_RATING: f64 = 5.0;

/// Wine color.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    #[default]
    White,
    Red,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Red => "red",
        }
    }
}

impl core::fmt::Display for Color {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Color {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" => Ok(Color::White),
            "red" => Ok(Color::Red),
            other => Err(DomainError::validation(format!("unknown color: {other:?}"))),
        }
    }
}

/// A rack cell, 1-based.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub row: u16,
    pub col: u16,
}

impl Position {
    pub fn new(row: u16, col: u16) -> Self {
        Self { row, col }
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{},{}", self.row, self.col)
    }
}

/// One bottle of the inventory.
///
/// Records only ever come from the remote system (the `id` is server-assigned),
/// either through deserialization of transport data or through [`BottleRecord::new`]
/// on the server side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBottle", into = "RawBottle")]
pub struct BottleRecord {
    id: BottleId,
    name: String,
    year: i32,
    color: Color,
    vivino_rating: f64,
    vivino_url: Option<String>,
    comments: Vec<String>,
    position: Option<Position>,
}

impl BottleRecord {
    pub fn new(id: BottleId, name: impl Into<String>, year: i32) -> DomainResult<Self> {
        let name = validate_name(&name.into())?;
        Ok(Self {
            id,
            name,
            year,
            color: Color::default(),
            vivino_rating: 0.0,
            vivino_url: None,
            comments: Vec::new(),
            position: None,
        })
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.vivino_rating = rating;
        self
    }

    pub fn with_vivino_url(mut self, url: impl Into<String>) -> Self {
        self.vivino_url = Some(url.into());
        self
    }

    pub fn with_position(mut self, position: Option<Position>) -> Self {
        self.position = position;
        self
    }

    /// Append a comment. Comments are never removed or reordered.
    pub fn with_comment(mut self, text: impl Into<String>) -> Self {
        self.comments.push(text.into());
        self
    }

    /// Apply a partial patch the way the remote system does.
    ///
    /// Server-side semantics only: the inventory store never merges patches
    /// locally, it re-fetches instead.
    pub fn apply_patch(mut self, patch: &BottlePatch) -> DomainResult<Self> {
        if let Some(name) = &patch.name {
            self.name = validate_name(name)?;
        }
        if let Some(year) = patch.year {
            self.year = year;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(rating) = patch.vivino_rating {
            self.vivino_rating = rating;
        }
        match patch.position {
            Some(PositionUpdate::Set(p)) => self.position = Some(p),
            Some(PositionUpdate::Clear) => self.position = None,
            None => {}
        }
        Ok(self)
    }

    pub fn id(&self) -> BottleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Rating as stored, possibly outside the valid scale.
    pub fn raw_rating(&self) -> f64 {
        self.vivino_rating
    }

    /// Rating clamped to `[0, MAX_RATING]` for display.
    pub fn rating(&self) -> f64 {
        clamp_rating(self.vivino_rating)
    }

    pub fn vivino_url(&self) -> Option<&str> {
        self.vivino_url.as_deref()
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn is_racked(&self) -> bool {
        self.position.is_some()
    }
}

/// Clamp a rating to the display scale. Non-finite values read as 0.
pub fn clamp_rating(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, MAX_RATING)
}

fn validate_name(name: &str) -> DomainResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    Ok(trimmed.to_string())
}

/// Transport shape of a bottle (JSON field names of the REST API).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawBottle {
    id: BottleId,
    name: String,
    year: i32,
    #[serde(default, deserialize_with = "lenient_color")]
    color: Color,
    #[serde(default, deserialize_with = "lenient_rating")]
    vivino_rating: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vivino_url: Option<String>,
    #[serde(default, deserialize_with = "nullable_comments")]
    comments: Vec<String>,
    #[serde(default, deserialize_with = "lenient_cell")]
    pos_row: Option<u16>,
    #[serde(default, deserialize_with = "lenient_cell")]
    pos_col: Option<u16>,
}

impl TryFrom<RawBottle> for BottleRecord {
    type Error = DomainError;

    fn try_from(raw: RawBottle) -> Result<Self, Self::Error> {
        let name = validate_name(&raw.name)?;
        let position = match (raw.pos_row, raw.pos_col) {
            (Some(row), Some(col)) => Some(Position { row, col }),
            _ => None,
        };
        let vivino_url = raw.vivino_url.filter(|url| !url.trim().is_empty());

        Ok(Self {
            id: raw.id,
            name,
            year: raw.year,
            color: raw.color,
            vivino_rating: raw.vivino_rating,
            vivino_url,
            comments: raw.comments,
            position,
        })
    }
}

impl From<BottleRecord> for RawBottle {
    fn from(b: BottleRecord) -> Self {
        Self {
            id: b.id,
            name: b.name,
            year: b.year,
            color: b.color,
            vivino_rating: b.vivino_rating,
            vivino_url: b.vivino_url,
            comments: b.comments,
            pos_row: b.position.map(|p| p.row),
            pos_col: b.position.map(|p| p.col),
        }
    }
}

fn lenient_color<'de, D: Deserializer<'de>>(d: D) -> Result<Color, D::Error> {
    match Option::<String>::deserialize(d)? {
        None => Ok(Color::default()),
        Some(s) if s.trim().is_empty() => Ok(Color::default()),
        Some(s) => s.parse().map_err(D::Error::custom),
    }
}

fn lenient_rating<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom("vivino_rating is not representable as f64")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(0.0),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| D::Error::custom(format!("vivino_rating: {e}"))),
        Some(other) => Err(D::Error::custom(format!(
            "vivino_rating: expected number, found {other}"
        ))),
    }
}

fn nullable_comments<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(d)?.unwrap_or_default())
}

/// A cell coordinate; null, empty and zero all mean "not racked".
fn lenient_cell<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u16>, D::Error> {
    let raw = match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| D::Error::custom(format!("rack coordinate out of range: {n}")))?,
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| D::Error::custom(format!("rack coordinate: {e}")))?,
        Some(other) => {
            return Err(D::Error::custom(format!(
                "rack coordinate: expected integer, found {other}"
            )));
        }
    };

    if raw == 0 {
        return Ok(None);
    }
    u16::try_from(raw)
        .map(Some)
        .map_err(|_| D::Error::custom(format!("rack coordinate out of range: {raw}")))
}

/// Fields needed to create a bottle. The remote system assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BottleDraft {
    pub name: String,
    pub year: i32,
    #[serde(default, deserialize_with = "lenient_color")]
    pub color: Color,
}

impl BottleDraft {
    pub fn new(name: impl Into<String>, year: i32) -> Self {
        Self {
            name: name.into(),
            year,
            color: Color::default(),
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Check the draft and return it with a trimmed name.
    pub fn validated(&self) -> DomainResult<Self> {
        Ok(Self {
            name: validate_name(&self.name)?,
            year: self.year,
            color: self.color,
        })
    }
}

/// Requested change of a bottle's rack position.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PositionUpdate {
    Set(Position),
    Clear,
}

/// Partial update: only the fields that are `Some` are sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BottlePatch {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub color: Option<Color>,
    pub vivino_rating: Option<f64>,
    pub position: Option<PositionUpdate>,
}

impl BottlePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn rating(mut self, rating: f64) -> Self {
        self.vivino_rating = Some(rating);
        self
    }

    pub fn place_at(mut self, position: Position) -> Self {
        self.position = Some(PositionUpdate::Set(position));
        self
    }

    pub fn unplace(mut self) -> Self {
        self.position = Some(PositionUpdate::Clear);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.year.is_none()
            && self.color.is_none()
            && self.vivino_rating.is_none()
            && self.position.is_none()
    }

    /// Client-side checks performed before the patch leaves the process.
    pub fn validate(&self, rack: RackDimensions) -> DomainResult<()> {
        if self.is_empty() {
            return Err(DomainError::validation("patch does not change anything"));
        }
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(rating) = self.vivino_rating {
            if !rating.is_finite() || !(0.0..=MAX_RATING).contains(&rating) {
                return Err(DomainError::validation(format!(
                    "rating must be within [0, {MAX_RATING}], got {rating}"
                )));
            }
        }
        if let Some(PositionUpdate::Set(position)) = self.position {
            rack.ensure_contains(position)?;
        }
        Ok(())
    }
}

impl Serialize for BottlePatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(name) = &self.name {
            map.serialize_entry("name", name)?;
        }
        if let Some(year) = self.year {
            map.serialize_entry("year", &year)?;
        }
        if let Some(color) = self.color {
            map.serialize_entry("color", &color)?;
        }
        if let Some(rating) = self.vivino_rating {
            map.serialize_entry("vivino_rating", &rating)?;
        }
        match self.position {
            Some(PositionUpdate::Set(p)) => {
                map.serialize_entry("pos_row", &p.row)?;
                map.serialize_entry("pos_col", &p.col)?;
            }
            Some(PositionUpdate::Clear) => {
                map.serialize_entry("pos_row", &Option::<u16>::None)?;
                map.serialize_entry("pos_col", &Option::<u16>::None)?;
            }
            None => {}
        }
        map.end()
    }
}

/// Payload of `InventoryStore::apply_change`.
#[derive(Debug, Clone, PartialEq)]
pub enum BottleChange {
    /// Authoritative record already returned by the server; merged in place.
    FullReplacement(BottleRecord),
    /// Fields to change; sent to the server, followed by a full reload.
    PartialPatch(BottlePatch),
}

impl From<BottleRecord> for BottleChange {
    fn from(record: BottleRecord) -> Self {
        BottleChange::FullReplacement(record)
    }
}

impl From<BottlePatch> for BottleChange {
    fn from(patch: BottlePatch) -> Self {
        BottleChange::PartialPatch(patch)
    }
}
