//! Drawing model replicated between the relay and every client.
//!
//! Shapes are immutable-by-replacement: a later value with the same `id`
//! replaces the earlier one wholesale (last write wins, no merge).
//! Coordinates are room-local and unscaled; the viewport maps them to the
//! screen.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Lower bound for viewport zoom.
pub const MIN_ZOOM: f64 = 0.1;
/// Upper bound for viewport zoom.
pub const MAX_ZOOM: f64 = 5.0;
/// Longest accepted shape identifier, in characters.
pub const MAX_SHAPE_ID_LEN: usize = 128;

/// A point in room-local (world) or screen coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Pan offset (screen pixels) and zoom factor of a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

impl Viewport {
    /// Clamp a zoom factor into `[MIN_ZOOM, MAX_ZOOM]`. Non-finite input resets to 1.
    pub fn clamp_zoom(zoom: f64) -> f64 {
        if zoom.is_finite() {
            zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            1.0
        }
    }

    /// Copy of this viewport with the zoom clamped into range.
    pub fn clamped(self) -> Self {
        Self {
            zoom: Self::clamp_zoom(self.zoom),
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.x.is_finite() && self.y.is_finite() && self.zoom.is_finite() {
            Ok(())
        } else {
            Err(ValidationError::NonFiniteCoordinate)
        }
    }

    /// Convert a screen point to room-local coordinates.
    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point {
            x: (screen.x - self.x) / self.zoom,
            y: (screen.y - self.y) / self.zoom,
        }
    }

    /// Convert a room-local point to screen coordinates.
    pub fn world_to_screen(&self, world: Point) -> Point {
        Point {
            x: world.x * self.zoom + self.x,
            y: world.y * self.zoom + self.y,
        }
    }

    /// Convert a screen distance to a room-local distance.
    pub fn screen_dist_to_world(&self, screen_dist: f64) -> f64 {
        screen_dist / self.zoom
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    /// Multiply the zoom by `factor` while keeping `anchor` (screen space) fixed.
    pub fn zoom_at(&mut self, anchor: Point, factor: f64) {
        let new_zoom = Self::clamp_zoom(self.zoom * factor);
        let ratio = new_zoom / self.zoom;
        self.x = anchor.x - (anchor.x - self.x) * ratio;
        self.y = anchor.y - (anchor.y - self.y) * ratio;
        self.zoom = new_zoom;
    }
}

/// Closed set of drawable primitives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    #[default]
    Rectangle,
    #[serde(alias = "circle")]
    Ellipse,
    Line,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Ellipse => "ellipse",
            ShapeKind::Line => "line",
        };
        f.write_str(name)
    }
}

impl FromStr for ShapeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rectangle" | "rect" => Ok(ShapeKind::Rectangle),
            "ellipse" | "circle" => Ok(ShapeKind::Ellipse),
            "line" => Ok(ShapeKind::Line),
            other => Err(format!("unknown shape kind '{}'", other)),
        }
    }
}

/// Fill palette. `Transparent` travels as `"none"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillColor {
    Red,
    Blue,
    Green,
    Yellow,
    #[default]
    #[serde(rename = "none")]
    Transparent,
}

impl fmt::Display for FillColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FillColor::Red => "red",
            FillColor::Blue => "blue",
            FillColor::Green => "green",
            FillColor::Yellow => "yellow",
            FillColor::Transparent => "none",
        };
        f.write_str(name)
    }
}

impl FromStr for FillColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "red" => Ok(FillColor::Red),
            "blue" => Ok(FillColor::Blue),
            "green" => Ok(FillColor::Green),
            "yellow" => Ok(FillColor::Yellow),
            "none" | "transparent" => Ok(FillColor::Transparent),
            other => Err(format!("unknown fill color '{}'", other)),
        }
    }
}

/// One drawn primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    #[serde(default)]
    pub color: FillColor,
    pub start_point: Point,
    pub end_point: Point,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub timestamp: i64,
}

impl Shape {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_shape_id(&self.id)?;
        if !self.start_point.is_finite() || !self.end_point.is_finite() {
            return Err(ValidationError::NonFiniteCoordinate);
        }
        Ok(())
    }
}

pub fn validate_shape_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::EmptyShapeId);
    }
    if id.chars().count() > MAX_SHAPE_ID_LEN {
        return Err(ValidationError::ShapeIdTooLong {
            max: MAX_SHAPE_ID_LEN,
        });
    }
    Ok(())
}

/// Identifier-only payload of `shape_removed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeRef {
    pub id: String,
}

/// A single mutation of a shape collection.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeOp {
    Add(Shape),
    Update(Shape),
    Remove(String),
}

impl ShapeOp {
    pub fn shape_id(&self) -> &str {
        match self {
            ShapeOp::Add(shape) | ShapeOp::Update(shape) => &shape.id,
            ShapeOp::Remove(id) => id,
        }
    }
}

/// Shapes keyed by identifier, kept in insertion (paint) order.
///
/// Replacing an existing identifier keeps its position in the paint order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeCollection {
    shapes: Vec<Shape>,
}

impl ShapeCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from a list; duplicate identifiers resolve to the last one.
    pub fn from_shapes(shapes: impl IntoIterator<Item = Shape>) -> Self {
        let mut collection = Self::new();
        for shape in shapes {
            collection.upsert(shape);
        }
        collection
    }

    /// Insert or replace by identifier. Returns `true` when a prior value was replaced.
    pub fn upsert(&mut self, shape: Shape) -> bool {
        match self.shapes.iter_mut().find(|s| s.id == shape.id) {
            Some(existing) => {
                *existing = shape;
                true
            }
            None => {
                self.shapes.push(shape);
                false
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Shape> {
        let index = self.shapes.iter().position(|s| s.id == id)?;
        Some(self.shapes.remove(index))
    }

    /// Apply one mutation. Add and update both resolve to insert-or-replace.
    pub fn apply(&mut self, op: ShapeOp) {
        match op {
            ShapeOp::Add(shape) | ShapeOp::Update(shape) => {
                self.upsert(shape);
            }
            ShapeOp::Remove(id) => {
                self.remove(&id);
            }
        }
    }

    /// Replace the whole collection.
    pub fn replace_all(&mut self, shapes: impl IntoIterator<Item = Shape>) {
        *self = Self::from_shapes(shapes);
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
    }

    pub fn get(&self, id: &str) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Shapes in paint order (bottom first).
    pub fn iter(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter()
    }

    /// Shapes topmost first, the order used for hit-testing.
    pub fn iter_topmost(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter().rev()
    }

    pub fn to_vec(&self) -> Vec<Shape> {
        self.shapes.clone()
    }
}

/// Full-replace payload: every shape plus the viewport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasData {
    #[serde(default)]
    pub shapes: Vec<Shape>,
    #[serde(default)]
    pub viewport: Viewport,
}

impl CanvasData {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.viewport.validate()?;
        self.shapes.iter().try_for_each(Shape::validate)
    }
}
