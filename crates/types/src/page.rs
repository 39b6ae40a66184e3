//! Page geometry vocabulary: orientation, measurement units and paper formats.

use crate::geometry::Size;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    /// Orientation implied by a physical size.
    pub fn of(size: Size) -> Self {
        if size.is_landscape() {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }

    /// Returns `size` rotated, if needed, so that it matches this orientation.
    pub fn apply(self, size: Size) -> Size {
        if Orientation::of(size) == self {
            size
        } else {
            size.swapped()
        }
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "P" | "PORTRAIT" => Ok(Orientation::Portrait),
            "L" | "LANDSCAPE" => Ok(Orientation::Landscape),
            other => Err(format!("Unknown orientation '{}'", other)),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Portrait => write!(f, "P"),
            Orientation::Landscape => write!(f, "L"),
        }
    }
}

/// Measurement unit used by a configuration for every coordinate and size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Unit {
    Pt,
    #[default]
    Mm,
    Cm,
    In,
}

impl Unit {
    /// Number of PDF points in one unit.
    pub fn points_per_unit(self) -> f32 {
        match self {
            Unit::Pt => 1.0,
            Unit::Mm => 72.0 / 25.4,
            Unit::Cm => 72.0 / 2.54,
            Unit::In => 72.0,
        }
    }

    pub fn to_pt(self, value: f32) -> f32 {
        value * self.points_per_unit()
    }

    pub fn from_pt(self, value: f32) -> f32 {
        value / self.points_per_unit()
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pt" => Ok(Unit::Pt),
            "mm" => Ok(Unit::Mm),
            "cm" => Ok(Unit::Cm),
            "in" | "inch" => Ok(Unit::In),
            other => Err(format!("Unknown unit '{}'", other)),
        }
    }
}

/// A physical paper format. Custom sizes are expressed in the configuration unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum PageFormat {
    A3,
    A4,
    A5,
    Letter,
    Legal,
    Custom { width: f32, height: f32 },
}

impl Default for PageFormat {
    fn default() -> Self {
        PageFormat::A4
    }
}

impl PageFormat {
    /// Portrait size in points. Custom sizes are converted from `unit`.
    pub fn size_pt(self, unit: Unit) -> Size {
        match self {
            PageFormat::A3 => Size::new(841.89, 1190.55),
            PageFormat::A4 => Size::new(595.28, 841.89),
            PageFormat::A5 => Size::new(419.53, 595.28),
            PageFormat::Letter => Size::new(612.0, 792.0),
            PageFormat::Legal => Size::new(612.0, 1008.0),
            PageFormat::Custom { width, height } => {
                let (w, h) = (unit.to_pt(width), unit.to_pt(height));
                Size::new(w.min(h), w.max(h))
            }
        }
    }
}

impl FromStr for PageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_uppercase();
        match norm.as_str() {
            "A3" => Ok(PageFormat::A3),
            "A4" => Ok(PageFormat::A4),
            "A5" => Ok(PageFormat::A5),
            "LETTER" => Ok(PageFormat::Letter),
            "LEGAL" => Ok(PageFormat::Legal),
            _ => {
                let (w, h) = norm
                    .split_once('X')
                    .ok_or_else(|| format!("Unknown page size '{}'", s))?;
                let width = w.trim().parse::<f32>().map_err(|e| format!("Invalid page width '{}': {}", w, e))?;
                let height = h.trim().parse::<f32>().map_err(|e| format!("Invalid page height '{}': {}", h, e))?;
                if width <= 0.0 || height <= 0.0 {
                    return Err(format!("Page size must be positive, got '{}'", s));
                }
                Ok(PageFormat::Custom { width, height })
            }
        }
    }
}
