//! Text and symbol styling vocabulary shared by the configuration model and
//! the drawing backends.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct FontStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl FontStyle {
    pub const BOLD: FontStyle = FontStyle {
        bold: true,
        italic: false,
        underline: false,
    };

    /// Parses style letters such as `B`, `I`, `BI` or `U`, in any order and case.
    pub fn parse(s: &str) -> Self {
        let upper = s.to_ascii_uppercase();
        Self {
            bold: upper.contains('B'),
            italic: upper.contains('I'),
            underline: upper.contains('U'),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum HAlign {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl HAlign {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" | "LEFT" => Some(HAlign::Left),
            "C" | "CENTER" => Some(HAlign::Center),
            "R" | "RIGHT" => Some(HAlign::Right),
            "J" | "JUSTIFY" => Some(HAlign::Justify),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum VAlign {
    #[default]
    Top,
    Middle,
    Bottom,
}

impl VAlign {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "T" | "TOP" => Some(VAlign::Top),
            "M" | "MIDDLE" | "C" => Some(VAlign::Middle),
            "B" | "BOTTOM" => Some(VAlign::Bottom),
            _ => None,
        }
    }
}

/// One-dimensional barcode symbologies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum BarcodeKind {
    #[default]
    Code128,
    Code39,
    Code93,
    Ean13,
    Ean8,
    Codabar,
    Interleaved25,
}

impl BarcodeKind {
    /// Parses a symbology tag. Unknown tags yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "C128" | "CODE128" => Some(BarcodeKind::Code128),
            "C39" | "CODE39" => Some(BarcodeKind::Code39),
            "C93" | "CODE93" => Some(BarcodeKind::Code93),
            "EAN13" => Some(BarcodeKind::Ean13),
            "EAN8" => Some(BarcodeKind::Ean8),
            "CODABAR" => Some(BarcodeKind::Codabar),
            "I25" => Some(BarcodeKind::Interleaved25),
            _ => None,
        }
    }
}

/// QR code error correction level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum QrLevel {
    L,
    #[default]
    M,
    Q,
    H,
}

impl QrLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" => Some(QrLevel::L),
            "M" => Some(QrLevel::M),
            "Q" => Some(QrLevel::Q),
            "H" => Some(QrLevel::H),
            _ => None,
        }
    }
}

/// Document metadata written to the output's info dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub keywords: Option<String>,
}
