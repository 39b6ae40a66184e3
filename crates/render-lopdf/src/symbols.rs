//! Module patterns for 1D barcodes and QR codes.

use barcoders::sym::codabar::Codabar;
use barcoders::sym::code128::Code128;
use barcoders::sym::code39::Code39;
use barcoders::sym::code93::Code93;
use barcoders::sym::ean13::EAN13;
use barcoders::sym::ean8::EAN8;
use barcoders::sym::tf::TF;
use qrcode::{EcLevel, QrCode};
use quire_render_core::RenderError;
use quire_types::{BarcodeKind, QrLevel};

const CODE128_SET_B: char = 'Ɓ';
const CODE128_SETS: [char; 3] = ['À', 'Ɓ', 'Ć'];

fn barcode_error(kind: BarcodeKind, data: &str, err: impl std::fmt::Display) -> RenderError {
    RenderError::Barcode(format!("{:?} cannot encode '{}': {}", kind, data, err))
}

/// Encodes `data` into a bar pattern, one entry per module (1 = bar).
pub fn barcode_bars(kind: BarcodeKind, data: &str) -> Result<Vec<u8>, RenderError> {
    let bars = match kind {
        BarcodeKind::Code128 => {
            let data = if data.starts_with(CODE128_SETS) {
                data.to_string()
            } else {
                format!("{}{}", CODE128_SET_B, data)
            };
            Code128::new(&data).map(|c| c.encode())
        }
        BarcodeKind::Code39 => Code39::new(data).map(|c| c.encode()),
        BarcodeKind::Code93 => Code93::new(data).map(|c| c.encode()),
        BarcodeKind::Ean13 => EAN13::new(data).map(|c| c.encode()),
        BarcodeKind::Ean8 => EAN8::new(data).map(|c| c.encode()),
        BarcodeKind::Codabar => {
            let wrapped = match data.chars().next() {
                Some('A'..='D') => data.to_string(),
                _ => format!("A{}A", data),
            };
            Codabar::new(&wrapped).map(|c| c.encode())
        }
        BarcodeKind::Interleaved25 => {
            let padded = if data.len() % 2 == 1 {
                format!("0{}", data)
            } else {
                data.to_string()
            };
            TF::interleaved(&padded).map(|c| c.encode())
        }
    };
    bars.map_err(|e| barcode_error(kind, data, e))
}

/// Encodes `data` as a QR code. Returns the side length in modules and the
/// row-major dark-module map.
pub fn qr_modules(level: QrLevel, data: &str) -> Result<(usize, Vec<bool>), RenderError> {
    let ec = match level {
        QrLevel::L => EcLevel::L,
        QrLevel::M => EcLevel::M,
        QrLevel::Q => EcLevel::Q,
        QrLevel::H => EcLevel::H,
    };
    let code = QrCode::with_error_correction_level(data.as_bytes(), ec)
        .map_err(|e| RenderError::Barcode(format!("QR code cannot encode '{}': {}", data, e)))?;
    let modules = code
        .to_colors()
        .into_iter()
        .map(|c| c == qrcode::Color::Dark)
        .collect();
    Ok((code.width(), modules))
}

/// `(start, length)` of every run of set entries.
pub fn runs(bits: impl IntoIterator<Item = bool>) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut start = None;
    let mut len = 0;
    for (i, bit) in bits.into_iter().enumerate() {
        match (bit, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                out.push((s, i - s));
                start = None;
            }
            _ => {}
        }
        len = i + 1;
    }
    if let Some(s) = start {
        out.push((s, len - s));
    }
    out
}
