//! Content stream building blocks.

use lopdf::content::Operation;
use lopdf::{Object, StringFormat};
use quire_types::{Color, Rect};

pub fn fill_color_op(color: Color) -> Operation {
    let [r, g, b] = color.components();
    Operation::new("rg", vec![r.into(), g.into(), b.into()])
}

pub fn stroke_color_op(color: Color) -> Operation {
    let [r, g, b] = color.components();
    Operation::new("RG", vec![r.into(), g.into(), b.into()])
}

/// `re` operator for a top-down rectangle on a page of `page_height`.
pub fn rect_op(rect: Rect, page_height: f32) -> Operation {
    let y = page_height - rect.y - rect.height;
    Operation::new(
        "re",
        vec![rect.x.into(), y.into(), rect.width.into(), rect.height.into()],
    )
}

pub fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

pub fn text_string(text: &str) -> Object {
    Object::String(encode_win_ansi(text), StringFormat::Literal)
}

/// A PDF text string for metadata. Non-ASCII text is written as UTF-16BE.
pub fn text_string_object(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Encodes text for a WinAnsi (cp1252) base font. Unmappable characters
/// become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(win_ansi_byte).collect()
}

fn win_ansi_byte(c: char) -> u8 {
    let code = c as u32;
    if code < 0x80 || (0xA0..=0xFF).contains(&code) {
        return code as u8;
    }
    match c {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => b'?',
    }
}

/// `cm` matrix rotating by `degrees` counter-clockwise around (`x`, `y`) in
/// PDF user space.
pub fn rotation_matrix(degrees: f32, x: f32, y: f32) -> [f32; 6] {
    let (sin, cos) = degrees.to_radians().sin_cos();
    [cos, sin, -sin, cos, x - x * cos + y * sin, y - x * sin - y * cos]
}

pub fn matrix_op(m: [f32; 6]) -> Operation {
    Operation::new("cm", m.iter().map(|v| (*v).into()).collect())
}
