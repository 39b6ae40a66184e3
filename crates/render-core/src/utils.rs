use quire_types::FontStyle;

/// Maps a family name and style onto one of the standard-14 PDF base fonts.
/// Unknown families fall back to Helvetica.
pub fn get_styled_font_name(base_name: &str, style: FontStyle) -> String {
    let family = base_name.trim().to_ascii_lowercase();
    let name = match (family.as_str(), style.bold, style.italic) {
        ("times" | "times-roman" | "serif", false, false) => "Times-Roman",
        ("times" | "times-roman" | "serif", true, false) => "Times-Bold",
        ("times" | "times-roman" | "serif", false, true) => "Times-Italic",
        ("times" | "times-roman" | "serif", true, true) => "Times-BoldItalic",
        ("courier" | "monospace", false, false) => "Courier",
        ("courier" | "monospace", true, false) => "Courier-Bold",
        ("courier" | "monospace", false, true) => "Courier-Oblique",
        ("courier" | "monospace", true, true) => "Courier-BoldOblique",
        ("symbol", _, _) => "Symbol",
        ("zapfdingbats", _, _) => "ZapfDingbats",
        (_, false, false) => "Helvetica",
        (_, true, false) => "Helvetica-Bold",
        (_, false, true) => "Helvetica-Oblique",
        (_, true, true) => "Helvetica-BoldOblique",
    };
    name.to_string()
}

/// Convert a top-down y coordinate to PDF user space (origin bottom-left).
pub fn flip_y(y: f32, page_height: f32) -> f32 {
    page_height - y
}

/// Greedy word wrap. Explicit newlines always break; a word wider than the
/// line is split between characters.
pub fn wrap_text(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if measure(&candidate) <= max_width || max_width <= 0.0 {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if measure(word) <= max_width {
                current = word.to_string();
                continue;
            }
            for c in word.chars() {
                current.push(c);
                if measure(&current) > max_width && current.chars().count() > 1 {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(c);
                }
            }
        }
        lines.push(current);
    }
    lines
}

/// Reduces minimal HTML markup to plain text: `<br>` and paragraph ends
/// become newlines, other tags are dropped and common entities decoded.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let Some(end) = rest[start..].find('>') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let tag = rest[start + 1..start + end]
            .trim()
            .trim_end_matches('/')
            .trim()
            .to_ascii_lowercase();
        let name = tag.split_whitespace().next().unwrap_or("");
        match name {
            "br" | "/p" | "/div" | "/li" => out.push('\n'),
            "li" => out.push_str("- "),
            _ => {}
        }
        rest = &rest[start + end + 1..];
    }
    out.push_str(rest);
    let decoded = decode_entities(&out);
    decoded.trim_end_matches('\n').to_string()
}

fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp..];
        let Some(semi) = after.find(';').filter(|&i| i <= 10) else {
            out.push('&');
            rest = &after[1..];
            continue;
        };
        let entity = &after[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &after[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
