use lopdf::Document as LopdfDocument;
use lopdf::Object;
use lopdf::content::Content;

/// Strings shown with `Tj`/`TJ` in the content of page `page` (1-based).
/// Text inside template XObjects is not included.
pub fn page_texts(doc: &LopdfDocument, page: u32) -> Vec<String> {
    let Some(page_id) = doc.get_pages().get(&page).copied() else {
        return Vec::new();
    };
    let Ok(bytes) = doc.get_page_content(page_id) else {
        return Vec::new();
    };
    let Ok(content) = Content::decode(&bytes) else {
        return Vec::new();
    };
    let mut texts = Vec::new();
    for op in content.operations {
        match op.operator.as_str() {
            "Tj" => texts.extend(op.operands.iter().filter_map(string_of)),
            "TJ" => {
                if let Some(Object::Array(parts)) = op.operands.first() {
                    let joined: String = parts.iter().filter_map(string_of).collect();
                    texts.push(joined);
                }
            }
            _ => {}
        }
    }
    texts
}

fn string_of(object: &Object) -> Option<String> {
    match object {
        Object::String(bytes, _) => Some(bytes.iter().map(|b| *b as char).collect()),
        _ => None,
    }
}

/// Width and height of the MediaBox of page `page` (1-based).
pub fn page_size(doc: &LopdfDocument, page: u32) -> (f32, f32) {
    let media_box = doc
        .get_pages()
        .get(&page)
        .and_then(|id| doc.get_dictionary(*id).ok())
        .and_then(|dict| dict.get(b"MediaBox").ok())
        .and_then(|obj| obj.as_array().ok())
        .map(|values| values.iter().filter_map(|v| v.as_float().ok()).collect::<Vec<f32>>())
        .unwrap_or_default();
    match media_box.as_slice() {
        [x0, y0, x1, y1] => (x1 - x0, y1 - y0),
        _ => (0.0, 0.0),
    }
}

#[macro_export]
macro_rules! assert_pdf_page_count {
    ($pdf:expr, $expected:expr) => {
        assert_eq!(
            $pdf.page_count(),
            $expected,
            "expected {} pages, got {}",
            $expected,
            $pdf.page_count()
        );
    };
}

#[macro_export]
macro_rules! assert_page_shows {
    ($pdf:expr, $page:expr, $text:expr) => {
        let texts = $pdf.texts($page);
        assert!(
            texts.iter().any(|t| t == $text),
            "page {} does not show {:?}; found {:?}",
            $page,
            $text,
            texts
        );
    };
}
