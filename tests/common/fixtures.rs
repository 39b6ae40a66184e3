use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

pub const A4: (f32, f32) = (595.0, 842.0);
pub const A4_LANDSCAPE: (f32, f32) = (842.0, 595.0);

/// A PDF with one page per entry of `sizes`. Page `n` shows the text
/// `"{label} {n}"`.
pub fn labeled_pdf(label: &str, sizes: &[(f32, f32)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let mut kids: Vec<Object> = Vec::new();
    for (i, (width, height)) in sizes.iter().enumerate() {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.0.into()]),
                Operation::new("Td", vec![40.0.into(), 40.0.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("{} {}", label, i + 1))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap_or_default()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), (*width).into(), (*height).into()],
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        });
        kids.push(page_id.into());
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap_or_default();
    bytes
}

/// Builder for XML configurations in points with 20pt margins.
#[derive(Debug, Clone)]
pub struct ConfigXml {
    base: Vec<String>,
    params: Vec<String>,
    blockdefs: Vec<String>,
    allpages: Option<String>,
    entries: Vec<String>,
}

impl Default for ConfigXml {
    fn default() -> Self {
        Self {
            base: vec![
                r#"<page units="pt"/>"#.to_string(),
                r#"<margins left="20" top="20" right="20" bottom="20"/>"#.to_string(),
            ],
            params: Vec::new(),
            blockdefs: Vec::new(),
            allpages: None,
            entries: Vec::new(),
        }
    }
}

impl ConfigXml {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an element to `<baseparameters>`.
    pub fn base(mut self, xml: &str) -> Self {
        self.base.push(xml.to_string());
        self
    }

    pub fn pagination(self, format: &str) -> Self {
        self.base(&format!(r#"<pagination format="{}"/>"#, format))
    }

    pub fn templates(self, templates: &str) -> Self {
        self.base(&format!("<templatefiles>{}</templatefiles>", templates))
    }

    pub fn param(mut self, name: &str, value: &str) -> Self {
        self.params
            .push(format!(r#"<param name="{}" value="{}"/>"#, name, value));
        self
    }

    pub fn block(mut self, xml: &str) -> Self {
        self.blockdefs.push(xml.to_string());
        self
    }

    pub fn all_pages(mut self, order: &str, fields: &str) -> Self {
        self.allpages = Some(format!(r#"<allpages order="{}">{}</allpages>"#, order, fields));
        self
    }

    /// Adds a `<page>`, `<importdef>` or `<appendpdf>` entry.
    pub fn entry(mut self, xml: &str) -> Self {
        self.entries.push(xml.to_string());
        self
    }

    pub fn build(&self) -> String {
        let mut xml = String::from("<document>\n");
        xml.push_str(&format!("  <baseparameters>{}</baseparameters>\n", self.base.concat()));
        if !self.params.is_empty() {
            xml.push_str(&format!("  <userparameters>{}</userparameters>\n", self.params.concat()));
        }
        if !self.blockdefs.is_empty() {
            xml.push_str(&format!("  <blockdefs>{}</blockdefs>\n", self.blockdefs.concat()));
        }
        if let Some(allpages) = &self.allpages {
            xml.push_str(&format!("  {}\n", allpages));
        }
        xml.push_str(&format!("  <pages>\n    {}\n  </pages>\n", self.entries.join("\n    ")));
        xml.push_str("</document>\n");
        xml
    }
}
