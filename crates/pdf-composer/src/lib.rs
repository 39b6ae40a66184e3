//! PDF composition utilities for reusing pages of existing documents.
//!
//! This crate provides low-level PDF manipulation using lopdf:
//! - Deep object copying with cycle detection, shareable across calls
//! - Page import as a Form XObject (a page used as a background template)
//! - Verbatim page copy (raw appends)
//! - Page geometry with inherited attributes and `/Rotate` applied

mod error;

pub use error::ComposerError;

use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use std::collections::HashMap;

/// Maps object ids of a source document to their copies in a target document.
/// Reusing one map for several pages of the same source shares fonts and
/// other common resources instead of duplicating them.
pub type IdMap = HashMap<ObjectId, ObjectId>;

const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];
const MAX_TREE_DEPTH: usize = 32;

/// A helper struct to manage the state of copying objects between documents.
struct ObjectCopier<'a> {
    source_doc: &'a Document,
    target_doc: &'a mut Document,
    id_map: &'a mut IdMap,
}

impl<'a> ObjectCopier<'a> {
    fn new(source_doc: &'a Document, target_doc: &'a mut Document, id_map: &'a mut IdMap) -> Self {
        Self { source_doc, target_doc, id_map }
    }

    /// Deep copies an object and everything it references. Each source object
    /// is copied at most once.
    fn copy_object(&mut self, source_id: ObjectId) -> Result<ObjectId, lopdf::Error> {
        if let Some(target_id) = self.id_map.get(&source_id) {
            return Ok(*target_id);
        }

        // Reserve the id before recursing so reference cycles terminate.
        let new_id = self.target_doc.add_object(Object::Null);
        self.id_map.insert(source_id, new_id);

        let obj = self.source_doc.get_object(source_id)?.clone();
        let new_obj = self.remap_references(obj)?;

        match self.target_doc.objects.get_mut(&new_id) {
            Some(target_obj) => *target_obj = new_obj,
            None => return Err(lopdf::Error::ObjectNotFound(new_id)),
        }

        Ok(new_id)
    }

    /// Replaces every `Object::Reference` with the id of its copy.
    fn remap_references(&mut self, obj: Object) -> Result<Object, lopdf::Error> {
        match obj {
            Object::Reference(id) => Ok(Object::Reference(self.copy_object(id)?)),
            Object::Array(arr) => {
                let new_arr = arr
                    .into_iter()
                    .map(|o| self.remap_references(o))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Object::Array(new_arr))
            }
            Object::Dictionary(mut dict) => {
                for (_, value) in dict.iter_mut() {
                    *value = self.remap_references(std::mem::replace(value, Object::Null))?;
                }
                Ok(Object::Dictionary(dict))
            }
            Object::Stream(mut stream) => {
                for (_, value) in stream.dict.iter_mut() {
                    *value = self.remap_references(std::mem::replace(value, Object::Null))?;
                }
                Ok(Object::Stream(stream))
            }
            _ => Ok(obj),
        }
    }
}

/// Number of pages in `doc`.
pub fn page_count(doc: &Document) -> usize {
    doc.get_pages().len()
}

/// Object id of the 1-based `page` of `doc`.
pub fn page_id(doc: &Document, page: u32) -> Result<ObjectId, ComposerError> {
    if doc.is_encrypted() {
        return Err(ComposerError::Encrypted);
    }
    let pages = doc.get_pages();
    pages.get(&page).copied().ok_or(ComposerError::PageOutOfRange {
        page,
        count: pages.len(),
    })
}

/// Looks `key` up on the page and then on its ancestors in the page tree.
fn inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value.clone());
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve<'d>(doc: &'d Document, obj: &'d Object) -> &'d Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn number(doc: &Document, obj: &Object) -> Option<f32> {
    match resolve(doc, obj) {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn read_box(doc: &Document, obj: &Object) -> Option<[f32; 4]> {
    let arr = resolve(doc, obj).as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (slot, value) in out.iter_mut().zip(arr) {
        *slot = number(doc, value)?;
    }
    // Normalise so that [0]/[1] is the lower-left corner.
    Some([
        out[0].min(out[2]),
        out[1].min(out[3]),
        out[0].max(out[2]),
        out[1].max(out[3]),
    ])
}

/// Physical geometry of a source page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// `[llx, lly, urx, ury]` of the media box.
    pub media_box: [f32; 4],
    /// `/Rotate` normalised to 0, 90, 180 or 270.
    pub rotation: i64,
}

impl PageGeometry {
    fn is_quarter_turn(&self) -> bool {
        self.rotation == 90 || self.rotation == 270
    }

    /// Displayed width in points, with rotation applied.
    pub fn width(&self) -> f32 {
        let [llx, lly, urx, ury] = self.media_box;
        if self.is_quarter_turn() { ury - lly } else { urx - llx }
    }

    /// Displayed height in points, with rotation applied.
    pub fn height(&self) -> f32 {
        let [llx, lly, urx, ury] = self.media_box;
        if self.is_quarter_turn() { urx - llx } else { ury - lly }
    }

    pub fn is_landscape(&self) -> bool {
        self.width() > self.height()
    }

    /// Matrix mapping the page's user space onto an upright box anchored at
    /// the origin.
    fn form_matrix(&self) -> [f32; 6] {
        let [llx, lly, urx, ury] = self.media_box;
        match self.rotation {
            90 => [0.0, -1.0, 1.0, 0.0, -lly, urx],
            180 => [-1.0, 0.0, 0.0, -1.0, urx, ury],
            270 => [0.0, 1.0, -1.0, 0.0, ury, -llx],
            _ => [1.0, 0.0, 0.0, 1.0, -llx, -lly],
        }
    }
}

fn geometry_of(doc: &Document, page_id: ObjectId) -> PageGeometry {
    let media_box = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| read_box(doc, &obj))
        .unwrap_or(DEFAULT_MEDIA_BOX);
    let rotation = inherited(doc, page_id, b"Rotate")
        .and_then(|obj| resolve(doc, &obj).as_i64().ok())
        .map(|r| r.rem_euclid(360) / 90 * 90)
        .unwrap_or(0);
    PageGeometry { media_box, rotation }
}

/// Geometry of the 1-based `page` of `doc`, honouring inherited `/MediaBox`
/// and `/Rotate` entries.
pub fn page_geometry(doc: &Document, page: u32) -> Result<PageGeometry, ComposerError> {
    let id = page_id(doc, page)?;
    Ok(geometry_of(doc, id))
}

/// A source page imported into a target document as a Form XObject.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormXObject {
    pub id: ObjectId,
    pub geometry: PageGeometry,
}

/// Imports the 1-based `page` of `source` into `target` as a Form XObject
/// whose box spans `(0, 0, width, height)`. Drawing it with an identity
/// matrix reproduces the page as displayed.
pub fn import_page_as_form(
    target: &mut Document,
    source: &Document,
    page: u32,
    id_map: &mut IdMap,
) -> Result<FormXObject, ComposerError> {
    let source_page = page_id(source, page)?;
    let geometry = geometry_of(source, source_page);
    let content = source.get_page_content(source_page)?;

    let resources = match inherited(source, source_page, b"Resources") {
        Some(obj) => {
            let mut copier = ObjectCopier::new(source, target, id_map);
            copier.remap_references(obj)?
        }
        None => Object::Dictionary(dictionary! {}),
    };

    let [llx, lly, urx, ury] = geometry.media_box;
    let matrix: Vec<Object> = geometry.form_matrix().iter().map(|v| (*v).into()).collect();
    let form = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "FormType" => 1,
            "BBox" => vec![llx.into(), lly.into(), urx.into(), ury.into()],
            "Matrix" => matrix,
            "Resources" => resources,
        },
        content,
    );
    let id = target.add_object(form);
    log::debug!("Imported source page {} as form XObject {:?}", page, id);
    Ok(FormXObject { id, geometry })
}

/// Copies the 1-based `page` of `source` into `target` verbatim, attached to
/// the page tree node `parent`. Inherited attributes are materialised on the
/// copy. The caller is responsible for listing the new page in `parent`'s
/// `/Kids`.
pub fn copy_page(
    target: &mut Document,
    source: &Document,
    page: u32,
    parent: ObjectId,
    id_map: &mut IdMap,
) -> Result<(ObjectId, PageGeometry), ComposerError> {
    let source_page = page_id(source, page)?;
    let geometry = geometry_of(source, source_page);
    let mut page_dict = source
        .get_dictionary(source_page)
        .map_err(|e| ComposerError::MalformedPage(source_page, e.to_string()))?
        .clone();

    page_dict.remove(b"Parent");
    for key in [&b"Resources"[..], b"MediaBox", b"CropBox", b"Rotate"] {
        if !page_dict.has(key) {
            if let Some(value) = inherited(source, source_page, key) {
                page_dict.set(key.to_vec(), value);
            }
        }
    }

    // Annotations point back at their page through /P; map the page itself
    // up front so the copier does not walk into the source page tree. Every
    // copy gets a fresh page object.
    let new_id = target.add_object(Object::Null);
    id_map.insert(source_page, new_id);

    let mut copier = ObjectCopier::new(source, target, id_map);
    let mut remapped = match copier.remap_references(Object::Dictionary(page_dict))? {
        Object::Dictionary(dict) => dict,
        other => {
            return Err(ComposerError::MalformedPage(
                source_page,
                format!("expected a dictionary, found {:?}", other.enum_variant()),
            ));
        }
    };
    remapped.set("Parent", Object::Reference(parent));
    target.objects.insert(new_id, Object::Dictionary(remapped));
    log::debug!("Copied source page {} to {:?}", page, new_id);
    Ok((new_id, geometry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::StringFormat;
    use lopdf::content::{Content, Operation};

    /// Creates a simple PDF document with `num_pages` pages. Each page shows
    /// "<prefix> <n>" and all pages share one font through the page tree.
    fn create_dummy_pdf(num_pages: u32, text_prefix: &str, media_box: [i64; 4]) -> Document {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut page_ids = vec![];
        for i in 1..=num_pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![100.into(), 700.into()]),
                    Operation::new(
                        "Tj",
                        vec![Object::String(
                            format!("{} {}", text_prefix, i).into_bytes(),
                            StringFormat::Literal,
                        )],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            page_ids.push(page_id.into());
        }

        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids,
            "Count" => num_pages as i64,
            "Resources" => resources_id,
            "MediaBox" => media_box.iter().map(|v| Object::Integer(*v)).collect::<Vec<_>>(),
        };
        doc.objects.insert(pages_id, pages_dict.into());

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        doc
    }

    fn target_with_pages_node() -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.add_object(dictionary! { "Type" => "Pages", "Kids" => Vec::<Object>::new(), "Count" => 0 });
        (doc, pages_id)
    }

    #[test]
    fn test_page_geometry_is_inherited() {
        let doc = create_dummy_pdf(2, "Page", [0, 0, 595, 842]);
        let geometry = page_geometry(&doc, 2).unwrap();
        assert_eq!(geometry.width(), 595.0);
        assert_eq!(geometry.height(), 842.0);
        assert!(!geometry.is_landscape());
    }

    #[test]
    fn test_rotated_page_is_landscape() {
        let mut doc = create_dummy_pdf(1, "Page", [0, 0, 595, 842]);
        let id = page_id(&doc, 1).unwrap();
        doc.get_object_mut(id)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set("Rotate", 90i64);
        let geometry = page_geometry(&doc, 1).unwrap();
        assert_eq!(geometry.rotation, 90);
        assert_eq!(geometry.width(), 842.0);
        assert!(geometry.is_landscape());
    }

    #[test]
    fn test_page_out_of_range() {
        let doc = create_dummy_pdf(1, "Page", [0, 0, 595, 842]);
        match page_geometry(&doc, 3) {
            Err(ComposerError::PageOutOfRange { page, count }) => {
                assert_eq!(page, 3);
                assert_eq!(count, 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_import_page_as_form() {
        let source = create_dummy_pdf(2, "Template", [0, 0, 595, 842]);
        let (mut target, _) = target_with_pages_node();
        let mut ids = IdMap::new();

        let form = import_page_as_form(&mut target, &source, 2, &mut ids).unwrap();
        let stream = target.get_object(form.id).unwrap().as_stream().unwrap();
        assert_eq!(stream.dict.get(b"Subtype").unwrap().as_name().unwrap(), b"Form");
        assert!(String::from_utf8_lossy(&stream.content).contains("Template 2"));

        // Shared resources stay indirect so later imports reuse them.
        let resources = stream.dict.get(b"Resources").unwrap();
        assert!(resources.as_reference().is_ok());
        let (_, resources) = target.dereference(resources).unwrap();
        assert!(resources.as_dict().unwrap().has(b"Font"));
    }

    #[test]
    fn test_shared_id_map_copies_resources_once() {
        let source = create_dummy_pdf(2, "Template", [0, 0, 595, 842]);
        let (mut target, _) = target_with_pages_node();
        let mut ids = IdMap::new();

        import_page_as_form(&mut target, &source, 1, &mut ids).unwrap();
        let after_first = target.objects.len();
        import_page_as_form(&mut target, &source, 2, &mut ids).unwrap();
        // Only the second form stream is new.
        assert_eq!(target.objects.len(), after_first + 1);
    }

    #[test]
    fn test_copy_page_materialises_inherited_attributes() {
        let source = create_dummy_pdf(3, "Annex", [0, 0, 612, 792]);
        let (mut target, pages_id) = target_with_pages_node();
        let mut ids = IdMap::new();

        let (new_id, geometry) = copy_page(&mut target, &source, 2, pages_id, &mut ids).unwrap();
        assert_eq!(geometry.width(), 612.0);

        let page = target.get_dictionary(new_id).unwrap();
        assert_eq!(page.get(b"Parent").unwrap().as_reference().unwrap(), pages_id);
        assert!(page.has(b"MediaBox"));
        assert!(page.has(b"Resources"));

        // The source page tree node must not have been dragged along.
        let page_nodes = target
            .objects
            .values()
            .filter(|o| {
                o.as_dict()
                    .ok()
                    .and_then(|d| d.get(b"Type").ok())
                    .and_then(|t| t.as_name().ok())
                    == Some(&b"Pages"[..])
            })
            .count();
        assert_eq!(page_nodes, 1);
    }

    #[test]
    fn test_copying_a_page_twice_yields_distinct_pages() {
        let source = create_dummy_pdf(1, "Terms", [0, 0, 612, 792]);
        let (mut target, pages_id) = target_with_pages_node();
        let mut ids = IdMap::new();

        let (first, _) = copy_page(&mut target, &source, 1, pages_id, &mut ids).unwrap();
        let (second, _) = copy_page(&mut target, &source, 1, pages_id, &mut ids).unwrap();
        assert_ne!(first, second);
        let contents = |id| {
            target
                .get_dictionary(id)
                .unwrap()
                .get(b"Contents")
                .unwrap()
                .as_reference()
                .unwrap()
        };
        assert_eq!(contents(first), contents(second));
    }
}
