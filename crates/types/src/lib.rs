pub mod color;
pub mod geometry;
pub mod ids;
pub mod page;
pub mod style;

pub use color::Color;
pub use geometry::{Point, Rect, Size};
pub use ids::{ScopeId, SourceName, TemplateHandle};
pub use page::{Orientation, PageFormat, Unit};
pub use style::{BarcodeKind, DocumentInfo, FontStyle, HAlign, QrLevel, VAlign};
