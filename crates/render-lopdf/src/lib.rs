//! PDF drawing backend built on lopdf.
//!
//! [`LopdfBackend`] implements the quire drawing contract in memory and
//! serializes the finished document on `output`.

mod helpers;
mod images;
mod renderer;
mod symbols;

pub use helpers::encode_win_ansi;
pub use images::ImageXObject;
pub use renderer::LopdfBackend;
