//! Declarative form configuration.
//!
//! A configuration describes page defaults, template files, the ordered list
//! of page definitions with their fields, data grids, flex tables and data
//! blocks, plus import and append directives. It is written as XML:
//!
//! ```xml
//! <document title="Invoice">
//!   <baseparameters>
//!     <page orientation="P" size="A4" units="mm"/>
//!     <templatefiles><template src="form.pdf"/></templatefiles>
//!   </baseparameters>
//!   <pages>
//!     <page name="main">
//!       <field name="amount" type="money" x="150" y="40" width="40" align="R"/>
//!     </page>
//!   </pages>
//! </document>
//! ```

pub mod error;
pub mod loader;
pub mod model;
mod parser;

pub use error::{ConfigError, Location};
pub use loader::{ConfigLoader, load};
pub use model::*;
