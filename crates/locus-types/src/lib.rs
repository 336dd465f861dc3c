//! Shared data model for the locus inspector.
//!
//! Everything here crosses a boundary: the tagger writes [`SourceLocation`]s
//! into markup, the in-page inspector reads them back into
//! [`ElementDescriptor`]s, and the server speaks [`SessionInfo`] and the
//! config documents over HTTP.

mod api;
mod descriptor;
mod location;
mod registry;
mod session;

pub use api::*;
pub use descriptor::*;
pub use location::*;
pub use registry::*;
pub use session::*;
