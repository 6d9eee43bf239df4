//! Resolution and rendering core for fake generation: finds a target
//! declaration among loaded modules, collects the imports its signature
//! needs and renders every parameter and result type as source text.

mod fake;
mod imports;
mod locator;
mod render;
mod walker;

pub use fake::{Fake, FakeOptions, GenerateError, Method, Param};
pub use imports::{Import, ImportRegistry};
pub use locator::{locate_declaration, Declaration, DeclarationKind, LocateError};
pub use render::TypeRenderer;
pub use walker::TypeWalker;
