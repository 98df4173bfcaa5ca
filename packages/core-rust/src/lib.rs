//! `triplegate` core: operation tags, RDF quads, request and security contexts.

pub mod context;
pub mod operation;
pub mod security;
pub mod types;

pub use context::RequestContext;
pub use operation::Operation;
pub use security::SecurityContext;
pub use types::{GraphName, Principal, Quad, QuadPattern};
