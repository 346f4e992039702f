//! TurboCommerce document head management.
//!
//! Components contribute partial head descriptors (title, meta, links,
//! charset, viewport, html/body attributes). The store merges them with
//! title templating and keyed deduplication into one resolved head, which
//! is serialized once on the server and kept in sync with the live document
//! on the client as components mount and unmount.
//!
//! # Architecture
//!
//! - `HeadStore` - per-render registry, notifies on every change
//! - `resolve` - pure merge of contributions into a `ResolvedHead`
//! - `ReactiveBinder` - pushes heads to a `HeadConsumer`
//! - `ContributionHandle` - update or withdraw one registration
//! - `HeadContext` - explicit per-render entry point
//!
//! # Quick Start
//!
//! ```rust
//! use turbo_head::prelude::*;
//!
//! let ctx = HeadContext::server(HeadConfig::recommended().with_title_template("%s - Site"))?;
//! ctx.use_head(None, HeadDescriptor::new().with_title("Home"))?;
//!
//! let head = ctx.render_head();
//! assert!(head.head_tags.contains("<title>Home - Site</title>"));
//! # Ok::<(), turbo_head::HeadError>(())
//! ```

pub mod prelude;

mod binder;
mod config;
mod context;
mod descriptor;
mod document;
mod error;
mod handle;
mod merge;
mod owner;
mod render;
mod shell;
mod signal;
mod store;

pub use binder::*;
pub use config::*;
pub use context::*;
pub use descriptor::*;
pub use document::*;
pub use error::*;
pub use handle::*;
pub use merge::*;
pub use owner::*;
pub use render::*;
pub use shell::*;
pub use signal::*;
pub use store::*;
