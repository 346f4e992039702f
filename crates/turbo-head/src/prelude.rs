//! Prelude for convenient imports.
//!
//! ```rust,ignore
//! use turbo_head::prelude::*;
//! ```

pub use crate::{
    ContributionHandle, HeadConfig, HeadContext, HeadDescriptor, HeadDocument, HeadError,
    HeadResult, HeadSource, MemoryDocument, Owner, Signal, SyncPolicy, TagEntry, TitleTemplate,
};
