//! Recovers the pointee type of every opaque pointer in a module so that it
//! can be encoded by a legacy writer that only knows typed pointers.
//!
//! [`LegacyRewriter`] picks a strategy from the module's target triple and
//! returns the [`PointerTypeMap`] the writer reads typed pointer types from.
pub mod analyze;
pub mod config;
pub mod demote;
pub mod desc;
pub mod error;
pub mod extract;
pub mod marker;
pub mod patch;
pub mod rewriter;
pub mod signature;
pub mod site;
pub mod strategy;

pub use analyze::PointerTypeAnalysis;
pub use config::{RetypeConfig, StrategyKind};
pub use demote::ConstExprDemoter;
pub use desc::{PointerTypeMap, PtrDesc, PtrKey};
pub use error::{AnnotatedSlot, RetypeError};
pub use extract::MarkerExtraction;
pub use marker::{verify_coverage, MarkerInserter};
pub use patch::MismatchPatcher;
pub use rewriter::LegacyRewriter;
pub use signature::{
    AnnotatedSignatures, AnnotationOnly, MapResolver, SignatureReclassifier, SlotResolver,
    TypedSignature,
};
pub use strategy::{AnalyticalStrategy, EagerStrategy, PointerStrategy, Retyped};
