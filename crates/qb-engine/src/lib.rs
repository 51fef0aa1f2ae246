//! QueryBrick decision engine.
//!
//! Given a natural-language question about a building, decide whether it
//! needs a numeric analytics function at all (versus a pure
//! ontology/metadata lookup), and if so which registered function should
//! handle it, with what confidence.
//!
//! Three independent signal sources feed one deterministic decision:
//! - a cached snapshot of the external function registry, matched with
//!   lexical heuristics ([`scorer`]),
//! - a fixed cue table that short-circuits metadata-only questions
//!   ([`overrides`]),
//! - an optional pair of trained text classifiers ([`classifier`]).
//!
//! Any of the three may be unavailable at any time; every branch has a
//! defined fallback instead of an error.

pub mod cache;
pub mod classifier;
pub mod decide;
pub mod error;
pub mod overrides;
pub mod registry;
pub mod scorer;
pub mod source;

pub use cache::RegistryCache;
pub use classifier::ClassifierBundle;
pub use decide::{DecisionEngine, DecisionStrategy};
pub use error::{EngineError, EngineResult};
pub use registry::RegistrySnapshot;
pub use source::{HttpRegistrySource, SnapshotSource};
