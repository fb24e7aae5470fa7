//! # sp-cache
//!
//! Short-lived protocol state for the SAML service provider.
//!
//! ## Stores
//!
//! - [`ReplayCache`] - Accepted assertion IDs until their expiry
//! - [`CorrelationStore`] - Outstanding request IDs awaiting a response
//!
//! Both traits are async so a distributed backend can implement them; the
//! in-memory implementations use `dashmap` for lock-striped atomic updates.
//!
//! ## Example
//!
//! ```ignore
//! use sp_cache::{InMemoryReplayCache, ReplayCache};
//!
//! let cache = InMemoryReplayCache::new();
//! if !cache.insert_if_absent(&assertion_id, not_on_or_after).await? {
//!     return Err(SamlError::ReplayDetected);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod correlation;
pub mod error;
pub mod replay;

pub use correlation::{CorrelationStore, InMemoryCorrelationStore};
pub use error::{CacheError, CacheResult};
pub use replay::{InMemoryReplayCache, ReplayCache};
