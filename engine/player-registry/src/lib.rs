//! Player Registry - canonical player identities across feeds
//!
//! This module reconciles the name/ID hints each feed carries into exactly
//! one identity per real player, using exact normalized-name matching with
//! team disambiguation and self-healing external-ID memoization.

pub mod hashing;
pub mod normalize;
pub mod registry;
pub mod types;

pub use normalize::normalize_name;
pub use registry::IdentityResolver;
pub use types::{PlayerId, PlayerIdentity, Resolution, ResolutionOutcome, ResolveError};
