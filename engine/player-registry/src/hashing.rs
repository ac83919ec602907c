use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use feed_readers::Position;

/// Consistent hashing for player identity IDs
///
/// The same (name, position, team) always hashes to the same ID across
/// restarts and different runs.
pub struct ConsistentHasher;

impl ConsistentHasher {
    /// Hash a normalized player key to an identity ID
    ///
    /// Uses the normalized name, position and team (empty when unknown) as a
    /// composite key. Collisions are resolved by the registry with linear
    /// probing.
    pub fn hash_identity(normalized_name: &str, position: Position, team: Option<&str>) -> u64 {
        let composite_key = format!("{normalized_name}|{position}|{}", team.unwrap_or(""));

        let mut hasher = DefaultHasher::new();
        composite_key.hash(&mut hasher);
        hasher.finish()
    }
}
