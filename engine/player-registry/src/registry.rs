use crate::hashing::ConsistentHasher;
use crate::normalize::normalize_name;
use crate::types::{PlayerId, PlayerIdentity, Resolution, ResolutionOutcome, ResolveError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use feed_readers::{PlayerHint, Position};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// (normalized name, position)
type BucketKey = (String, Position);
type Bucket = Arc<RwLock<Vec<PlayerIdentity>>>;

enum Selection {
    Existing(usize, ResolutionOutcome),
    Create(ResolutionOutcome),
}

/// Identity Resolver - reconciles player hints from every feed to one
/// canonical identity per real player
///
/// Identities are grouped into buckets keyed by normalized name and position.
/// Lookups take a bucket read lock and never block each other; creating an
/// identity or binding an external ID takes that bucket's write lock only, so
/// unrelated players never contend. No lock is held across I/O.
pub struct IdentityResolver {
    /// Identity buckets by (normalized name, position)
    buckets: DashMap<BucketKey, Bucket>,

    /// External ID to the bucket and ID it is bound to
    external_ids: DashMap<String, (BucketKey, PlayerId)>,

    /// Every claimed ID, for collision probing and lookup by ID
    ids: DashMap<PlayerId, BucketKey>,
}

impl IdentityResolver {
    /// Create a new empty resolver
    pub fn new() -> Self {
        Self { buckets: DashMap::new(), external_ids: DashMap::new(), ids: DashMap::new() }
    }

    /// Resolve a hint to its canonical identity
    pub fn resolve(&self, hint: &PlayerHint) -> Result<PlayerIdentity, ResolveError> {
        self.resolve_detailed(hint).map(|resolution| resolution.identity)
    }

    /// Resolve a hint and report how the identity was found
    pub fn resolve_detailed(&self, hint: &PlayerHint) -> Result<Resolution, ResolveError> {
        if let Some(external_id) = hint.external_id.as_deref() {
            if let Some(identity) = self.get_by_external_id(external_id) {
                return Ok(Resolution { identity, outcome: ResolutionOutcome::ExternalId });
            }
        }

        let normalized = normalize_name(&hint.name);
        if normalized.is_empty() {
            return Err(ResolveError::EmptyName(hint.name.clone()));
        }

        match hint.position {
            Some(position) => Ok(self.resolve_in_bucket((normalized, position), hint)),
            None => self.resolve_any_position(normalized, hint),
        }
    }

    /// Insert a known roster identity (e.g. from a rankings feed).
    ///
    /// Idempotent on (normalized name, position, team): registering the same
    /// player twice returns the existing identity.
    pub fn register(&self, hint: &PlayerHint) -> Result<PlayerIdentity, ResolveError> {
        let normalized = normalize_name(&hint.name);
        if normalized.is_empty() {
            return Err(ResolveError::EmptyName(hint.name.clone()));
        }
        let position = hint.position.ok_or_else(|| ResolveError::PositionRequired(hint.name.clone()))?;
        let key = (normalized, position);
        let bucket = self.bucket(&key);

        let mut candidates = bucket.write();
        if let Some(existing) = candidates.iter_mut().find(|c| c.team == hint.team) {
            self.absorb(existing, hint, &key);
            return Ok(existing.clone());
        }
        let identity = self.create(&key, hint);
        candidates.push(identity.clone());
        Ok(identity)
    }

    /// Get an identity by its internal ID
    pub fn get(&self, id: PlayerId) -> Option<PlayerIdentity> {
        let key = self.ids.get(&id).map(|entry| entry.value().clone())?;
        self.find_in_bucket(&key, id)
    }

    /// Get the identity an external ID is bound to
    pub fn get_by_external_id(&self, external_id: &str) -> Option<PlayerIdentity> {
        // Clone out of the map before touching a bucket lock
        let (key, id) = self.external_ids.get(external_id).map(|entry| entry.value().clone())?;
        self.find_in_bucket(&key, id)
    }

    /// All identities, ordered by ID
    pub fn identities(&self) -> Vec<PlayerIdentity> {
        let buckets: Vec<Bucket> = self.buckets.iter().map(|entry| Arc::clone(entry.value())).collect();
        let mut all: Vec<PlayerIdentity> = buckets.iter().flat_map(|b| b.read().clone()).collect();
        all.sort_by_key(|identity| identity.id);
        all
    }

    /// Search for identities by partial name match
    pub fn search(&self, query: &str) -> Vec<PlayerIdentity> {
        let query = normalize_name(query);
        self.identities().into_iter().filter(|identity| identity.normalized_name.contains(&query)).collect()
    }

    /// Number of identities
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if resolver is empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn bucket(&self, key: &BucketKey) -> Bucket {
        if let Some(bucket) = self.buckets.get(key) {
            return Arc::clone(bucket.value());
        }
        Arc::clone(self.buckets.entry(key.clone()).or_default().value())
    }

    fn find_in_bucket(&self, key: &BucketKey, id: PlayerId) -> Option<PlayerIdentity> {
        let bucket = self.buckets.get(key).map(|entry| Arc::clone(entry.value()))?;
        let candidates = bucket.read();
        candidates.iter().find(|c| c.id == id).cloned()
    }

    fn select(candidates: &[PlayerIdentity], team: Option<&str>) -> Selection {
        match candidates.len() {
            0 => Selection::Create(ResolutionOutcome::Created),
            1 => Selection::Existing(0, ResolutionOutcome::Matched),
            n => {
                let mut same_team = candidates.iter().enumerate().filter(|(_, c)| c.team.as_deref() == team);
                match (same_team.next(), same_team.next()) {
                    (Some((index, _)), None) => Selection::Existing(index, ResolutionOutcome::TeamDisambiguated),
                    _ => Selection::Create(ResolutionOutcome::CreatedAmbiguous { candidates: n }),
                }
            }
        }
    }

    /// Whether returning `identity` for `hint` would change any state
    fn needs_write(identity: &PlayerIdentity, hint: &PlayerHint) -> bool {
        let unbound_id = hint.external_id.as_ref().is_some_and(|ext| !identity.external_ids.contains(ext));
        let missing_team = identity.team.is_none() && hint.team.is_some();
        unbound_id || missing_team
    }

    fn resolve_in_bucket(&self, key: BucketKey, hint: &PlayerHint) -> Resolution {
        let bucket = self.bucket(&key);
        let team = hint.team.as_deref();

        {
            let candidates = bucket.read();
            if let Selection::Existing(index, outcome) = Self::select(&candidates, team) {
                if !Self::needs_write(&candidates[index], hint) {
                    return Resolution { identity: candidates[index].clone(), outcome };
                }
            }
        }

        // Re-select under the write lock; another writer may have got here first
        let mut candidates = bucket.write();
        let resolution = match Self::select(&candidates, team) {
            Selection::Existing(index, outcome) => {
                let identity = &mut candidates[index];
                self.absorb(identity, hint, &key);
                Resolution { identity: identity.clone(), outcome }
            }
            Selection::Create(outcome) => {
                let identity = self.create(&key, hint);
                candidates.push(identity.clone());
                Resolution { identity, outcome }
            }
        };
        drop(candidates);

        if let ResolutionOutcome::CreatedAmbiguous { candidates } = resolution.outcome {
            warn!(
                name = %hint.name,
                position = %key.1,
                team = ?hint.team,
                candidates,
                id = %resolution.identity.id,
                "Ambiguous player identity, created a new identity instead of guessing"
            );
        }
        resolution
    }

    fn resolve_any_position(&self, normalized: String, hint: &PlayerHint) -> Result<Resolution, ResolveError> {
        let mut found: Vec<PlayerIdentity> = Vec::new();
        for position in Position::ALL {
            let key = (normalized.clone(), position);
            if let Some(bucket) = self.buckets.get(&key).map(|entry| Arc::clone(entry.value())) {
                found.extend(bucket.read().iter().cloned());
            }
        }

        let chosen = match found.len() {
            0 => None,
            1 => found.first(),
            _ => {
                let mut same_team = found.iter().filter(|c| c.team == hint.team);
                match (same_team.next(), same_team.next()) {
                    (Some(identity), None) => Some(identity),
                    _ => None,
                }
            }
        };

        match chosen {
            Some(identity) => Ok(self.resolve_in_bucket((normalized, identity.position), hint)),
            None => Err(ResolveError::PositionRequired(hint.name.clone())),
        }
    }

    /// Bind the hint's external ID and back-fill a missing team
    fn absorb(&self, identity: &mut PlayerIdentity, hint: &PlayerHint, key: &BucketKey) {
        if let Some(external_id) = hint.external_id.as_ref() {
            if !identity.external_ids.contains(external_id) {
                match self.external_ids.entry(external_id.clone()) {
                    Entry::Vacant(vacant) => {
                        vacant.insert((key.clone(), identity.id));
                        identity.external_ids.insert(external_id.clone());
                    }
                    Entry::Occupied(occupied) => {
                        debug!(
                            external_id = %external_id,
                            bound_to = %occupied.get().1,
                            id = %identity.id,
                            "External ID already bound to another identity"
                        );
                    }
                }
            }
        }
        if identity.team.is_none() {
            identity.team = hint.team.clone();
        }
    }

    fn create(&self, key: &BucketKey, hint: &PlayerHint) -> PlayerIdentity {
        let id = self.claim_id(key, hint.team.as_deref());
        let mut identity = PlayerIdentity {
            id,
            normalized_name: key.0.clone(),
            display_name: hint.name.trim().to_string(),
            position: key.1,
            team: hint.team.clone(),
            external_ids: BTreeSet::new(),
        };
        self.absorb(&mut identity, hint, key);
        debug!(id = %id, name = %identity.display_name, position = %key.1, "Created player identity");
        identity
    }

    fn claim_id(&self, key: &BucketKey, team: Option<&str>) -> PlayerId {
        let mut candidate = ConsistentHasher::hash_identity(&key.0, key.1, team);

        // Handle hash collisions by linear probing
        loop {
            match self.ids.entry(PlayerId(candidate)) {
                Entry::Vacant(vacant) => {
                    vacant.insert(key.clone());
                    return PlayerId(candidate);
                }
                Entry::Occupied(_) => candidate = candidate.wrapping_add(1),
            }
        }
    }
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new()
    }
}
