//! Bidirectional mapping between external user ids and internal integer ids.
//!
//! Internal ids are derived from a hash of the external id reduced into a
//! bounded id space. When the derived id already belongs to a different
//! external id, derivation is retried on `external#attempt` until a free id is
//! found or the attempt budget is spent.

use std::collections::HashMap;
use std::fmt;

use prefmatch_core::{DEFAULT_ID_SPACE, DEFAULT_MAX_ID_ATTEMPTS, MatchError, MatchResult};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Hash function used to derive internal ids.
pub type IdHasher = fn(&str) -> u64;

/// First eight bytes of the SHA-256 digest, big-endian.
#[must_use]
pub fn sha256_prefix(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut prefix = [0_u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// External id ↔ internal id bijection.
#[derive(Clone)]
pub struct IdentifierRegistry {
    forward: HashMap<String, i64>,
    reverse: HashMap<i64, String>,
    id_space: u64,
    max_attempts: u32,
    hasher: IdHasher,
}

impl fmt::Debug for IdentifierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifierRegistry")
            .field("entries", &self.forward.len())
            .field("id_space", &self.id_space)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl Default for IdentifierRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_ID_SPACE, DEFAULT_MAX_ID_ATTEMPTS)
    }
}

impl IdentifierRegistry {
    /// Registry over `0..id_space` using SHA-256 derivation.
    ///
    /// An `id_space` of zero or beyond `i64::MAX` is clamped into range.
    #[must_use]
    pub fn new(id_space: u64, max_attempts: u32) -> Self {
        Self::with_hasher(id_space, max_attempts, sha256_prefix)
    }

    /// Registry with a custom derivation hash.
    #[must_use]
    pub fn with_hasher(id_space: u64, max_attempts: u32, hasher: IdHasher) -> Self {
        Self {
            forward: HashMap::new(),
            reverse: HashMap::new(),
            id_space: id_space.clamp(1, i64::MAX.unsigned_abs()),
            max_attempts: max_attempts.max(1),
            hasher,
        }
    }

    /// Empty registry with the same id space, attempt budget and hasher.
    #[must_use]
    pub fn empty_like(&self) -> Self {
        Self::with_hasher(self.id_space, self.max_attempts, self.hasher)
    }

    /// Return the internal id for `external`, registering it if needed.
    ///
    /// Resolving an already-registered id returns the same internal id. A
    /// returned id is never bound to a different external id.
    ///
    /// # Errors
    ///
    /// Returns `MatchError::IdentifierSpaceExhausted` when every attempt
    /// collides with another external id.
    pub fn resolve(&mut self, external: &str) -> MatchResult<i64> {
        if let Some(&internal) = self.forward.get(external) {
            return Ok(internal);
        }

        for attempt in 0..self.max_attempts {
            let candidate = self.derive(external, attempt);
            if self.reverse.contains_key(&candidate) {
                continue;
            }
            if attempt > 0 {
                debug!(
                    target: "prefmatch.registry",
                    user_id = external,
                    internal_id = candidate,
                    attempt,
                    "resolved id after collision"
                );
            }
            self.forward.insert(external.to_owned(), candidate);
            self.reverse.insert(candidate, external.to_owned());
            return Ok(candidate);
        }

        Err(MatchError::IdentifierSpaceExhausted {
            user_id: external.to_owned(),
            attempts: self.max_attempts,
            space: self.id_space,
        })
    }

    /// Internal id already registered for `external`.
    #[must_use]
    pub fn get(&self, external: &str) -> Option<i64> {
        self.forward.get(external).copied()
    }

    /// External id registered for `internal`.
    #[must_use]
    pub fn reverse(&self, internal: i64) -> Option<&str> {
        self.reverse.get(&internal).map(String::as_str)
    }

    /// Unregister `external`, returning the internal id it held.
    ///
    /// Used to undo a fresh registration whose engine insert failed.
    pub fn release(&mut self, external: &str) -> Option<i64> {
        let internal = self.forward.remove(external)?;
        self.reverse.remove(&internal);
        Some(internal)
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    #[must_use]
    pub const fn id_space(&self) -> u64 {
        self.id_space
    }

    #[allow(clippy::cast_possible_wrap)]
    fn derive(&self, external: &str, attempt: u32) -> i64 {
        let hash = if attempt == 0 {
            (self.hasher)(external)
        } else {
            (self.hasher)(&format!("{external}#{attempt}"))
        };
        // id_space <= i64::MAX, so the remainder always fits.
        (hash % self.id_space) as i64
    }
}
