//! Authority Designation
//!
//! Exactly one process mutates a given entity or wall. Every mutating entry
//! point checks the tag first and silently does nothing on replicas, which is
//! what makes duplicate or late network delivery harmless.

use serde::{Serialize, Deserialize};

/// Identifies a participating process (host or client).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PeerId(pub u32);

impl PeerId {
    /// Peer id conventionally used by the hosting process.
    pub const HOST: PeerId = PeerId(0);
}

/// Ownership tag carried by every mutable piece of match state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Authority {
    /// Replica: reads replicated state, never mutates directly.
    #[default]
    NotAuthority,
    /// Sole mutator for this tick.
    Authority,
}

impl Authority {
    /// True if this instance may mutate the state it tags.
    #[inline]
    pub fn is_authority(self) -> bool {
        matches!(self, Authority::Authority)
    }
}

/// Which process is authoritative, as seen from the local process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityModel {
    /// The process this code runs in.
    pub local_peer: PeerId,
    /// The process holding state authority for the match.
    pub authority_peer: PeerId,
}

impl AuthorityModel {
    /// Model for the hosting process itself.
    pub fn host() -> Self {
        Self {
            local_peer: PeerId::HOST,
            authority_peer: PeerId::HOST,
        }
    }

    /// Model for a remote client replicating the host.
    pub fn client(local_peer: PeerId) -> Self {
        Self {
            local_peer,
            authority_peer: PeerId::HOST,
        }
    }

    /// Tag to stamp on state created by this process.
    pub fn local_authority(&self) -> Authority {
        if self.local_peer == self.authority_peer {
            Authority::Authority
        } else {
            Authority::NotAuthority
        }
    }

    /// True if `owner` is the process running this code.
    #[inline]
    pub fn is_local(&self, owner: PeerId) -> bool {
        owner == self.local_peer
    }
}
