//! Spectator Camera
//!
//! Local view state: which entity the camera follows once the local entity
//! is out. Never replicated, never hashed.

use crate::game::state::PlayerId;

/// Next entry after `current` in the ascending `alive` list, wrapping to
/// the front. `current` need not be in the list.
pub fn next_alive_after(alive: &[PlayerId], current: Option<PlayerId>) -> Option<PlayerId> {
    let Some(current) = current else {
        return alive.first().copied();
    };
    alive
        .iter()
        .find(|id| **id > current)
        .or_else(|| alive.first())
        .copied()
}

/// Camera target selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpectatorCamera {
    target: Option<PlayerId>,
    explicit: bool,
}

impl SpectatorCamera {
    /// Camera with no target.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entity currently followed.
    pub fn target(&self) -> Option<PlayerId> {
        self.target
    }

    /// True once a target was picked by command rather than automatically.
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Follow `id` until told otherwise.
    pub fn set_target(&mut self, id: PlayerId) {
        self.target = Some(id);
        self.explicit = true;
    }

    /// Step to the next alive entity, as a manual "next" button would.
    pub fn cycle(&mut self, alive: &[PlayerId]) -> Option<PlayerId> {
        self.target = next_alive_after(alive, self.target);
        self.target
    }

    /// An entity was eliminated. `local` marks the entity this process
    /// drives; `alive` excludes the victim.
    pub fn on_eliminated(&mut self, victim: PlayerId, local: bool, alive: &[PlayerId]) {
        if self.explicit {
            return;
        }
        if local || self.target == Some(victim) {
            self.target = next_alive_after(alive, Some(victim));
        }
    }

    /// An entity left the match.
    pub fn on_departed(&mut self, id: PlayerId, alive: &[PlayerId]) {
        if self.target == Some(id) {
            self.explicit = false;
            self.target = next_alive_after(alive, Some(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> PlayerId {
        PlayerId::new([n; 16])
    }

    #[test]
    fn test_next_alive_wraps() {
        let alive = [id(1), id(4), id(7)];
        assert_eq!(next_alive_after(&alive, Some(id(1))), Some(id(4)));
        assert_eq!(next_alive_after(&alive, Some(id(5))), Some(id(7)));
        assert_eq!(next_alive_after(&alive, Some(id(7))), Some(id(1)));
        assert_eq!(next_alive_after(&alive, Some(id(9))), Some(id(1)));
        assert_eq!(next_alive_after(&alive, None), Some(id(1)));
        assert_eq!(next_alive_after(&[], Some(id(1))), None);
    }

    #[test]
    fn test_single_alive_is_its_own_successor() {
        assert_eq!(next_alive_after(&[id(3)], Some(id(3))), Some(id(3)));
    }

    #[test]
    fn test_local_elimination_hands_off() {
        let mut camera = SpectatorCamera::new();
        camera.on_eliminated(id(2), true, &[id(1), id(3)]);
        assert_eq!(camera.target(), Some(id(3)));

        // Followed entity goes down: move on
        camera.on_eliminated(id(3), false, &[id(1)]);
        assert_eq!(camera.target(), Some(id(1)));

        // Someone unrelated goes down: stay put
        camera.on_eliminated(id(5), false, &[id(1)]);
        assert_eq!(camera.target(), Some(id(1)));
    }

    #[test]
    fn test_explicit_target_sticks() {
        let mut camera = SpectatorCamera::new();
        camera.set_target(id(4));
        camera.on_eliminated(id(2), true, &[id(1), id(4)]);
        assert_eq!(camera.target(), Some(id(4)));
        assert!(camera.is_explicit());

        // Explicit target leaving falls back to automatic selection
        camera.on_departed(id(4), &[id(1)]);
        assert_eq!(camera.target(), Some(id(1)));
        assert!(!camera.is_explicit());
    }

    #[test]
    fn test_cycle() {
        let mut camera = SpectatorCamera::new();
        let alive = [id(1), id(2)];
        assert_eq!(camera.cycle(&alive), Some(id(1)));
        assert_eq!(camera.cycle(&alive), Some(id(2)));
        assert_eq!(camera.cycle(&alive), Some(id(1)));
    }
}
