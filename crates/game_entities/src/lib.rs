//! Stock spawnable entities.
//!
//! These are the level building blocks a server loads from JSON and a
//! client mirrors:
//!
//! - [`Solid`]: a static box that blocks everything.
//! - [`Platform`]: a box net players can be let through, toggled by a
//!   synced `active` flag.
//! - [`Particle`]: a short-lived visual with no body.
//!
//! Call [`register_defaults`] once after building the game.

pub mod particle;
pub mod platform;
pub mod solid;

#[cfg(test)]
mod testing;

use game_core::{Game, GameError};
use serde::Deserialize;
use tracing::debug;

pub use particle::{PARTICLE, Particle};
pub use platform::{PLATFORM, Platform};
pub use solid::{SOLID, Solid};

/// Register every stock spawnable type with `game`.
///
/// # Errors
///
/// [`GameError::DuplicateSpawnable`] if one of the names is already taken.
pub fn register_defaults(game: &Game) -> Result<(), GameError> {
    game.register_spawnable_with_schema(SOLID, Solid::schema(), Solid::build)?;
    game.register_spawnable_with_schema(PLATFORM, Platform::schema(), Platform::build)?;
    game.register_spawnable_with_schema(PARTICLE, Particle::schema(), Particle::build)?;
    debug!(types = ?game.spawnable_names(), "registered stock spawnables");
    Ok(())
}

/// `{ "x", "y" }` in spawnable args.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub(crate) struct Xy {
    pub x: f32,
    pub y: f32,
}

impl From<Xy> for game_math::Vec2 {
    fn from(v: Xy) -> Self {
        Self::new(v.x, v.y)
    }
}

#[cfg(test)]
mod tests {
    use game_core::GameConfig;

    use super::*;

    #[test]
    fn test_register_defaults() {
        let game = Game::new(GameConfig::default()).unwrap();
        register_defaults(&game).unwrap();

        assert_eq!(game.spawnable_names(), vec!["particle", "platform", "solid"]);
        let err = register_defaults(&game).unwrap_err();
        assert!(matches!(err, GameError::DuplicateSpawnable(ref n) if n == "solid"));
    }
}
