//! Collision filtering on 32-bit category / mask pairs.

use serde::{Deserialize, Serialize};

/// Default category for bodies that do not pick one.
pub const CATEGORY_DEFAULT: u32 = 0x001;
/// Reserved for player bodies.
pub const CATEGORY_PLAYER: u32 = 0x002;
/// Marks player bodies controlled by a remote peer.
pub const CATEGORY_NET_PLAYER: u32 = 0x004;
/// Collide with everything.
pub const MASK_ALL: u32 = u32::MAX;

/// Which bodies a body may collide with.
///
/// Two bodies in the same non-zero `group` always collide if the group is
/// positive and never collide if it is negative. Otherwise each body's
/// category must be in the other's mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionFilter {
    pub category: u32,
    pub mask: u32,
    pub group: i32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            category: CATEGORY_DEFAULT,
            mask: MASK_ALL,
            group: 0,
        }
    }
}

impl CollisionFilter {
    #[must_use]
    pub fn with_category(mut self, category: u32) -> Self {
        self.category = category;
        self
    }

    #[must_use]
    pub fn with_mask(mut self, mask: u32) -> Self {
        self.mask = mask;
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: i32) -> Self {
        self.group = group;
        self
    }

    /// Turn `bits` on or off in the mask.
    pub fn set_mask_bits(&mut self, bits: u32, enabled: bool) {
        if enabled {
            self.mask |= bits;
        } else {
            self.mask &= !bits;
        }
    }
}

/// Returns `true` if bodies with filters `a` and `b` may collide.
#[must_use]
pub fn can_collide(a: &CollisionFilter, b: &CollisionFilter) -> bool {
    if a.group == b.group && a.group != 0 {
        return a.group > 0;
    }
    (a.mask & b.category) != 0 && (b.mask & a.category) != 0
}
