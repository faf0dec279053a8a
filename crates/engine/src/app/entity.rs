use super::geometry::{Rect, Vec2};

/// Height of the collision probe at the bottom of an entity.
pub const FEET_HEIGHT: f64 = 8.0;
/// Feet probe width as a fraction of the body width.
pub const FEET_WIDTH_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpriteId(pub usize);

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// A moving actor. `position` is the top-left of `body_rect`; the feet probe
/// is always derived from the body and is what gets tested against walls.
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    position: Vec2,
    previous_position: Vec2,
    velocity: Vec2,
    body_rect: Rect,
    feet_rect: Rect,
    sprite: Option<SpriteId>,
}

impl Entity {
    pub fn new(id: EntityId, position: Vec2, size: Vec2, sprite: Option<SpriteId>) -> Self {
        let body_rect = Rect::from_topleft(position, size);
        let feet_rect = feet_for_body(&body_rect);
        Self {
            id,
            position,
            previous_position: position,
            velocity: Vec2::ZERO,
            body_rect,
            feet_rect,
            sprite,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn sprite(&self) -> Option<SpriteId> {
        self.sprite
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Teleports the entity. The previous position is reset too, so a rollback
    /// right after a teleport leaves the entity where it was placed.
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.previous_position = position;
        self.sync_rects();
    }

    pub fn previous_position(&self) -> Vec2 {
        self.previous_position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn set_velocity(&mut self, vx: f64, vy: f64) {
        self.velocity = Vec2::new(vx, vy);
    }

    pub fn body_rect(&self) -> Rect {
        self.body_rect
    }

    pub fn feet_rect(&self) -> Rect {
        self.feet_rect
    }

    pub fn center(&self) -> Vec2 {
        self.body_rect.center()
    }

    pub fn integrate(&mut self, dt_seconds: f64) {
        debug_assert!(dt_seconds >= 0.0, "negative dt: {dt_seconds}");
        let dt_seconds = if dt_seconds.is_finite() {
            dt_seconds.max(0.0)
        } else {
            0.0
        };
        self.previous_position = self.position;
        self.position = self.position + self.velocity * dt_seconds;
        self.sync_rects();
    }

    /// Restores the pre-tick position. The restored spot is not re-checked:
    /// it was already validated by the previous tick.
    pub fn rollback(&mut self) {
        self.position = self.previous_position;
        self.sync_rects();
    }

    fn sync_rects(&mut self) {
        self.body_rect = self.body_rect.with_topleft(self.position);
        self.feet_rect = feet_for_body(&self.body_rect);
    }
}

fn feet_for_body(body: &Rect) -> Rect {
    Rect::new(0.0, 0.0, body.width * FEET_WIDTH_RATIO, FEET_HEIGHT).with_midbottom(body.midbottom())
}
