use super::collision::CollisionWorld;
use super::entity::{Entity, EntityId, EntityIdAllocator, SpriteId};
use super::geometry::Vec2;
use super::tilemap::TileMap;

/// Everything the frame loop simulates and draws: entities, the static
/// obstacle set and the tile map they live on.
#[derive(Debug)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    collision: CollisionWorld,
    tilemap: Option<TileMap>,
}

impl SceneWorld {
    pub fn new(tilemap: Option<TileMap>, collision: CollisionWorld) -> Self {
        Self {
            allocator: EntityIdAllocator::default(),
            entities: Vec::new(),
            collision,
            tilemap,
        }
    }

    pub fn spawn(&mut self, position: Vec2, size: Vec2, sprite: Option<SpriteId>) -> EntityId {
        let id = self.allocator.allocate();
        self.entities.push(Entity::new(id, position, size, sprite));
        id
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id() == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id() == id)
    }

    pub fn collision(&self) -> &CollisionWorld {
        &self.collision
    }

    pub fn tilemap(&self) -> Option<&TileMap> {
        self.tilemap.as_ref()
    }

    /// Moves every entity by `dt`, then rolls back each one whose feet probe
    /// lands on an obstacle. Returns the number of rollbacks.
    pub fn integrate_and_resolve(&mut self, dt_seconds: f64) -> u32 {
        for entity in &mut self.entities {
            entity.integrate(dt_seconds);
        }

        let mut rollbacks = 0u32;
        for entity in &mut self.entities {
            if self.collision.intersects_any(&entity.feet_rect()).is_some() {
                entity.rollback();
                rollbacks = rollbacks.saturating_add(1);
            }
        }
        rollbacks
    }
}
