use super::geometry::Rect;

/// Static obstacle rectangles, fixed for the lifetime of a map.
#[derive(Debug, Clone, Default)]
pub struct CollisionWorld {
    obstacles: Vec<Rect>,
}

impl CollisionWorld {
    pub fn new(obstacles: Vec<Rect>) -> Self {
        Self { obstacles }
    }

    /// Index of the first obstacle, in storage order, that overlaps `rect` by a
    /// non-zero area.
    pub fn intersects_any(&self, rect: &Rect) -> Option<usize> {
        self.obstacles
            .iter()
            .position(|obstacle| obstacle.intersects(rect))
    }

    pub fn obstacle(&self, index: usize) -> Option<&Rect> {
        self.obstacles.get(index)
    }

    pub fn obstacles(&self) -> &[Rect] {
        &self.obstacles
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }
}
