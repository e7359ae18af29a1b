use nestflight_shared::config::{CollisionConfig, ConfigError};
use nestflight_shared::math::{normalize_or, reflect_with_restitution, surface_normal, DVec3};

/// Obstacle category. Only used for bookkeeping by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColliderKind {
    Tree,
    Rock,
    Structure,
}

/// Static spherical obstacle
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Collider {
    pub position: DVec3,
    pub radius: f64,
    pub kind: ColliderKind,
}

/// Penetration correction for one surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Position pushed out to exactly touching distance
    pub position: DVec3,
    /// Outward surface normal at the contact
    pub normal: DVec3,
}

/// Outcome of a full correction pass
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct CollisionResult {
    pub position: DVec3,
    pub velocity: DVec3,
    pub hit_ground: bool,
    /// Index of the obstacle that was hit, in insertion order
    pub hit_object: Option<usize>,
}

impl CollisionResult {
    pub fn collided(&self) -> bool {
        self.hit_ground || self.hit_object.is_some()
    }
}

/// Ground sphere plus a list of static obstacles.
/// One correction per surface type per call; no iterative resolution.
pub struct CollisionSystem {
    config: CollisionConfig,
    colliders: Vec<Collider>,
}

impl CollisionSystem {
    pub fn new(sphere_radius: f64) -> Self {
        Self {
            config: CollisionConfig {
                sphere_radius,
                ..Default::default()
            },
            colliders: Vec::new(),
        }
    }

    pub fn try_new(config: CollisionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            colliders: Vec::new(),
        })
    }

    pub fn sphere_radius(&self) -> f64 {
        self.config.sphere_radius
    }

    pub fn add_collider(&mut self, collider: Collider) {
        self.colliders.push(collider);
    }

    pub fn clear_colliders(&mut self) {
        self.colliders.clear();
    }

    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    /// Push a position below the minimum altitude radially back out.
    pub fn check_ground_collision(&self, position: DVec3, entity_radius: f64) -> Option<Contact> {
        let min_distance = self.config.sphere_radius + entity_radius;
        if position.length() >= min_distance {
            return None;
        }
        let normal = surface_normal(position);
        Some(Contact {
            position: normal * min_distance,
            normal,
        })
    }

    /// First obstacle (insertion order) overlapping the entity, with the pushed-out position.
    pub fn check_object_collision(
        &self,
        position: DVec3,
        entity_radius: f64,
    ) -> Option<(usize, Contact)> {
        self.colliders
            .iter()
            .enumerate()
            .find_map(|(index, collider)| {
                let min_distance = collider.radius + entity_radius;
                let offset = position - collider.position;
                if offset.length() >= min_distance {
                    return None;
                }
                // Dead centre: push out along the ground normal
                let normal = normalize_or(offset, surface_normal(collider.position));
                Some((
                    index,
                    Contact {
                        position: collider.position + normal * min_distance,
                        normal,
                    },
                ))
            })
    }

    /// Ground correction, then obstacle correction, bouncing velocity off each surface hit.
    pub fn check_all_collisions(
        &self,
        position: DVec3,
        velocity: DVec3,
        entity_radius: f64,
    ) -> CollisionResult {
        let mut result = CollisionResult {
            position,
            velocity,
            hit_ground: false,
            hit_object: None,
        };

        if let Some(contact) = self.check_ground_collision(result.position, entity_radius) {
            result.position = contact.position;
            result.velocity = reflect_with_restitution(
                result.velocity,
                contact.normal,
                self.config.ground_restitution,
            );
            result.hit_ground = true;
        }

        if let Some((index, contact)) = self.check_object_collision(result.position, entity_radius)
        {
            result.position = contact.position;
            result.velocity = reflect_with_restitution(
                result.velocity,
                contact.normal,
                self.config.object_restitution,
            );
            result.hit_object = Some(index);
        }

        result
    }
}
