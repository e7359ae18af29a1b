//! Nest bookkeeping.
//!
//! The registry is the single owner of nest data. The nesting state machine
//! only holds a [`NestId`] and changes occupancy through
//! [`NestRegistry::set_nest_occupied`].

use crate::collision::{Collider, ColliderKind};
use crate::sphere::SurfacePlacement;
use nestflight_shared::config::{ConfigError, RegistryConfig};
use nestflight_shared::math::{build_tangent_basis, look_rotation, surface_normal, DQuat, DVec3};
use rand::Rng;

/// Handle to a nest inside a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct NestId(pub usize);

/// Landing spot on the world surface
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NestPoint {
    pub position: DVec3,
    /// Resting orientation, local +Y along the surface normal
    pub orientation: DQuat,
    pub occupied: bool,
    pub active: bool,
    /// Clearance radius of the object the nest sits on
    pub clearance_radius: f64,
}

/// Source of nests for the nesting state machine.
pub trait NestRegistry {
    fn nest(&self, id: NestId) -> Option<&NestPoint>;

    /// Closest nest that can currently be landed on, if any is in range.
    fn nearest_active_nest(&self, position: DVec3) -> Option<NestId>;

    fn nest_world_position(&self, id: NestId) -> Option<DVec3> {
        self.nest(id).map(|n| n.position)
    }

    fn nest_world_orientation(&self, id: NestId) -> Option<DQuat> {
        self.nest(id).map(|n| n.orientation)
    }

    fn nest_surface_normal(&self, id: NestId) -> Option<DVec3> {
        self.nest_world_position(id).map(surface_normal)
    }

    fn set_nest_occupied(&mut self, id: NestId, occupied: bool);

    fn update(&mut self, _dt: f64, _position: DVec3) {}

    fn reset(&mut self);
}

#[derive(Debug, Clone)]
struct NestSlot {
    point: NestPoint,
    /// Seconds until a vacated nest becomes active again
    dormant_for: f64,
}

/// In-memory registry of static nests on the sphere.
pub struct SphereNestRegistry {
    config: RegistryConfig,
    nests: Vec<NestSlot>,
}

impl SphereNestRegistry {
    pub fn new() -> Self {
        Self {
            config: RegistryConfig::default(),
            nests: Vec::new(),
        }
    }

    pub fn try_new(config: RegistryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            nests: Vec::new(),
        })
    }

    /// Place `config.nest_count` nests on host trees at free surface cells.
    /// Returns the registry and the host colliders.
    pub fn scatter(
        config: RegistryConfig,
        sphere_radius: f64,
        placement: &mut SurfacePlacement,
        rng: &mut impl Rng,
    ) -> Result<(Self, Vec<Collider>), ConfigError> {
        let mut registry = Self::try_new(config)?;
        let mut hosts = Vec::with_capacity(config.nest_count);

        for _ in 0..config.nest_count {
            let Some(cell) = placement.allocate() else {
                tracing::warn!("No free surface cells left, placed {} nests", hosts.len());
                break;
            };
            let normal = placement.direction(cell);
            let host_radius = rng.gen_range(config.host_radius_min..=config.host_radius_max);
            let (tangent, _) = build_tangent_basis(normal);

            hosts.push(Collider {
                position: normal * sphere_radius,
                radius: host_radius,
                kind: ColliderKind::Tree,
            });
            registry.add_nest(
                normal * (sphere_radius + host_radius),
                look_rotation(tangent, normal),
                host_radius,
            );
        }

        Ok((registry, hosts))
    }

    pub fn add_nest(&mut self, position: DVec3, orientation: DQuat, clearance_radius: f64) -> NestId {
        self.nests.push(NestSlot {
            point: NestPoint {
                position,
                orientation: orientation.normalize(),
                occupied: false,
                active: true,
                clearance_radius,
            },
            dormant_for: 0.0,
        });
        NestId(self.nests.len() - 1)
    }

    pub fn set_nest_active(&mut self, id: NestId, active: bool) {
        if let Some(slot) = self.nests.get_mut(id.0) {
            slot.point.active = active;
            slot.dormant_for = 0.0;
        }
    }

    pub fn len(&self) -> usize {
        self.nests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nests.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NestId, &NestPoint)> {
        self.nests
            .iter()
            .enumerate()
            .map(|(i, slot)| (NestId(i), &slot.point))
    }

    pub fn occupied_count(&self) -> usize {
        self.nests.iter().filter(|s| s.point.occupied).count()
    }
}

impl Default for SphereNestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NestRegistry for SphereNestRegistry {
    fn nest(&self, id: NestId) -> Option<&NestPoint> {
        self.nests.get(id.0).map(|slot| &slot.point)
    }

    fn nearest_active_nest(&self, position: DVec3) -> Option<NestId> {
        let range = self.config.detection_radius;
        self.nests
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.point.active && !slot.point.occupied)
            .map(|(i, slot)| (i, slot.point.position.distance(position)))
            .filter(|&(_, d)| d <= range)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| NestId(i))
    }

    fn set_nest_occupied(&mut self, id: NestId, occupied: bool) {
        let delay = self.config.reactivate_delay;
        let Some(slot) = self.nests.get_mut(id.0) else {
            return;
        };
        if occupied {
            slot.point.occupied = true;
        } else if slot.point.occupied {
            slot.point.occupied = false;
            if delay > 0.0 {
                slot.point.active = false;
                slot.dormant_for = delay;
            }
        }
        tracing::debug!(nest = id.0, occupied, "Nest occupancy changed");
    }

    fn update(&mut self, dt: f64, _position: DVec3) {
        for slot in self.nests.iter_mut().filter(|s| s.dormant_for > 0.0) {
            slot.dormant_for -= dt;
            if slot.dormant_for <= 0.0 {
                slot.dormant_for = 0.0;
                slot.point.active = true;
            }
        }
    }

    fn reset(&mut self) {
        for slot in &mut self.nests {
            slot.point.occupied = false;
            slot.point.active = true;
            slot.dormant_for = 0.0;
        }
    }
}
