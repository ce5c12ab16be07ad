//! Physical bodies and their overlap predicates
//!
//! Every collider wraps a [`Body`] carrying transform, velocity, filter and
//! hit bookkeeping. The shape only contributes `overlaps`.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::filter::{Filter, FilterId};
use super::space::BodyHandle;

/// Position and per-axis extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new(position: Vec3, scale: Vec3) -> Self {
        Self { position, scale }
    }

    /// Unit scale at `position`
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Zero scale: kept in storage but ignored by collision detection
    #[inline]
    pub fn is_collapsed(&self) -> bool {
        self.scale == Vec3::ZERO
    }
}

/// Delivered to a body's callback when it touches another body.
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub this: BodyHandle,
    pub other: BodyHandle,
    pub other_position: Vec3,
    pub other_filter: Option<FilterId>,
}

pub type HitCallback = Box<dyn FnMut(&Hit)>;

/// State shared by every collider shape.
pub struct Body {
    pub transform: Transform,
    pub velocity: Vec3,
    /// Reserved for collision response; detection ignores it
    pub mass: f32,
    previous_position: Vec3,
    filter: Option<Rc<Filter>>,
    callback: Option<HitCallback>,
    collided_count: u32,
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("transform", &self.transform)
            .field("velocity", &self.velocity)
            .field("mass", &self.mass)
            .field("filter", &self.filter.as_ref().map(|filter| filter.id))
            .field("collided_count", &self.collided_count)
            .finish_non_exhaustive()
    }
}

impl Body {
    pub fn new(transform: Transform) -> Self {
        Self {
            transform,
            velocity: Vec3::ZERO,
            mass: 1.0,
            previous_position: transform.position,
            filter: None,
            callback: None,
            collided_count: 0,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_filter(mut self, filter: Rc<Filter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&Hit) + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    #[inline]
    pub fn scale(&self) -> Vec3 {
        self.transform.scale
    }

    /// Position before the last [`Body::step`]
    #[inline]
    pub fn previous_position(&self) -> Vec3 {
        self.previous_position
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_deref()
    }

    /// Bind to `filter`, or unbind with `None`.
    pub fn set_filter(&mut self, filter: Option<Rc<Filter>>) {
        self.filter = filter;
    }

    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&Hit) + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    /// Hits since the last reset
    #[inline]
    pub fn collided_count(&self) -> u32 {
        self.collided_count
    }

    /// Whether the body takes part in collision detection.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.transform.is_collapsed()
    }

    /// Soft-delete: zero the scale so detection skips the body.
    pub fn collapse(&mut self) {
        self.transform.scale = Vec3::ZERO;
    }

    /// Explicit Euler step
    pub fn step(&mut self) {
        self.previous_position = self.transform.position;
        self.transform.position += self.velocity;
    }

    pub(crate) fn reset_collided_count(&mut self) {
        self.collided_count = 0;
    }

    pub(crate) fn record_hit(&mut self, hit: &Hit) {
        self.collided_count += 1;
        if let Some(callback) = self.callback.as_mut() {
            callback(hit);
        }
    }
}

/// What the collision space needs from a body type.
pub trait Collider {
    fn body(&self) -> &Body;
    fn body_mut(&mut self) -> &mut Body;

    /// Shape test only; filters and zero scale are handled by the space.
    fn overlaps(&self, other: &Self) -> bool;
}

/// Axis-aligned box sized by the transform's scale.
#[derive(Debug)]
pub struct BoxCollider {
    pub body: Body,
}

impl BoxCollider {
    pub fn new(body: Body) -> Self {
        Self { body }
    }
}

impl Collider for BoxCollider {
    fn body(&self) -> &Body {
        &self.body
    }

    fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// Strict on every axis: touching faces do not overlap.
    fn overlaps(&self, other: &Self) -> bool {
        let delta = (self.body.position() - other.body.position()).abs();
        let reach = (self.body.scale() + other.body.scale()) * 0.5;
        delta.x < reach.x && delta.y < reach.y && delta.z < reach.z
    }
}

impl Deref for BoxCollider {
    type Target = Body;

    fn deref(&self) -> &Body {
        &self.body
    }
}

impl DerefMut for BoxCollider {
    fn deref_mut(&mut self) -> &mut Body {
        &mut self.body
    }
}

/// Sphere with its own radius; scale only matters for the zero-scale check.
#[derive(Debug)]
pub struct SphereCollider {
    pub body: Body,
    pub radius: f32,
}

impl SphereCollider {
    pub fn new(body: Body, radius: f32) -> Self {
        Self { body, radius }
    }
}

impl Collider for SphereCollider {
    fn body(&self) -> &Body {
        &self.body
    }

    fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    fn overlaps(&self, other: &Self) -> bool {
        self.body.position().distance(other.body.position()) < self.radius + other.radius
    }
}

impl Deref for SphereCollider {
    type Target = Body;

    fn deref(&self) -> &Body {
        &self.body
    }
}

impl DerefMut for SphereCollider {
    fn deref_mut(&mut self) -> &mut Body {
        &mut self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(x: f32, size: f32) -> BoxCollider {
        BoxCollider::new(Body::new(Transform::new(
            Vec3::new(x, 0.0, 0.0),
            Vec3::splat(size),
        )))
    }

    #[test]
    fn test_box_overlap() {
        assert!(cube(0.0, 2.0).overlaps(&cube(1.0, 2.0)));
        assert!(!cube(0.0, 2.0).overlaps(&cube(3.0, 2.0)));
    }

    #[test]
    fn test_box_touching_is_not_overlap() {
        // |2| == (2 + 2) / 2
        assert!(!cube(0.0, 2.0).overlaps(&cube(2.0, 2.0)));
        assert!(cube(0.0, 2.0).overlaps(&cube(1.99, 2.0)));
    }

    #[test]
    fn test_box_axes_are_independent() {
        let a = cube(0.0, 2.0);
        let mut b = cube(1.0, 2.0);
        b.transform.position.z = 5.0;
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_sphere_overlap_ignores_scale() {
        let a = SphereCollider::new(Body::new(Transform::at(Vec3::ZERO)), 1.0);
        let b = SphereCollider::new(
            Body::new(Transform::new(Vec3::new(1.5, 0.0, 0.0), Vec3::splat(100.0))),
            1.0,
        );
        let c = SphereCollider::new(Body::new(Transform::at(Vec3::new(0.0, 2.0, 0.0))), 1.0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_step_caches_previous_position() {
        let mut body = Body::new(Transform::at(Vec3::new(1.0, 2.0, 0.0)))
            .with_velocity(Vec3::new(0.5, -1.0, 0.0));
        body.step();
        assert_eq!(body.previous_position(), Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(body.position(), Vec3::new(1.5, 1.0, 0.0));
    }

    #[test]
    fn test_collapse_deactivates() {
        let mut body = Body::new(Transform::default());
        assert!(body.is_active());
        body.collapse();
        assert!(!body.is_active());
    }
}
