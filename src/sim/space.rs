//! Pairwise collision space
//!
//! Owns a homogeneous set of bodies and tests every unordered pair once per
//! call. O(n²) by construction; the space is bounded to a small body count.
//!
//! Pair rules, in order:
//! - either body has zero scale: skipped
//! - filters disagree (see [`pair_allowed`]): skipped
//! - shapes overlap: both counters incremented, callbacks run `a` then `b`

use super::body::{Collider, Hit};
use super::filter::pair_allowed;
use super::slots::{OwnerId, SlotAllocator, SlotId};
use crate::config::KernelConfig;
use crate::error::{KernelError, Result};

/// Names one body inside the space that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle {
    owner: OwnerId,
    slot: SlotId,
    generation: u32,
}

impl BodyHandle {
    #[inline]
    pub fn slot(&self) -> SlotId {
        self.slot
    }
}

pub struct Space<B> {
    owner: OwnerId,
    slots: SlotAllocator,
    bodies: Vec<Option<B>>,
    generations: Vec<u32>,
    max_count: usize,
}

impl<B: Collider> Default for Space<B> {
    fn default() -> Self {
        Self::with_capacity(usize::MAX)
    }
}

impl<B: Collider> Space<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Space that refuses to hold more than `max_count` bodies.
    pub fn with_capacity(max_count: usize) -> Self {
        Self {
            owner: OwnerId::next(),
            slots: SlotAllocator::new(),
            bodies: Vec::new(),
            generations: Vec::new(),
            max_count,
        }
    }

    pub fn from_config(config: &KernelConfig) -> Self {
        Self::with_capacity(config.max_bodies)
    }

    /// Take ownership of `body`. The handle stays valid until [`Self::erase`] or [`Self::clear`].
    pub fn push(&mut self, body: B) -> Result<BodyHandle> {
        if self.slots.len() >= self.max_count {
            return Err(KernelError::CapacityExceeded {
                max: self.max_count,
            });
        }
        let slot = self.slots.acquire();
        if slot >= self.bodies.len() {
            self.bodies.push(None);
            self.generations.push(0);
        }
        self.bodies[slot] = Some(body);
        Ok(self.handle_at(slot))
    }

    /// Remove a body immediately and hand it back.
    pub fn erase(&mut self, handle: BodyHandle) -> Result<B> {
        let slot = self.locate(handle)?;
        let body = self.bodies[slot]
            .take()
            .ok_or(KernelError::InactiveIdentifier(slot))?;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.slots.release(slot)?;
        Ok(body)
    }

    #[inline]
    pub fn has_instance(&self, handle: BodyHandle) -> bool {
        self.locate(handle).is_ok()
    }

    pub fn get(&self, handle: BodyHandle) -> Option<&B> {
        let slot = self.locate(handle).ok()?;
        self.bodies[slot].as_ref()
    }

    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut B> {
        let slot = self.locate(handle).ok()?;
        self.bodies[slot].as_mut()
    }

    /// Live bodies in slot order
    pub fn iter(&self) -> impl Iterator<Item = (BodyHandle, &B)> + '_ {
        self.bodies
            .iter()
            .enumerate()
            .filter_map(|(slot, body)| body.as_ref().map(|b| (self.handle_at(slot), b)))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Zero every hit counter. Call once per tick before detection.
    pub fn reset_collided_count(&mut self) {
        for body in self.bodies.iter_mut().flatten() {
            body.body_mut().reset_collided_count();
        }
    }

    /// Test every unordered pair in slot order. Returns the number of colliding pairs.
    pub fn detect_collision(&mut self) -> usize {
        let mut pairs = 0;
        let count = self.bodies.len();

        for i in 0..count {
            if !matches!(&self.bodies[i], Some(a) if a.body().is_active()) {
                continue;
            }
            for j in (i + 1)..count {
                let this = self.handle_at(i);
                let other = self.handle_at(j);

                let (head, tail) = self.bodies.split_at_mut(j);
                let (Some(a), Some(b)) = (head[i].as_mut(), tail[0].as_mut()) else {
                    continue;
                };
                if !b.body().is_active() {
                    continue;
                }
                if !pair_allowed(a.body().filter(), b.body().filter()) {
                    continue;
                }
                if !a.overlaps(b) {
                    continue;
                }

                let hit_a = Hit {
                    this,
                    other,
                    other_position: b.body().position(),
                    other_filter: b.body().filter().map(|f| f.id),
                };
                let hit_b = Hit {
                    this: other,
                    other: this,
                    other_position: a.body().position(),
                    other_filter: a.body().filter().map(|f| f.id),
                };
                a.body_mut().record_hit(&hit_a);
                b.body_mut().record_hit(&hit_b);
                log::trace!("Collision between slots {} and {}", i, j);
                pairs += 1;
            }
        }
        pairs
    }

    /// Advance every body by its velocity.
    pub fn step(&mut self) {
        for body in self.bodies.iter_mut().flatten() {
            body.body_mut().step();
        }
    }

    /// Drop every body. All outstanding handles become inactive.
    pub fn clear(&mut self) {
        for (body, generation) in self.bodies.iter_mut().zip(self.generations.iter_mut()) {
            if body.take().is_some() {
                *generation = generation.wrapping_add(1);
            }
        }
        self.slots.clear();
    }

    fn handle_at(&self, slot: SlotId) -> BodyHandle {
        BodyHandle {
            owner: self.owner,
            slot,
            generation: self.generations[slot],
        }
    }

    fn locate(&self, handle: BodyHandle) -> Result<SlotId> {
        if handle.owner != self.owner {
            return Err(KernelError::NotOwned);
        }
        let generation = *self
            .generations
            .get(handle.slot)
            .ok_or(KernelError::InvalidIdentifier(handle.slot))?;
        if generation != handle.generation || self.bodies[handle.slot].is_none() {
            return Err(KernelError::InactiveIdentifier(handle.slot));
        }
        Ok(handle.slot)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec3;

    use super::*;
    use crate::sim::body::{Body, BoxCollider, SphereCollider, Transform};
    use crate::sim::filter::Filter;

    fn cube(x: f32) -> BoxCollider {
        BoxCollider::new(Body::new(Transform::new(
            Vec3::new(x, 0.0, 0.0),
            Vec3::splat(2.0),
        )))
    }

    fn filtered(x: f32, filter: Filter) -> BoxCollider {
        let mut b = cube(x);
        b.set_filter(Some(Rc::new(filter)));
        b
    }

    fn counts(space: &Space<BoxCollider>, handles: &[BodyHandle]) -> Vec<u32> {
        handles
            .iter()
            .map(|&h| space.get(h).unwrap().collided_count())
            .collect()
    }

    #[test]
    fn test_box_scenario() {
        let mut space = Space::new();
        let a = space.push(cube(0.0)).unwrap();
        let b = space.push(cube(1.0)).unwrap();

        assert_eq!(space.detect_collision(), 1);
        assert_eq!(counts(&space, &[a, b]), vec![1, 1]);

        space.get_mut(b).unwrap().transform.position = Vec3::new(3.0, 0.0, 0.0);
        space.reset_collided_count();
        assert_eq!(space.detect_collision(), 0);
        assert_eq!(counts(&space, &[a, b]), vec![0, 0]);
    }

    #[test]
    fn test_filter_symmetry() {
        // Neither filtered
        let mut space = Space::new();
        space.push(cube(0.0)).unwrap();
        space.push(cube(0.5)).unwrap();
        assert_eq!(space.detect_collision(), 1);

        // Only one filtered, permissive filter: still never collides
        let mut space = Space::new();
        space.push(filtered(0.0, Filter::new(1))).unwrap();
        space.push(cube(0.5)).unwrap();
        assert_eq!(space.detect_collision(), 0);

        // Mutually passing filters
        let mut space = Space::new();
        space.push(filtered(0.0, Filter::new(1).allow(&[2]))).unwrap();
        space.push(filtered(0.5, Filter::new(2).allow(&[1]))).unwrap();
        assert_eq!(space.detect_collision(), 1);

        // One side rejects
        let mut space = Space::new();
        space.push(filtered(0.0, Filter::new(1))).unwrap();
        space.push(filtered(0.5, Filter::new(2).deny(&[1]))).unwrap();
        assert_eq!(space.detect_collision(), 0);
    }

    #[test]
    fn test_zero_scale_is_excluded() {
        let mut space = Space::new();
        let a = space.push(cube(0.0)).unwrap();
        let b = space.push(cube(0.0)).unwrap();
        let c = space.push(cube(0.0)).unwrap();
        space.get_mut(b).unwrap().collapse();

        assert_eq!(space.detect_collision(), 1);
        assert_eq!(counts(&space, &[a, b, c]), vec![1, 0, 1]);
        assert!(space.has_instance(b));
    }

    #[test]
    fn test_zero_scale_sphere_is_excluded() {
        // Sphere overlap reads only the radius; the scale gate must still apply
        let sphere = |x: f32| {
            SphereCollider::new(Body::new(Transform::at(Vec3::new(x, 0.0, 0.0))), 1.0)
        };
        let mut space = Space::new();
        let a = space.push(sphere(0.0)).unwrap();
        let b = space.push(sphere(0.5)).unwrap();
        let c = space.push(sphere(-0.5)).unwrap();
        space.get_mut(c).unwrap().collapse();

        assert_eq!(space.detect_collision(), 1);
        let hits: Vec<u32> = [a, b, c]
            .iter()
            .map(|&h| space.get(h).unwrap().collided_count())
            .collect();
        assert_eq!(hits, vec![1, 1, 0]);
    }

    #[test]
    fn test_callbacks_run_in_pair_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut space = Space::new();
        for x in [0.0, 0.5] {
            let seen = seen.clone();
            let mut body = cube(x);
            body.set_callback(move |hit: &Hit| seen.borrow_mut().push((hit.this, hit.other)));
            space.push(body).unwrap();
        }
        let handles: Vec<_> = space.iter().map(|(h, _)| h).collect();

        space.detect_collision();
        assert_eq!(
            *seen.borrow(),
            vec![(handles[0], handles[1]), (handles[1], handles[0])]
        );
    }

    #[test]
    fn test_hits_accumulate_until_reset() {
        let mut space = Space::new();
        let a = space.push(cube(0.0)).unwrap();
        space.push(cube(0.5)).unwrap();
        space.push(cube(-0.5)).unwrap();

        space.detect_collision();
        assert_eq!(space.get(a).unwrap().collided_count(), 2);
        space.detect_collision();
        assert_eq!(space.get(a).unwrap().collided_count(), 4);
        space.reset_collided_count();
        assert_eq!(space.get(a).unwrap().collided_count(), 0);
    }

    #[test]
    fn test_erase_and_ownership() {
        let mut space = Space::new();
        let mut other: Space<BoxCollider> = Space::new();
        let a = space.push(cube(0.0)).unwrap();

        assert!(matches!(other.erase(a), Err(KernelError::NotOwned)));
        assert!(space.erase(a).is_ok());
        assert!(!space.has_instance(a));
        assert!(matches!(
            space.erase(a),
            Err(KernelError::InactiveIdentifier(_))
        ));

        // Reused slot, new identity
        let b = space.push(cube(0.0)).unwrap();
        assert_eq!(a.slot(), b.slot());
        assert!(space.get(a).is_none());
        assert!(space.get(b).is_some());
    }

    #[test]
    fn test_capacity() {
        let mut space = Space::with_capacity(1);
        space.push(cube(0.0)).unwrap();
        assert!(matches!(
            space.push(cube(1.0)),
            Err(KernelError::CapacityExceeded { max: 1 })
        ));
    }

    #[test]
    fn test_step_and_clear() {
        let mut space = Space::new();
        let ball = space
            .push(SphereCollider::new(
                Body::new(Transform::at(Vec3::ZERO)).with_velocity(Vec3::X),
                0.5,
            ))
            .unwrap();

        space.step();
        space.step();
        let body = space.get(ball).unwrap();
        assert_eq!(body.position(), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(body.previous_position(), Vec3::X);

        space.clear();
        assert!(space.is_empty());
        assert!(!space.has_instance(ball));
    }
}
