use std::num::NonZeroUsize;

use crate::config;

/// Most steps taken in one `advance`, so a stalled frame does not spiral.
const MAX_STEPS_PER_ADVANCE: usize = 8;

/// Imperative commands the scene may issue to a body between steps.
pub trait BodyApi {
    /// Applies a one-time impulse at `offset` from the body center.
    fn apply_impulse(
        &mut self,
        body: rapier3d::dynamics::RigidBodyHandle,
        impulse: nalgebra::Vector3<f32>,
        offset: nalgebra::Vector3<f32>,
    );
    /// Overwrites the linear velocity.
    fn set_velocity(
        &mut self,
        body: rapier3d::dynamics::RigidBodyHandle,
        velocity: nalgebra::Vector3<f32>,
    );
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    /// Tag given to the collider at creation.
    pub tag: u128,
    pub distance: f32,
}

pub struct Physics {
    rigid_bodies: rapier3d::dynamics::RigidBodySet,
    integration_params: rapier3d::dynamics::IntegrationParameters,
    island_manager: rapier3d::dynamics::IslandManager,
    impulse_joints: rapier3d::dynamics::ImpulseJointSet,
    multibody_joints: rapier3d::dynamics::MultibodyJointSet,
    solver: rapier3d::dynamics::CCDSolver,
    colliders: rapier3d::geometry::ColliderSet,
    broad_phase: rapier3d::geometry::DefaultBroadPhase,
    narrow_phase: rapier3d::geometry::NarrowPhase,
    pipeline: rapier3d::pipeline::PhysicsPipeline,
    query_pipeline: rapier3d::pipeline::QueryPipeline,
    gravity: nalgebra::Vector3<f32>,
    allow_sleep: bool,
    capacity: usize,
    accumulator: f32,
    last_time: f32,
}

impl Physics {
    pub fn new(config: &config::Physics) -> Self {
        let integration_params = rapier3d::dynamics::IntegrationParameters {
            dt: config.step,
            num_solver_iterations: NonZeroUsize::new(config.iterations)
                .unwrap_or(NonZeroUsize::MIN),
            ..Default::default()
        };
        // rapier has a single broad phase, every strategy maps onto it
        log::info!(
            "Physics world: gravity {:?}, {} iterations, {:?} broad phase, step {}s",
            config.gravity,
            integration_params.num_solver_iterations,
            config.broad_phase,
            config.step,
        );
        Self {
            rigid_bodies: Default::default(),
            integration_params,
            island_manager: Default::default(),
            impulse_joints: Default::default(),
            multibody_joints: Default::default(),
            solver: Default::default(),
            colliders: Default::default(),
            broad_phase: Default::default(),
            narrow_phase: Default::default(),
            pipeline: Default::default(),
            query_pipeline: Default::default(),
            gravity: config.gravity.into(),
            allow_sleep: config.allow_sleep,
            capacity: config.capacity,
            accumulator: 0.0,
            last_time: 0.0,
        }
    }

    pub fn gravity(&self) -> nalgebra::Vector3<f32> {
        self.gravity
    }

    pub fn step_size(&self) -> f32 {
        self.integration_params.dt
    }

    pub fn solver_iterations(&self) -> usize {
        self.integration_params.num_solver_iterations.get()
    }

    /// Simulated time so far, in seconds.
    pub fn time(&self) -> f32 {
        self.last_time
    }

    pub fn body_count(&self) -> usize {
        self.rigid_bodies.len()
    }

    /// The capacity is soft: bodies past it are still created.
    pub fn over_capacity(&self) -> bool {
        self.rigid_bodies.len() > self.capacity
    }

    fn insert(
        &mut self,
        body: rapier3d::dynamics::RigidBody,
        collider: rapier3d::geometry::Collider,
    ) -> rapier3d::dynamics::RigidBodyHandle {
        let handle = self.rigid_bodies.insert(body);
        self.colliders
            .insert_with_parent(collider, handle, &mut self.rigid_bodies);
        if self.over_capacity() {
            log::warn!(
                "{} bodies exceed the configured capacity of {}",
                self.rigid_bodies.len(),
                self.capacity
            );
        }
        handle
    }

    /// Fixed half-space whose boundary faces local +Z.
    pub fn create_plane(
        &mut self,
        transform: nalgebra::Isometry3<f32>,
        tag: u128,
    ) -> rapier3d::dynamics::RigidBodyHandle {
        let body = rapier3d::dynamics::RigidBodyBuilder::fixed()
            .position(transform)
            .build();
        let collider = rapier3d::geometry::ColliderBuilder::halfspace(nalgebra::Vector3::z_axis())
            .user_data(tag)
            .build();
        self.insert(body, collider)
    }

    pub fn create_cuboid(
        &mut self,
        transform: nalgebra::Isometry3<f32>,
        size: [f32; 3],
        mass: f32,
        tag: u128,
    ) -> rapier3d::dynamics::RigidBodyHandle {
        let body = rapier3d::dynamics::RigidBodyBuilder::dynamic()
            .position(transform)
            .can_sleep(self.allow_sleep)
            .build();
        let collider =
            rapier3d::geometry::ColliderBuilder::cuboid(0.5 * size[0], 0.5 * size[1], 0.5 * size[2])
                .mass(mass)
                .user_data(tag)
                .build();
        self.insert(body, collider)
    }

    pub fn create_ball(
        &mut self,
        position: nalgebra::Vector3<f32>,
        radius: f32,
        mass: f32,
        tag: u128,
    ) -> rapier3d::dynamics::RigidBodyHandle {
        let body = rapier3d::dynamics::RigidBodyBuilder::dynamic()
            .translation(position)
            .can_sleep(self.allow_sleep)
            .build();
        let collider = rapier3d::geometry::ColliderBuilder::ball(radius)
            .mass(mass)
            .user_data(tag)
            .build();
        self.insert(body, collider)
    }

    pub fn body(
        &self,
        rb_handle: rapier3d::dynamics::RigidBodyHandle,
    ) -> Option<&rapier3d::dynamics::RigidBody> {
        self.rigid_bodies.get(rb_handle)
    }

    pub fn get_transform(
        &self,
        rb_handle: rapier3d::dynamics::RigidBodyHandle,
    ) -> nalgebra::Isometry3<f32> {
        self.rigid_bodies
            .get(rb_handle)
            .map_or_else(nalgebra::Isometry3::identity, |rb| *rb.position())
    }

    pub fn step(&mut self) {
        profiling::scope!("Physics step");
        let physics_hooks = ();
        let event_handler = ();
        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.solver,
            Some(&mut self.query_pipeline),
            &physics_hooks,
            &event_handler,
        );
        self.last_time += self.integration_params.dt;
    }

    /// Accumulates `elapsed` seconds and takes as many fixed steps as fit.
    /// Returns the number of steps taken.
    pub fn advance(&mut self, elapsed: f32) -> usize {
        let dt = self.integration_params.dt;
        self.accumulator += elapsed;
        let mut count = 0;
        while self.accumulator >= dt && count < MAX_STEPS_PER_ADVANCE {
            self.step();
            self.accumulator -= dt;
            count += 1;
        }
        if count == MAX_STEPS_PER_ADVANCE {
            self.accumulator = self.accumulator.min(dt);
        }
        count
    }

    /// Closest collider facing the ray. Colliders that contain the origin
    /// are skipped, the same way back faces are not picked on screen.
    pub fn cast_ray(
        &self,
        origin: nalgebra::Point3<f32>,
        dir: nalgebra::Vector3<f32>,
        max_distance: f32,
    ) -> Option<Hit> {
        let ray = rapier3d::geometry::Ray::new(origin, dir);
        let outside = |_handle: rapier3d::geometry::ColliderHandle,
                       collider: &rapier3d::geometry::Collider| {
            !collider
                .shape()
                .contains_point(collider.position(), &origin)
        };
        let filter = rapier3d::pipeline::QueryFilter::default().predicate(&outside);
        let (handle, distance) = self.query_pipeline.cast_ray(
            &self.rigid_bodies,
            &self.colliders,
            &ray,
            max_distance,
            true,
            filter,
        )?;
        let collider = self.colliders.get(handle)?;
        Some(Hit {
            tag: collider.user_data,
            distance,
        })
    }
}

impl BodyApi for Physics {
    fn apply_impulse(
        &mut self,
        body: rapier3d::dynamics::RigidBodyHandle,
        impulse: nalgebra::Vector3<f32>,
        offset: nalgebra::Vector3<f32>,
    ) {
        match self.rigid_bodies.get_mut(body) {
            Some(rb) => {
                let point = nalgebra::Point3::from(rb.translation() + offset);
                rb.apply_impulse_at_point(impulse, point, true);
            }
            None => log::warn!("Impulse for a missing body {:?}", body),
        }
    }

    fn set_velocity(
        &mut self,
        body: rapier3d::dynamics::RigidBodyHandle,
        velocity: nalgebra::Vector3<f32>,
    ) {
        match self.rigid_bodies.get_mut(body) {
            Some(rb) => rb.set_linvel(velocity, true),
            None => log::warn!("Velocity for a missing body {:?}", body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn world() -> Physics {
        Physics::new(&config::Physics::default())
    }

    fn floor() -> nalgebra::Isometry3<f32> {
        config::Pose {
            position: [0.0, -2.0, 0.0],
            rotation: [-std::f32::consts::FRAC_PI_2, 0.0, 0.0],
        }
        .isometry()
    }

    #[test]
    fn world_parameters() {
        let physics = world();
        assert_eq!(physics.gravity(), nalgebra::Vector3::new(0.0, -10.0, 0.0));
        assert_eq!(physics.solver_iterations(), 5);
        assert_relative_eq!(physics.step_size(), 1.0 / 60.0);
    }

    #[test]
    fn plane_stays_put() {
        let mut physics = world();
        let plane = physics.create_plane(floor(), 0);
        for _ in 0..30 {
            physics.step();
        }
        let body = physics.body(plane).unwrap();
        assert!(body.is_fixed());
        assert_relative_eq!(physics.get_transform(plane), floor(), epsilon = 1e-6);
    }

    #[test]
    fn bodies_past_capacity_are_still_created() {
        let mut physics = Physics::new(&config::Physics {
            capacity: 2,
            ..Default::default()
        });
        for i in 0..2 {
            physics.create_ball(nalgebra::Vector3::new(0.0, 0.0, 4.0 * i as f32), 1.0, 1.0, 0);
        }
        assert!(!physics.over_capacity());
        let extra = physics.create_ball(nalgebra::Vector3::new(0.0, 0.0, 8.0), 1.0, 1.0, 0);
        assert!(physics.over_capacity());
        assert_eq!(physics.body_count(), 3);
        assert!(physics.body(extra).is_some());
    }

    #[test]
    fn box_lands_on_floor() {
        let mut physics = world();
        physics.create_plane(floor(), 0);
        let cube = physics.create_cuboid(
            nalgebra::Isometry3::translation(0.0, 0.0, -5.0),
            [1.0; 3],
            1.0,
            1,
        );
        for _ in 0..240 {
            physics.step();
        }
        let body = physics.body(cube).unwrap();
        assert_relative_eq!(body.mass(), 1.0, epsilon = 1e-5);
        let pos = physics.get_transform(cube).translation.vector;
        assert_relative_eq!(pos.y, -1.5, epsilon = 0.05);
        assert_relative_eq!(pos.z, -5.0, epsilon = 0.05);
    }

    #[test]
    fn impulse_then_velocity() {
        let mut physics = world();
        let cube = physics.create_cuboid(nalgebra::Isometry3::identity(), [1.0; 3], 1.0, 1);
        physics.step();
        let before = *physics.body(cube).unwrap().linvel();

        physics.apply_impulse(
            cube,
            nalgebra::Vector3::new(0.0, 5.0, -10.0),
            nalgebra::Vector3::new(1.0, 1.0, 1.0),
        );
        let body = physics.body(cube).unwrap();
        assert_relative_eq!(
            *body.linvel(),
            before + nalgebra::Vector3::new(0.0, 5.0, -10.0),
            epsilon = 1e-4
        );
        assert!(body.angvel().norm() > 0.0);

        physics.set_velocity(cube, nalgebra::Vector3::new(0.0, 2.0, 0.0));
        assert_eq!(
            *physics.body(cube).unwrap().linvel(),
            nalgebra::Vector3::new(0.0, 2.0, 0.0)
        );
    }

    #[test]
    fn ray_picks_nearest_facing_collider() {
        let mut physics = world();
        physics.create_plane(nalgebra::Isometry3::translation(0.0, 0.0, -10.0), 1);
        physics.create_cuboid(nalgebra::Isometry3::translation(0.0, 0.0, -5.0), [1.0; 3], 1.0, 2);
        // the camera sits inside this one
        physics.create_ball(nalgebra::Vector3::zeros(), 1.0, 1.0, 3);
        physics.step();

        let origin = nalgebra::Point3::origin();
        let hit = physics
            .cast_ray(origin, -nalgebra::Vector3::z(), 1000.0)
            .unwrap();
        assert_eq!(hit.tag, 2);
        assert!(hit.distance > 4.0 && hit.distance < 5.0);

        let hit = physics
            .cast_ray(origin, nalgebra::Vector3::new(3.0, 0.0, -10.0).normalize(), 1000.0)
            .unwrap();
        assert_eq!(hit.tag, 1);

        assert_eq!(physics.cast_ray(origin, nalgebra::Vector3::z(), 1000.0), None);
    }

    #[test]
    fn fixed_step_advance() {
        let mut physics = world();
        assert_eq!(physics.advance(0.5 / 60.0), 0);
        assert_eq!(physics.advance(0.6 / 60.0), 1);
        assert_eq!(physics.advance(2.0 / 60.0), 2);
        assert_eq!(physics.advance(1.0), MAX_STEPS_PER_ADVANCE);
        // the backlog is dropped down to a single step
        assert_eq!(physics.advance(0.0), 1);
        assert_eq!(physics.advance(0.0), 0);
        assert_relative_eq!(physics.time(), physics.step_size() * 12.0, epsilon = 1e-4);
    }
}
