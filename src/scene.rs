use rand::SeedableRng as _;

use crate::{
    camera::Camera,
    config,
    instances::SphereField,
    loader::{Loader, Suspense, SuspenseState},
    model::Visual,
    physics::{BodyApi, Physics},
};

pub struct StaticPlane {
    pub body: rapier3d::dynamics::RigidBodyHandle,
    pub pose: config::Pose,
    pub visual: Visual,
}

pub struct DynamicBox {
    pub body: rapier3d::dynamics::RigidBodyHandle,
    pub visual: Visual,
    pub on_click: config::ClickResponse,
}

impl DynamicBox {
    /// Kicks the body: impulse first, then the velocity overwrite.
    /// Clicks stack, nothing guards against repeats.
    pub fn click(&self, api: &mut impl BodyApi) {
        let response = &self.on_click;
        api.apply_impulse(
            self.body,
            response.impulse.into(),
            response.impulse_point.into(),
        );
        api.set_velocity(self.body, response.velocity.into());
    }
}

pub enum Entity {
    Plane(StaticPlane),
    Box(DynamicBox),
    Spheres(SphereField),
}

/// Children held back by a suspension boundary. Nothing is shown for
/// them until the boundary resolves.
struct Boundary {
    suspense: Suspense,
    children: Vec<config::Node>,
}

pub struct Scene {
    pub camera: Camera,
    pub lights: Vec<config::Light>,
    entities: Vec<Entity>,
    boundaries: Vec<Boundary>,
    rng: rand::rngs::StdRng,
}

impl Scene {
    pub fn mount(config: &config::Config, physics: &mut Physics, loader: &Loader) -> Self {
        Self::mount_with_rng(config, physics, loader, rand::rngs::StdRng::from_entropy())
    }

    pub fn mount_with_rng(
        config: &config::Config,
        physics: &mut Physics,
        loader: &Loader,
        rng: rand::rngs::StdRng,
    ) -> Self {
        log::info!("Mounting the scene");
        let mut scene = Self {
            camera: Camera::new(&config.camera),
            lights: config.lights.clone(),
            entities: Vec::new(),
            boundaries: Vec::new(),
            rng,
        };
        for node in config.nodes.iter() {
            scene.mount_node(node, physics, loader, None);
        }
        log::info!(
            "Mounted {} planes, {} boxes, {} suspended subtree(s)",
            scene.plane_count(),
            scene.box_count(),
            scene.suspended_count()
        );
        scene
    }

    fn mount_node(
        &mut self,
        node: &config::Node,
        physics: &mut Physics,
        loader: &Loader,
        resolved: Option<&Suspense>,
    ) {
        let tag = self.entities.len() as u128;
        match *node {
            config::Node::Plane(ref desc) => {
                let body = physics.create_plane(desc.pose.isometry(), tag);
                self.entities.push(Entity::Plane(StaticPlane {
                    body,
                    pose: desc.pose,
                    visual: Visual::plane(desc),
                }));
            }
            config::Node::Box(ref desc) => {
                let body = physics.create_cuboid(desc.pose.isometry(), desc.size, desc.mass, tag);
                self.entities.push(Entity::Box(DynamicBox {
                    body,
                    visual: Visual::cuboid(desc),
                    on_click: desc.on_click.clone(),
                }));
            }
            config::Node::InstancedSpheres(ref desc) => {
                let path = desc.normal_map.path.as_path();
                let texture = match resolved {
                    Some(suspense) => suspense.texture(path),
                    None => {
                        // no boundary above, the whole scene waits for it
                        let mut suspense = Suspense::new(loader, [path]);
                        suspense.wait();
                        suspense.texture(path)
                    }
                };
                match texture {
                    Some(texture) => {
                        let field = SphereField::mount(
                            desc,
                            texture,
                            physics,
                            &mut self.rng,
                            tag,
                        );
                        self.entities.push(Entity::Spheres(field));
                    }
                    None => log::error!("Instanced spheres have no normal map {:?}", path),
                }
            }
            config::Node::Suspense(ref children) => {
                let suspense = Suspense::new(loader, node.textures());
                let mut boundary = Boundary {
                    suspense,
                    children: children.clone(),
                };
                if boundary.suspense.state() == SuspenseState::Loaded {
                    self.mount_children(&mut boundary, physics, loader);
                } else {
                    self.boundaries.push(boundary);
                }
            }
        }
    }

    fn mount_children(&mut self, boundary: &mut Boundary, physics: &mut Physics, loader: &Loader) {
        for child in boundary.children.drain(..) {
            self.mount_node(&child, physics, loader, Some(&boundary.suspense));
        }
    }

    /// Mounts the subtrees whose textures arrived. Failed boundaries are
    /// dropped, their children never show.
    pub fn update(&mut self, physics: &mut Physics, loader: &Loader) {
        let mut boundaries = std::mem::take(&mut self.boundaries);
        boundaries.retain_mut(|boundary| match boundary.suspense.poll() {
            SuspenseState::Loading => true,
            SuspenseState::Loaded => {
                log::debug!("Suspense resolved, mounting {} node(s)", boundary.children.len());
                self.mount_children(boundary, physics, loader);
                false
            }
            SuspenseState::Failed => false,
        });
        // children may have added boundaries of their own
        boundaries.append(&mut self.boundaries);
        self.boundaries = boundaries;
    }

    /// Blocks until every pending boundary settles, then mounts.
    pub fn wait(&mut self, physics: &mut Physics, loader: &Loader) {
        while !self.boundaries.is_empty() {
            for boundary in self.boundaries.iter_mut() {
                boundary.suspense.wait();
            }
            self.update(physics, loader);
        }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn plane_count(&self) -> usize {
        self.entities
            .iter()
            .filter(|e| matches!(e, Entity::Plane(_)))
            .count()
    }

    pub fn box_count(&self) -> usize {
        self.entities
            .iter()
            .filter(|e| matches!(e, Entity::Box(_)))
            .count()
    }

    pub fn sphere_fields(&self) -> impl Iterator<Item = &SphereField> {
        self.entities.iter().filter_map(|e| match *e {
            Entity::Spheres(ref field) => Some(field),
            _ => None,
        })
    }

    /// Subtrees still waiting on their textures.
    pub fn suspended_count(&self) -> usize {
        self.boundaries.len()
    }

    /// Runs the click handler of the entity behind `tag`, if it has one.
    pub fn click(&self, tag: u128, api: &mut impl BodyApi) -> bool {
        match usize::try_from(tag).ok().and_then(|index| self.entities.get(index)) {
            Some(Entity::Box(cuboid)) => {
                log::debug!("Box {} clicked", tag);
                cuboid.click(api);
                true
            }
            _ => false,
        }
    }

    /// Picks along the ray and clicks whatever was hit first.
    pub fn click_ray(
        &self,
        origin: nalgebra::Point3<f32>,
        dir: nalgebra::Vector3<f32>,
        physics: &mut Physics,
    ) -> bool {
        let max_distance = self.camera.clip.end;
        match physics.cast_ray(origin, dir, max_distance) {
            Some(hit) => self.click(hit.tag, physics),
            None => false,
        }
    }
}
