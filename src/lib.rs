pub mod camera;
pub mod config;
pub mod instances;
pub mod loader;
pub mod model;
pub mod palette;
pub mod physics;
pub mod render;
pub mod scene;
pub mod texture;

pub use camera::Camera;
pub use config::Config;
pub use loader::Loader;
pub use physics::Physics;
pub use render::Frame;
pub use scene::Scene;
