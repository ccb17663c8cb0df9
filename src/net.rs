//! Network side of the subsystem: fetching a scene descriptor over HTTP.

mod fetch;
mod response;
mod scene;

pub use fetch::fetch;
pub use response::Response;
pub use scene::{decode_scene, HttpSceneLoader};
