mod mjpeg_broadcaster;
mod mjpeg_page;
mod mjpeg_client;
mod objects;
mod snapshots;
mod mutations;
mod toml_mutations;
mod rest_api;
mod services;

pub use self::{mjpeg_broadcaster::Broadcaster, rest_api::*, services::*};
