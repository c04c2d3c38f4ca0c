mod assets;
mod compositions;
mod health;
mod render;
mod renders;
mod uploads;

pub use assets::list_assets;
pub use compositions::list_compositions;
pub use health::health;
pub use render::{render_still, render_video};
pub use renders::{delete_render, list_renders, serve_render};
pub use uploads::upload_image;
