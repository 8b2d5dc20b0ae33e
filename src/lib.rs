// Library exports for socialgen

pub mod error;
pub mod parser;
pub mod request;
pub mod config;

// Compositing
pub mod thumbnail;
pub mod text;
pub mod canvas;
pub mod renderer;

// Session exports and templated batches
pub mod data;
pub mod preprocessor;
pub mod batch;

pub use config::{load_config, Config};
pub use error::{Result, SocialImageError};
pub use renderer::Renderer;
pub use request::{
    Elements, FontSpec, HorizontalAnchor, ImageElement, ImageRequest, Point, Position, Rgb, Size,
    TextElement,
};
