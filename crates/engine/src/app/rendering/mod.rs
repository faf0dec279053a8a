mod renderer;

pub use renderer::{RenderAssets, Renderer};
