mod images;
mod tmx;

pub use images::{load_image_rgba, ImageLoadError, LoadedImage};
pub use tmx::{load_tmx, parse_tmx, MapData, SourceLocation, TmxError};
