mod projection;
mod renderer;
pub mod style;

pub use projection::{relative_lon, robinson, unwrap_ring, Viewport};
pub use renderer::{register_fonts, MapRenderer};
