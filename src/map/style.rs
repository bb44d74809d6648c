use crate::period::Period;
use crate::trade::{Bloc, ConfidenceBucket};

/// Central meridian of the world map
pub const CENTRAL_LONGITUDE: f64 = 10.0;

pub const LEGEND_TITLE: &str = "WHO IS THE LARGER TRADING PARTNER? (Percentage Share of the Three)";

/// Blocs in legend order
pub const LEGEND_BLOCS: [Bloc; 3] = [Bloc::Eu, Bloc::China, Bloc::Us];

/// Swatch opacities shown next to each legend entry
pub const LEGEND_ALPHAS: [f64; 4] = [0.2, 0.5, 0.7, 1.0];

/// Blocs in fill order; later fills paint over earlier ones where outlines overlap
pub const FILL_ORDER: [Bloc; 3] = [Bloc::China, Bloc::Us, Bloc::Eu];

/// Fill colour of each bloc as RGB
pub fn bloc_rgb(bloc: Bloc) -> (u8, u8, u8) {
    match bloc {
        Bloc::Eu => (0xFF, 0xD7, 0x00),
        Bloc::China => (0xFF, 0x00, 0x00),
        Bloc::Us => (0x00, 0x00, 0xFF),
    }
}

/// Fill opacity of each confidence bucket
pub fn bucket_alpha(bucket: ConfidenceBucket) -> f64 {
    match bucket.level() {
        1 => 0.3,
        2 => 0.5,
        3 => 0.7,
        _ => 1.0,
    }
}

pub fn map_title(period: Period) -> String {
    format!("Top Import Source by Country ({period})")
}
