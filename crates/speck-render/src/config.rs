use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::render_mode::RenderMode;

#[derive(Clone, Debug, Parser, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RenderConfig {
    /// Multiplier applied to every splat scale.
    #[arg(long, help_heading = "Render options", default_value = "1.0")]
    pub splat_scale: f32,

    /// Multiplier applied to every splat opacity.
    #[arg(long, help_heading = "Render options", default_value = "1.0")]
    pub opacity_scale: f32,

    /// Highest spherical harmonics order to evaluate, 0 to 3.
    #[arg(long, help_heading = "Render options", default_value = "3")]
    pub sh_order: u32,

    /// Only show the view dependent part of the color.
    #[arg(long, help_heading = "Render options", default_value = "false")]
    pub sh_only: bool,

    /// Sort splats every this many frames. 1 sorts every frame.
    #[arg(long, help_heading = "Render options", default_value = "1")]
    pub sort_every_n_frames: u32,

    #[arg(long, help_heading = "Render options", default_value = "splats")]
    pub render_mode: RenderMode,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::parse_from([""])
    }
}
