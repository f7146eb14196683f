//! Render pipelines for quad batches.
//!
//! Two program variants exist: `Textured` samples the batch texture and
//! multiplies it with the vertex colour, `Flat` draws the vertex colour only.
//! Both read the same interleaved [`QuadVertex`](crate::data_structures::quad::QuadVertex)
//! buffer; the flat variant simply does not bind the texture coordinate.

pub mod quad;

use crate::render::{ProgramInfo, ProgramVariant};

pub const POSITION_LOCATION: u32 = 0;
pub const TEX_COORDS_LOCATION: u32 = 1;
pub const COLOR_LOCATION: u32 = 2;

/// Attribute locations of the program for `variant`.
pub fn program_info(variant: ProgramVariant) -> ProgramInfo {
    ProgramInfo {
        variant,
        position: POSITION_LOCATION,
        tex_coords: match variant {
            ProgramVariant::Textured => Some(TEX_COORDS_LOCATION),
            ProgramVariant::Flat => None,
        },
        color: COLOR_LOCATION,
    }
}
