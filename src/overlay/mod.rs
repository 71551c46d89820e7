//! Overlay compositor: positional jingle mixing on top of a main track.

mod compositor;
mod filter_graph;
mod placement;

pub use compositor::{MixError, MixFailurePolicy, MixOutcome, OverlayCompositor};
pub use filter_graph::{build_filter_graph, MIX_OUTPUT_LABEL};
pub use placement::{
    expand_placements, expected_mix_duration_ms, placement_offsets_ms, seconds_to_ms,
    JinglePosition, MixEntry, MixSpec, Placement,
};
