//! Filter graph construction for jingle overlays.
//!
//! Input 0 is always the main track. Every placement gets its own input
//! (a `start-end` jingle is therefore opened twice), an optional volume
//! stage and a delay stage. All streams then meet in a single `amix`
//! with `duration=longest` and `dropout_transition=0`, so the main
//! track is never shortened or faded when a jingle ends.

use super::placement::Placement;
use crate::media::FilterGraph;
use std::path::PathBuf;

pub const MIX_OUTPUT_LABEL: &str = "mix";

fn is_unity_volume(volume: f32) -> bool {
    (volume - 1.0).abs() <= f32::EPSILON
}

fn placement_stage(input_index: usize, label: &str, placement: &Placement) -> String {
    let mut filters = Vec::with_capacity(2);
    if !is_unity_volume(placement.volume) {
        filters.push(format!("volume={:.3}", placement.volume));
    }
    filters.push(format!("adelay=delays={}:all=1", placement.offset_ms));

    format!("[{}:a]{}[{}]", input_index, filters.join(","), label)
}

/// Build the graph for `placements`, returning the extra inputs (after the
/// main track) in graph order.
pub fn build_filter_graph(placements: &[Placement]) -> (Vec<PathBuf>, FilterGraph) {
    let mut inputs = Vec::with_capacity(placements.len());
    let mut stages = Vec::with_capacity(placements.len() + 1);
    let mut mix_inputs = String::from("[0:a]");

    for (n, placement) in placements.iter().enumerate() {
        let label = format!("j{}", n);
        stages.push(placement_stage(n + 1, &label, placement));
        mix_inputs.push_str(&format!("[{}]", label));
        inputs.push(placement.jingle_path.clone());
    }

    stages.push(format!(
        "{}amix=inputs={}:duration=longest:dropout_transition=0:normalize=0[{}]",
        mix_inputs,
        placements.len() + 1,
        MIX_OUTPUT_LABEL
    ));

    (
        inputs,
        FilterGraph {
            description: stages.join(";"),
            output_label: MIX_OUTPUT_LABEL.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement(path: &str, volume: f32, offset_ms: u64) -> Placement {
        Placement {
            jingle_id: path.to_string(),
            jingle_path: PathBuf::from(path),
            volume,
            offset_ms,
            jingle_duration_ms: 8_000,
        }
    }

    #[test]
    fn test_single_placement_at_unity_volume_skips_volume_stage() {
        let (inputs, graph) = build_filter_graph(&[placement("/j/a.mp3", 1.0, 92_000)]);

        assert_eq!(inputs, vec![PathBuf::from("/j/a.mp3")]);
        assert_eq!(
            graph.description,
            "[1:a]adelay=delays=92000:all=1[j0];\
             [0:a][j0]amix=inputs=2:duration=longest:dropout_transition=0:normalize=0[mix]"
        );
        assert_eq!(graph.output_label, "mix");
        assert!(!graph.description.contains("volume="));
    }

    #[test]
    fn test_volume_stage_precedes_delay() {
        let (_, graph) = build_filter_graph(&[placement("/j/a.mp3", 0.5, 0)]);
        assert!(graph
            .description
            .starts_with("[1:a]volume=0.500,adelay=delays=0:all=1[j0]"));
    }

    #[test]
    fn test_each_placement_gets_its_own_input() {
        let placements = vec![
            placement("/j/a.mp3", 1.0, 0),
            placement("/j/a.mp3", 1.0, 50_000),
            placement("/j/b.mp3", 0.25, 20_000),
        ];
        let (inputs, graph) = build_filter_graph(&placements);

        assert_eq!(inputs.len(), 3);
        assert!(graph.description.contains("[2:a]adelay=delays=50000:all=1[j1]"));
        assert!(graph.description.contains("[3:a]volume=0.250,adelay=delays=20000:all=1[j2]"));
        assert!(graph
            .description
            .contains("[0:a][j0][j1][j2]amix=inputs=4:duration=longest:dropout_transition=0"));
    }
}
