use crate::{DEFAULT_FFT_SIZE, Effect, Endpoint, NodeSpec, Topology, eighth_note_secs};

const EPSILON: f32 = 1e-6;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

/// WHAT: No effect plays at original speed with unity gain
/// WHY: The baseline must be an untouched rendition of the clip
#[test]
fn given_none_effect_when_building_topology_then_unity_rate_and_gain() {
    // Given / When: Topology for the plain effect
    let topology = Topology::for_effect(Effect::None);

    // Then: Only the tap and output gain are present
    assert!(approx(topology.playback_rate, 1.0));
    assert!(approx(topology.output_gain(), 1.0));
    assert_eq!(topology.pitch_semitones(), None);
    assert!(topology.wet_mixes().is_empty());
    assert_eq!(topology.nodes.len(), 2);
}

/// WHAT: Chipmunk speeds up and shifts pitch up eight semitones
/// WHY: The character comes from both rate and pitch
#[test]
fn given_chipmunk_effect_when_building_topology_then_faster_and_higher() {
    // Given / When: Chipmunk topology
    let topology = Topology::for_effect(Effect::Chipmunk);

    // Then: Rate 1.3 and +8 semitones
    assert!(approx(topology.playback_rate, 1.3));
    assert_eq!(topology.pitch_semitones(), Some(8.0));
    assert!(approx(topology.output_gain(), 1.0));
}

/// WHAT: Monster slows down and shifts pitch down eight semitones
/// WHY: Mirror image of chipmunk
#[test]
fn given_monster_effect_when_building_topology_then_slower_and_lower() {
    // Given / When: Monster topology
    let topology = Topology::for_effect(Effect::Monster);

    // Then: Rate 0.8 and -8 semitones
    assert!(approx(topology.playback_rate, 0.8));
    assert_eq!(topology.pitch_semitones(), Some(-8.0));
    assert!(approx(topology.output_gain(), 1.0));
}

/// WHAT: Echo chains a feedback delay into a reverb with doubled output
/// WHY: The wet stages attenuate the signal, the output gain restores it
#[test]
fn given_echo_effect_when_building_topology_then_delay_reverb_and_gain_two() {
    // Given / When: Echo topology
    let topology = Topology::for_effect(Effect::Echo);

    // Then: Stage parameters match the echo voicing
    assert!(approx(topology.playback_rate, 1.0));
    assert_eq!(
        topology.nodes[0],
        NodeSpec::FeedbackDelay {
            delay_secs: 0.25,
            feedback: 0.5,
            wet: 0.4,
        }
    );
    assert_eq!(
        topology.nodes[1],
        NodeSpec::Reverb {
            decay_secs: 1.0,
            wet: 0.3,
        }
    );
    assert_eq!(topology.wet_mixes(), vec![0.4, 0.3]);
    assert!(approx(topology.output_gain(), 2.0));
}

/// WHAT: Every topology ends with the analysis tap then the output gain
/// WHY: Visualization must see the processed signal for every effect
#[test]
fn given_any_effect_when_building_topology_then_chain_ends_with_tap_and_gain() {
    for effect in Effect::ALL {
        // Given / When: Topology for the effect
        let topology = Topology::for_effect(effect);
        let n = topology.nodes.len();

        // Then: Tap then gain close the chain
        assert_eq!(
            topology.nodes[n - 2],
            NodeSpec::Analyser {
                fft_size: DEFAULT_FFT_SIZE
            }
        );
        assert!(matches!(topology.nodes[n - 1], NodeSpec::Gain { .. }));
        assert_eq!(topology.analyser_index(), Some(n - 2));
        assert_eq!(topology.effect, effect);

        // Then: Edges form one chain from source to output
        assert_eq!(topology.edges.len(), n + 1);
        assert_eq!(topology.edges[0], (Endpoint::Source, Endpoint::Node(0)));
        assert_eq!(topology.edges[n], (Endpoint::Node(n - 1), Endpoint::Output));
        for (i, edge) in topology.edges[1..n].iter().enumerate() {
            assert_eq!(*edge, (Endpoint::Node(i), Endpoint::Node(i + 1)));
        }
    }
}

/// WHAT: Topology construction is deterministic
/// WHY: The mapping is a pure function of the effect
#[test]
fn given_same_effect_when_building_twice_then_identical_topologies() {
    for effect in Effect::ALL {
        assert_eq!(Topology::for_effect(effect), Topology::for_effect(effect));
    }
}

/// WHAT: Eighth note at 120 BPM is a quarter second
/// WHY: The echo delay is tempo-relative
#[test]
fn given_120_bpm_when_computing_eighth_note_then_quarter_second() {
    assert!(approx(eighth_note_secs(120.0), 0.25));
    assert!(approx(eighth_note_secs(60.0), 0.5));
}

/// WHAT: Effect names parse case-insensitively and display lowercase
/// WHY: Command input and config files use the lowercase names
#[test]
#[allow(clippy::unwrap_used)]
fn given_effect_names_when_parsing_then_matching_effect() {
    assert_eq!("none".parse::<Effect>().unwrap(), Effect::None);
    assert_eq!("Chipmunk".parse::<Effect>().unwrap(), Effect::Chipmunk);
    assert_eq!(" MONSTER ".parse::<Effect>().unwrap(), Effect::Monster);
    assert_eq!("echo".parse::<Effect>().unwrap(), Effect::Echo);

    for effect in Effect::ALL {
        assert_eq!(effect.to_string().parse::<Effect>().unwrap(), effect);
    }
}

/// WHAT: Unknown effect names are rejected with the offending input
/// WHY: Typos must be reported, not silently mapped to no effect
#[test]
#[allow(clippy::unwrap_used)]
fn given_unknown_name_when_parsing_then_error_mentions_input() {
    // When: Parsing an unknown name
    let result = "robot".parse::<Effect>();

    // Then: Error names the input
    let err = result.unwrap_err();
    assert!(err.to_string().contains("robot"));
}

/// WHAT: Default effect is none
/// WHY: Playback without a choice must be unprocessed
#[test]
fn given_no_choice_when_defaulting_then_none() {
    assert_eq!(Effect::default(), Effect::None);
}
