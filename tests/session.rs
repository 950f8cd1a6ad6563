use joyride::app::{self, RunOptions};
use joyride::config::{Config, TimingConfig};
use joyride::game::chart::{self, ChartError};
use joyride::game::gameplay::{GameEvent, Segment, Session};
use joyride::game::judgment::Tier;
use joyride::game::note::{LANE_COUNT, Lane, Note};
use joyride::game::rotation::{GROUP_COUNT, Role, ShiftDirection};
use joyride::game::table::ChartTable;

fn timing() -> TimingConfig {
    TimingConfig {
        global_start_offset: 0.0,
        ..TimingConfig::default()
    }
}

fn session(group_notes: impl Fn(usize) -> Vec<Note>) -> Session {
    let t = timing();
    let segments: [Segment; GROUP_COUNT] = std::array::from_fn(|group_id| Segment {
        group_id,
        table: ChartTable::build(group_notes(group_id), LANE_COUNT, 10.0, &t)
            .expect("sorted test chart"),
        multiplier: 1.0,
    });
    Session::from_segments(t, segments)
}

fn single_note() -> Session {
    session(|g| if g == 0 { vec![Note::new(2.0, Lane::NearLeft)] } else { Vec::new() })
}

fn main_slots(session: &Session) -> usize {
    (0..GROUP_COUNT)
        .filter(|&slot| session.rotation().role(slot) == Role::Main)
        .count()
}

#[test]
fn early_close_tap_is_perfect() {
    let mut s = single_note();
    let hit = s.handle_tap(2.01, Lane::NearLeft.index()).expect("note judged");
    assert_eq!(hit.tier, Tier::Perfect);
    assert_eq!(s.score().combo, 1);
}

#[test]
fn late_tap_inside_ok_window_is_ok() {
    let mut s = single_note();
    let hit = s.handle_tap(2.09, Lane::NearLeft.index()).expect("note judged");
    assert_eq!(hit.tier, Tier::Ok);
    assert_eq!(s.score().combo, 1);
}

#[test]
fn untapped_note_is_swept_as_miss() {
    let mut s = single_note();
    s.handle_tap(1.0, Lane::FarLeft.index());
    s.update(2.2);
    assert_eq!(s.score().combo, 0);
    let note = s.segment(0).expect("group 0").table.notes()[0];
    assert!(note.missed);
    assert!(!note.has_hit);
}

#[test]
fn miss_breaks_an_existing_combo() {
    let mut s = session(|g| {
        if g == 0 {
            vec![Note::new(1.0, Lane::FarLeft), Note::new(2.0, Lane::FarRight)]
        } else {
            Vec::new()
        }
    });
    s.handle_tap(1.0, Lane::FarLeft.index()).expect("first note");
    assert_eq!(s.score().combo, 1);
    s.update(2.2);
    let state = s.score();
    assert_eq!(state.combo, 0);
    assert_eq!(state.highest_combo, 1);
    assert!(state.score > 0.0);
}

fn rail_session() -> Session {
    session(|g| match g {
        0 => vec![Note::new(1.0, Lane::RailLeft), Note::new(1.2, Lane::RailLeft)],
        _ => Vec::new(),
    })
}

#[test]
fn left_rail_hit_rotates_to_group_one() {
    let mut s = rail_session();
    let hit = s.handle_tap(1.0, Lane::RailLeft.index()).expect("rail judged");
    let start = hit.rotation.expect("rotation began");
    assert_eq!(start.direction, ShiftDirection::GoLeft);
    assert_eq!(s.current_group(), 1);

    let duration = s.timing().rotation_duration;
    let mut now = 1.0;
    while now < 1.0 + duration + 0.05 {
        now += 1.0 / 60.0;
        s.update(now);
    }
    assert_eq!(s.current_group(), 1);
    assert_eq!(main_slots(&s), 1);
    assert!(!s.rotation().is_animating());
    assert!(s.rotation().targets().is_empty());
    assert!(
        s.drain_events()
            .any(|e| matches!(e, GameEvent::RotationFinished { current_group: 1, .. }))
    );
}

#[test]
fn rail_hit_during_rotation_changes_nothing() {
    let mut s = rail_session();
    s.handle_tap(1.0, Lane::RailLeft.index()).expect("first rail");
    s.update(1.1);
    let targets_before = s.rotation().targets().to_vec();
    assert!(!targets_before.is_empty());

    // The second rail now sits in group 0, which is the right neighbour.
    let second = s.handle_tap(1.2, Lane::RailRight.index());
    assert!(second.is_some_and(|hit| hit.rotation.is_none()));
    assert_eq!(s.current_group(), 1);
    assert_eq!(s.rotation().targets(), targets_before.as_slice());
}

#[test]
fn right_rail_claims_the_neighbours_left_rail() {
    let mut s = session(|g| match g {
        7 => vec![Note::new(1.0, Lane::RailLeft)],
        _ => Vec::new(),
    });
    let hit = s.handle_tap(1.0, Lane::RailRight.index()).expect("mirrored rail");
    assert_eq!(hit.group, 7);
    assert_eq!(s.current_group(), 7);
}

#[test]
fn ground_taps_never_reach_other_groups() {
    let mut s = session(|g| match g {
        1 => vec![Note::new(2.0, Lane::NearLeft)],
        _ => Vec::new(),
    });
    assert!(s.handle_tap(2.0, Lane::NearLeft.index()).is_none());
    s.update(3.0);
    assert_eq!(s.score().combo, 0);
    assert!(!s.segment(1).expect("group 1").table.notes()[0].missed);
}

#[test]
fn empty_chart_never_judges_a_tap() {
    let mut s = session(|_| Vec::new());
    for elapsed in [-1.0, 0.0, 0.5, 2.0, 9.99, 10.0, 50.0, f32::NAN] {
        for lane_index in 0..=LANE_COUNT {
            assert!(s.handle_tap(elapsed, lane_index).is_none(), "lane {lane_index} at {elapsed}");
        }
        s.update(elapsed.max(0.0));
    }
    let state = s.score();
    assert_eq!((state.score, state.combo, state.highest_combo), (0.0, 0, 0));
    assert_eq!(s.current_group(), 0);
}

#[test]
fn unsorted_chart_file_is_rejected() {
    let entries = chart::parse_json(
        r#"[{"time":1.0,"lane":"far_left"},{"time":3.0,"lane":"near_left"},{"time":2.0,"lane":"far_right"}]"#,
    )
    .expect("valid chart json");
    let err = Session::new(&Config::default(), &entries).err().expect("unsorted chart fails");
    assert!(matches!(err, ChartError::Unsorted { index: 2, .. }), "got {err:?}");
}

#[test]
fn chart_too_long_for_the_table_is_rejected() {
    let entries = chart::parse_json(r#"[{"time":1e12,"lane":"far_left"}]"#).expect("valid chart json");
    let err = Session::new(&Config::default(), &entries).err().expect("oversized chart fails");
    assert!(matches!(err, ChartError::TooLong { .. }), "got {err:?}");
}

#[test]
fn autoplay_finishes_the_demo_chart() {
    let config = Config::default();
    let mut s = Session::new(&config, &chart::demo_chart()).expect("demo chart compiles");
    let summary = app::run(
        &mut s,
        &RunOptions {
            jitter_s: 0.0,
            accuracy: 1.0,
            seed: 7,
            ..RunOptions::default()
        },
    );
    assert!(summary.hits > 0);
    assert!(summary.rotations > 0);
    assert!(summary.score.score > 0.0);
    assert!(summary.score.highest_combo > 0);
}
