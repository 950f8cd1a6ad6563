use glam::{Quat, Vec3};
use log::{debug, info};
use smallvec::SmallVec;
use std::f32::consts::FRAC_PI_4;

use crate::game::note::Lane;

pub const GROUP_COUNT: usize = 8;

// Lane geometry, in highway units.
pub const HIGHWAY_SCALE_X: f32 = 1.05;
pub const RAIL_SCALE_X: f32 = 0.2125;
pub const RAIL_OFFSET: f32 = RAIL_SCALE_X / 2.0 / std::f32::consts::SQRT_2;
// One ring face: a highway plus the rail on its seam.
const SEGMENT_WIDTH: f32 = HIGHWAY_SCALE_X + RAIL_SCALE_X;
const TAN_EIGHTH_PI: f32 = 0.414_213_57;
// Distance from the ring axis to each face of the octagon.
pub const RING_APOTHEM: f32 = SEGMENT_WIDTH / (2.0 * TAN_EIGHTH_PI);
pub const OFF_SCREEN_DISTANCE: f32 = 100.0;

pub const MAIN_LANE_OPACITY: f32 = 1.0;
pub const SIDE_LANE_OPACITY: f32 = 0.4;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Main,
    LeftAdjacent,
    RightAdjacent,
    LeftOnDeck,
    RightOnDeck,
    Hidden,
}

/// Ring offset of `slot` relative to the main slot, folded into `-3..=4`.
/// Positive offsets are to the left.
#[inline(always)]
pub const fn signed_offset(slot: usize, current: usize) -> i32 {
    let d = (slot % GROUP_COUNT + GROUP_COUNT - current % GROUP_COUNT) % GROUP_COUNT;
    if d > GROUP_COUNT / 2 {
        d as i32 - GROUP_COUNT as i32
    } else {
        d as i32
    }
}

#[inline(always)]
pub const fn role_of(slot: usize, current: usize) -> Role {
    role_for_offset(signed_offset(slot, current))
}

#[inline(always)]
const fn role_for_offset(offset: i32) -> Role {
    match offset {
        0 => Role::Main,
        1 => Role::LeftAdjacent,
        -1 => Role::RightAdjacent,
        2 => Role::LeftOnDeck,
        -2 => Role::RightOnDeck,
        _ => Role::Hidden,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShiftDirection {
    // Brings the left neighbour into the middle.
    GoLeft,
    GoRight,
}

impl ShiftDirection {
    #[inline(always)]
    pub const fn from_rail(lane: Lane) -> Option<Self> {
        match lane {
            Lane::RailLeft => Some(Self::GoLeft),
            Lane::RailRight => Some(Self::GoRight),
            _ => None,
        }
    }

    #[inline(always)]
    pub const fn step(self) -> usize {
        match self {
            Self::GoLeft => 1,
            Self::GoRight => GROUP_COUNT - 1,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Pose {
    pub const OFF_SCREEN: Self = Self {
        position: Vec3::new(0.0, -OFF_SCREEN_DISTANCE, 0.0),
        orientation: Quat::IDENTITY,
    };

    /// Linear position, spherical orientation.
    #[inline(always)]
    pub fn interpolate(self, end: Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(end.position, t),
            orientation: self.orientation.slerp(end.orientation, t),
        }
    }

    pub fn abs_diff_eq(self, other: Self, max_abs_diff: f32) -> bool {
        self.position.abs_diff_eq(other.position, max_abs_diff)
            && (self.orientation.abs_diff_eq(other.orientation, max_abs_diff)
                || self.orientation.abs_diff_eq(-other.orientation, max_abs_diff))
    }
}

/// Pose of the face `offset` steps around the ring from the middle face.
pub fn ring_pose(offset: i32) -> Pose {
    let orientation = Quat::from_rotation_z(-(offset as f32) * FRAC_PI_4);
    let axis = Vec3::new(0.0, RING_APOTHEM, 0.0);
    Pose {
        position: axis + orientation * -axis,
        orientation,
    }
}

pub fn body_pose(role: Role) -> Pose {
    match role {
        Role::Main => ring_pose(0),
        Role::LeftAdjacent => ring_pose(1),
        Role::RightAdjacent => ring_pose(-1),
        Role::LeftOnDeck => ring_pose(2),
        Role::RightOnDeck => ring_pose(-2),
        Role::Hidden => Pose::OFF_SCREEN,
    }
}

/// The main group's rail is tilted toward the player; every other group's
/// rail lies flat along its seam.
pub fn rail_pose(is_main: bool) -> Pose {
    if is_main {
        Pose {
            position: Vec3::new(-(HIGHWAY_SCALE_X / 2.0 + RAIL_OFFSET), RAIL_OFFSET, 0.0),
            orientation: Quat::from_rotation_z(-FRAC_PI_4),
        }
    } else {
        Pose {
            position: Vec3::new(-(HIGHWAY_SCALE_X / 2.0 + RAIL_SCALE_X / 2.0), 0.0, 0.0),
            orientation: Quat::IDENTITY,
        }
    }
}

/// Presentation state of one ring slot.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SlotPose {
    pub body: Pose,
    pub rail: Pose,
    pub highway_opacity: f32,
    pub visible: bool,
}

impl SlotPose {
    fn settled(offset: i32) -> Self {
        let role = role_for_offset(offset);
        Self {
            body: body_pose(role),
            rail: rail_pose(offset == 0),
            highway_opacity: if offset == 0 {
                MAIN_LANE_OPACITY
            } else {
                SIDE_LANE_OPACITY
            },
            visible: offset.abs() <= 1,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PosePart {
    Body,
    Rail,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AnimationTarget {
    pub slot: usize,
    pub part: PosePart,
    pub start: Pose,
    pub end: Pose,
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct OpacityRamp {
    slot: usize,
    start: f32,
    end: f32,
}

#[derive(Clone, Debug)]
struct Animation {
    direction: ShiftDirection,
    started_at: f32,
    targets: SmallVec<[AnimationTarget; 6]>,
    ramps: [OpacityRamp; 2],
}

#[derive(Clone, Debug)]
enum RotationState {
    Idle,
    Animating(Animation),
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RotationStart {
    pub direction: ShiftDirection,
    pub previous_group: usize,
    pub current_group: usize,
}

/// Eight-slot ring of chart segments. Roles are never stored per slot; they
/// follow from each slot's offset to `current`.
#[derive(Clone, Debug)]
pub struct RotationStateMachine {
    current: usize,
    duration: f32,
    poses: [SlotPose; GROUP_COUNT],
    state: RotationState,
}

impl RotationStateMachine {
    pub fn new(duration: f32) -> Self {
        Self {
            current: 0,
            duration,
            poses: std::array::from_fn(|slot| SlotPose::settled(signed_offset(slot, 0))),
            state: RotationState::Idle,
        }
    }

    #[inline(always)]
    pub fn current_group(&self) -> usize {
        self.current
    }

    #[inline(always)]
    pub fn is_animating(&self) -> bool {
        matches!(self.state, RotationState::Animating(_))
    }

    #[inline(always)]
    pub fn role(&self, slot: usize) -> Role {
        role_of(slot, self.current)
    }

    /// Slot `offset` steps from main (positive = left).
    #[inline(always)]
    pub fn slot_at(&self, offset: i32) -> usize {
        (self.current as i32 + offset).rem_euclid(GROUP_COUNT as i32) as usize
    }

    #[inline(always)]
    pub fn poses(&self) -> &[SlotPose; GROUP_COUNT] {
        &self.poses
    }

    pub fn targets(&self) -> &[AnimationTarget] {
        match &self.state {
            RotationState::Idle => &[],
            RotationState::Animating(anim) => &anim.targets,
        }
    }

    /// Starts a shift at `now`. Returns `None` and leaves everything untouched
    /// while a previous shift is still animating.
    pub fn begin(&mut self, direction: ShiftDirection, now: f32) -> Option<RotationStart> {
        if self.is_animating() {
            debug!("Ignoring {direction:?} shift at {now:.3}s: rotation already in flight.");
            return None;
        }
        let previous = self.current;
        self.current = (previous + direction.step()) % GROUP_COUNT;

        let mut targets: SmallVec<[AnimationTarget; 6]> = SmallVec::new();
        let mut ramps = [OpacityRamp {
            slot: 0,
            start: 0.0,
            end: 0.0,
        }; 2];
        for slot in 0..GROUP_COUNT {
            let old = signed_offset(slot, previous);
            let new = signed_offset(slot, self.current);
            let pose = &mut self.poses[slot];
            match (old.abs() <= 2, new.abs() <= 2) {
                (true, true) => targets.push(AnimationTarget {
                    slot,
                    part: PosePart::Body,
                    start: ring_pose(old),
                    end: ring_pose(new),
                }),
                // Leaving the on-deck position: no interpolation.
                (true, false) => {
                    pose.body = Pose::OFF_SCREEN;
                    pose.visible = false;
                }
                // Entering on-deck: parked at its pose, shown once it turns adjacent.
                (false, true) => pose.body = ring_pose(new),
                (false, false) => {}
            }
            if new.abs() <= 1 {
                pose.visible = true;
            }
            if old == 0 || new == 0 {
                targets.push(AnimationTarget {
                    slot,
                    part: PosePart::Rail,
                    start: rail_pose(old == 0),
                    end: rail_pose(new == 0),
                });
            }
            if new == 0 {
                ramps[0] = OpacityRamp {
                    slot,
                    start: SIDE_LANE_OPACITY,
                    end: MAIN_LANE_OPACITY,
                };
            } else if old == 0 {
                ramps[1] = OpacityRamp {
                    slot,
                    start: MAIN_LANE_OPACITY,
                    end: SIDE_LANE_OPACITY,
                };
            }
        }

        info!(
            "Rotation {direction:?} at {now:.3}s: group {previous} -> {} ({} targets).",
            self.current,
            targets.len()
        );
        self.state = RotationState::Animating(Animation {
            direction,
            started_at: now,
            targets,
            ramps,
        });
        Some(RotationStart {
            direction,
            previous_group: previous,
            current_group: self.current,
        })
    }

    /// Advances the in-flight animation to `now`. Returns the direction of
    /// the shift when it completes on this tick.
    pub fn tick(&mut self, now: f32) -> Option<ShiftDirection> {
        let RotationState::Animating(anim) = &self.state else {
            return None;
        };
        let t = ((now - anim.started_at) / self.duration).clamp(0.0, 1.0);
        if t < 1.0 {
            for target in &anim.targets {
                let pose = anim_pose(&mut self.poses[target.slot], target.part);
                *pose = target.start.interpolate(target.end, t);
            }
            for ramp in &anim.ramps {
                self.poses[ramp.slot].highway_opacity = ramp.start + (ramp.end - ramp.start) * t;
            }
            return None;
        }

        // Snap exactly to the end poses so no interpolation residue remains.
        for target in &anim.targets {
            *anim_pose(&mut self.poses[target.slot], target.part) = target.end;
        }
        let direction = anim.direction;
        for (slot, pose) in self.poses.iter_mut().enumerate() {
            let offset = signed_offset(slot, self.current);
            if offset.abs() > 1 {
                pose.visible = false;
            }
            pose.highway_opacity = if offset == 0 {
                MAIN_LANE_OPACITY
            } else {
                SIDE_LANE_OPACITY
            };
        }
        self.state = RotationState::Idle;
        debug!("Rotation {direction:?} settled on group {}.", self.current);
        Some(direction)
    }
}

#[inline(always)]
fn anim_pose(slot: &mut SlotPose, part: PosePart) -> &mut Pose {
    match part {
        PosePart::Body => &mut slot.body,
        PosePart::Rail => &mut slot.rail,
    }
}
