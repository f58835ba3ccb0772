use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::{debug, info, trace};

use super::{Game, GuestMemory, PatchInput, Region};

/// Safety bound for walking a list that lives in untrusted guest memory.
pub const MAX_OBJECT_LIST_NODES: usize = 1024;

const OBJECT_LIST_END: u16 = 0xFFFF;
const OBJECT_LIST_OFFSET: u32 = 0x1018;
const OBJECT_LIST_NODE_SIZE: u32 = 8;
const NODE_NEXT_OFFSET: u32 = 6;

const ENTITY_FLAGS_OFFSET: u32 = 0x38;
const ENTITY_ID_OFFSET: u32 = 0x0C;
const ACCEPT_VTABLE_SLOT: u32 = 0x0C;
const FLAG_ACTIVE: u32 = 0x2000_0000;
const FLAG_DISABLED: u32 = 0x2000;
const FLAG_FORCE_PROCESS: u32 = 0x1000;

const PUZZLE_STATE_OFFSET: u32 = 0x14C;
const PUZZLE_STEP_OFFSET: u32 = 0x154;
const PUZZLE_STATE_CONTROLLED: u32 = 3;
/// The ship radio at the start of the game is a motion puzzle too, but must not lock the camera.
const SHIP_RADIO_ID: u32 = 0x0C18_0263;

const ROTARY_STATE_OFFSET: u32 = 0x204;
const ROTARY_STATE_CONTROLLED: u32 = 1;

// lis r12, 0x8000
// ori r12, r12, 0x4170
// lfs f1, 0(r12)
const ROTARY_PATCH: [u32; 3] = [0x3D80_8000, 0x618C_4170, 0xC02C_0000];
const ROTARY_VELOCITY_ADDRESS: u32 = 0x8000_4170;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeChange {
    pub address: u32,
    pub value: u32,
}

/// Addresses and tuning of one game release.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlsProfile {
    /// Makes the rotary puzzles read their velocity from `rotary_velocity_address`.
    pub code_changes: Vec<CodeChange>,
    pub player_pointer: u32,
    /// Subtracted from `player_pointer` before dereferencing it.
    pub pointer_adjust: u32,
    /// Accept function of motion puzzle objects.
    pub motion_vtf: u32,
    /// Distance from `motion_vtf` to the accept function of rotary objects.
    pub rotary_vtf_offset: u32,
    pub rotary_velocity_address: u32,
    pub puzzle_step: f32,
    pub rotary_speed: f32,
}

impl ControlsProfile {
    fn new(code_addresses: [u32; 3], player_pointer: u32, pointer_adjust: u32, motion_vtf: u32) -> Self {
        Self {
            code_changes: code_addresses
                .iter()
                .zip(ROTARY_PATCH)
                .map(|(&address, value)| CodeChange { address, value })
                .collect(),
            player_pointer,
            pointer_adjust,
            motion_vtf,
            rotary_vtf_offset: 0x38,
            rotary_velocity_address: ROTARY_VELOCITY_ADDRESS,
            puzzle_step: 0.05,
            rotary_speed: 0.04,
        }
    }

    #[must_use]
    pub const fn rotary_vtf(&self) -> u32 {
        self.motion_vtf.wrapping_add(self.rotary_vtf_offset)
    }
}

static PROFILES: Lazy<HashMap<(Game, Region), ControlsProfile>> = Lazy::new(|| {
    HashMap::from([
        (
            (Game::Prime3, Region::NtscU),
            ControlsProfile::new([0x801F_806C, 0x801F_8074, 0x801F_807C], 0x805C_6C6C, 4, 0x802E_0DAC),
        ),
        (
            (Game::Prime3, Region::Pal),
            ControlsProfile::new([0x801F_7B4C, 0x801F_7B54, 0x801F_7B5C], 0x805C_A0EC, 4, 0x802E_0A88),
        ),
        (
            (Game::Prime3Standalone, Region::NtscU),
            ControlsProfile::new([0x801F_B544, 0x801F_B54C, 0x801F_B554], 0x805C_4F98, 0, 0x802E_2508),
        ),
        (
            (Game::Prime3Standalone, Region::Pal),
            ControlsProfile::new([0x801F_C5A8, 0x801F_C5B0, 0x801F_C5B8], 0x805C_759C, 4, 0x802E_3BE4),
        ),
    ])
});

/// Profile of a supported release, `None` for everything else.
#[must_use]
pub fn profile_for(game: Game, region: Region) -> Option<&'static ControlsProfile> {
    PROFILES.get(&(game, region))
}

/// Outcome of one pass over the object list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub nodes_visited: usize,
    pub puzzles_stepped: usize,
    pub rotaries_driven: usize,
    pub camera_locked: bool,
}

/// Lets the movement stick solve the Prime 3 motion and rotary puzzles.
///
/// `init_mod` runs once per boot, `run_mod` once per emulated frame.
#[derive(Debug, Default)]
pub struct ContextSensitiveControls {
    profile: Option<&'static ControlsProfile>,
    initialized: bool,
    camera_locked: bool,
}

impl ContextSensitiveControls {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[must_use]
    pub const fn profile(&self) -> Option<&'static ControlsProfile> {
        self.profile
    }

    #[must_use]
    pub const fn camera_locked(&self) -> bool {
        self.camera_locked
    }

    /// Applies the code patches of the release. Later calls do nothing.
    ///
    /// Returns whether the release is supported.
    pub fn init_mod(&mut self, game: Game, region: Region, memory: &mut dyn GuestMemory) -> bool {
        if self.initialized {
            return self.profile.is_some();
        }
        self.initialized = true;
        self.profile = profile_for(game, region);

        let Some(profile) = self.profile else {
            debug!(?game, ?region, "context sensitive controls unavailable");
            return false;
        };
        for change in &profile.code_changes {
            memory.write_code(change.address, change.value);
        }
        info!(?game, ?region, "context sensitive controls enabled");
        true
    }

    fn set_camera_lock(&mut self, input: &dyn PatchInput, locked: bool) {
        self.camera_locked = locked;
        input.set_camera_lock(locked);
    }

    /// Walks the object list once, driving the puzzles the player is using.
    pub fn run_mod(&mut self, game: Game, memory: &mut dyn GuestMemory, input: &dyn PatchInput) -> ScanStats {
        let mut stats = ScanStats::default();
        // Cleared before the game check so leaving mid-puzzle unlocks the camera.
        self.set_camera_lock(input, false);

        if !matches!(game, Game::Prime3 | Game::Prime3Standalone) {
            return stats;
        }
        let Some(profile) = self.profile else {
            return stats;
        };

        let player = memory.read_u32(profile.player_pointer.wrapping_sub(profile.pointer_adjust));
        let base = memory
            .read_u32(player.wrapping_add(OBJECT_LIST_OFFSET))
            .wrapping_add(4);
        let mut node = base;

        while stats.nodes_visited < MAX_OBJECT_LIST_NODES {
            stats.nodes_visited += 1;
            let entity = memory.read_u32(node);
            if should_process(memory.read_u32(entity.wrapping_add(ENTITY_FLAGS_OFFSET))) {
                self.process_entity(profile, entity, memory, input, &mut stats);
            }

            let next = memory.read_u16(node.wrapping_add(NODE_NEXT_OFFSET));
            if next == OBJECT_LIST_END {
                break;
            }
            node = base.wrapping_add(u32::from(next) * OBJECT_LIST_NODE_SIZE);
        }

        if stats.nodes_visited == MAX_OBJECT_LIST_NODES {
            trace!("object list walk hit the node limit");
        }
        stats.camera_locked = self.camera_locked;
        stats
    }

    fn process_entity(
        &mut self,
        profile: &ControlsProfile,
        entity: u32,
        memory: &mut dyn GuestMemory,
        input: &dyn PatchInput,
        stats: &mut ScanStats,
    ) {
        let vtable = memory.read_u32(entity);
        let accept = memory.read_u32(vtable.wrapping_add(ACCEPT_VTABLE_SLOT));

        if accept == profile.motion_vtf {
            let state = memory.read_u32(entity.wrapping_add(PUZZLE_STATE_OFFSET));

            if input.improved_motion_controls() && state == PUZZLE_STATE_CONTROLLED {
                let address = entity.wrapping_add(PUZZLE_STEP_OFFSET);
                let mut step = memory.read_f32(address);
                if input.check_forward() {
                    step += profile.puzzle_step;
                }
                if input.check_back() {
                    step -= profile.puzzle_step;
                }
                memory.write_f32(address, step.clamp(0.0, 1.0));
                stats.puzzles_stepped += 1;
            }

            if input.lock_camera_in_puzzles()
                && state > 0
                && memory.read_u32(entity.wrapping_add(ENTITY_ID_OFFSET)) != SHIP_RADIO_ID
            {
                self.set_camera_lock(input, true);
            }
        } else if accept == profile.rotary_vtf()
            && memory.read_u32(entity.wrapping_add(ROTARY_STATE_OFFSET)) == ROTARY_STATE_CONTROLLED
        {
            let mut velocity = 0.0;
            if input.check_right() {
                velocity = profile.rotary_speed;
            }
            if input.check_left() {
                velocity -= profile.rotary_speed;
            }
            memory.write_f32(profile.rotary_velocity_address, velocity);
            stats.rotaries_driven += 1;
        }
    }
}

fn should_process(flags: u32) -> bool {
    let flags_high = flags >> 8;
    let active = flags & FLAG_ACTIVE != 0 && flags_high & FLAG_DISABLED == 0;
    active || flags_high & FLAG_FORCE_PROCESS != 0
}
