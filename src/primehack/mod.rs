//! Memory patches for the Metroid Prime games running in the emulator.

mod context_sensitive_controls;
mod hack_manager;

pub use context_sensitive_controls::*;
pub use hack_manager::HackManager;

use serde::{Deserialize, Serialize};

/// Title detected in the running disc.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Game {
    Prime1,
    Prime2,
    Prime3,
    /// Prime 3 outside of the Trilogy.
    Prime3Standalone,
    /// Trilogy menu.
    Menu,
    Unknown,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    NtscU,
    NtscJ,
    Pal,
}

/// Big-endian memory of the emulated console.
///
/// Addresses are virtual, reads from unmapped memory return zero.
pub trait GuestMemory {
    fn read_u16(&self, address: u32) -> u16;
    fn read_u32(&self, address: u32) -> u32;
    fn read_f32(&self, address: u32) -> f32;
    fn write_f32(&mut self, address: u32, value: f32);

    /// Replaces one instruction of the game code.
    fn write_code(&mut self, address: u32, value: u32);
}

/// Input queries used by the patches.
pub trait PatchInput {
    fn check_forward(&self) -> bool;
    fn check_back(&self) -> bool;
    fn check_left(&self) -> bool;
    fn check_right(&self) -> bool;

    fn improved_motion_controls(&self) -> bool;
    fn lock_camera_in_puzzles(&self) -> bool;

    /// Keeps the free-look camera still while a puzzle is being solved.
    fn set_camera_lock(&self, _locked: bool) {}
}
