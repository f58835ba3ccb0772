use tracing::info;

use super::{ContextSensitiveControls, Game, GuestMemory, PatchInput, Region, ScanStats};

/// Tracks the running title and drives its memory patches once per frame.
///
/// Code patches are applied on the first frame after the title changes.
#[derive(Debug)]
pub struct HackManager {
    game: Game,
    region: Region,
    pending_init: bool,
    enabled: bool,
    controls: ContextSensitiveControls,
}

impl Default for HackManager {
    fn default() -> Self {
        Self {
            game: Game::Unknown,
            region: Region::NtscU,
            pending_init: false,
            enabled: false,
            controls: ContextSensitiveControls::new(),
        }
    }
}

impl HackManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn game(&self) -> Game {
        self.game
    }

    #[must_use]
    pub const fn region(&self) -> Region {
        self.region
    }

    /// Whether the patches of the running title are applied.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub const fn controls(&self) -> &ContextSensitiveControls {
        &self.controls
    }

    /// Records the detected title. A different title starts over with fresh patches.
    pub fn set_game(&mut self, game: Game, region: Region) {
        if game == self.game && region == self.region {
            return;
        }
        info!(?game, ?region, "running title changed");
        self.game = game;
        self.region = region;
        self.controls = ContextSensitiveControls::new();
        self.enabled = false;
        self.pending_init = game != Game::Unknown;
    }

    /// Runs the patches of the current title for one frame.
    pub fn run_mods(&mut self, memory: &mut dyn GuestMemory, input: &dyn PatchInput) -> ScanStats {
        if self.pending_init {
            self.pending_init = false;
            self.enabled = self.controls.init_mod(self.game, self.region, memory);
        }
        self.controls.run_mod(self.game, memory, input)
    }
}
