//! Helpers shared by the unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::host::{Control, ControlSource};

/// Control values shared between a test and the device owning the source.
#[derive(Debug, Clone, Default)]
pub struct TestControls {
    values: Arc<Mutex<HashMap<Control, f32>>>,
}

impl TestControls {
    pub fn pressed(controls: &[Control]) -> Self {
        let source = Self::default();
        for &control in controls {
            source.set(control, 1.0);
        }
        source
    }

    pub fn set(&self, control: Control, value: f32) {
        self.values.lock().unwrap().insert(control, value);
    }

    pub fn press(&self, control: Control) {
        self.set(control, 1.0);
    }

    pub fn release(&self, control: Control) {
        self.values.lock().unwrap().remove(&control);
    }

    pub fn release_all(&self) {
        self.values.lock().unwrap().clear();
    }
}

impl ControlSource for TestControls {
    fn state(&self, control: Control) -> f32 {
        self.values
            .lock()
            .unwrap()
            .get(&control)
            .copied()
            .unwrap_or(0.0)
    }
}

/// Routes `tracing` output of the code under test to the test harness.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}
