use super::{Extension, ExtensionNumber, ExtensionRegisters};
use crate::host::ControlSource;

/// Empty extension port.
#[derive(Debug, Default)]
pub struct NoExtension;

impl Extension for NoExtension {
    fn number(&self) -> ExtensionNumber {
        ExtensionNumber::None
    }

    fn reset(&mut self) {}

    fn prepare_input(&mut self, _input: &dyn ControlSource) {}

    fn is_button_pressed(&self, _input: &dyn ControlSource) -> bool {
        false
    }

    fn registers(&self) -> Option<&ExtensionRegisters> {
        None
    }

    fn registers_mut(&mut self) -> Option<&mut ExtensionRegisters> {
        None
    }
}
