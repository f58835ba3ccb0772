//! Interfaces to the emulator hosting the remote: mapped controls, the report channel,
//! EEPROM persistence and movie/netplay determinism.

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::extensions::{EncryptionKey, ExtensionNumber};
use crate::math::Vec3;
use crate::report::DataReportBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreButton {
    A,
    B,
    One,
    Two,
    Minus,
    Plus,
    Home,
}

impl CoreButton {
    pub const ALL: [Self; 7] = [
        Self::A,
        Self::B,
        Self::One,
        Self::Two,
        Self::Minus,
        Self::Plus,
        Self::Home,
    ];
}

/// Hotkeys temporarily overriding the configured orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hotkey {
    SidewaysToggle,
    UprightToggle,
    SidewaysHold,
    UprightHold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NunchukControl {
    C,
    Z,
    Stick(Direction),
    Swing(Direction),
    Tilt(Direction),
    Shake(Axis),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassicButton {
    A,
    B,
    X,
    Y,
    ZL,
    ZR,
    Minus,
    Home,
    Plus,
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassicControl {
    Button(ClassicButton),
    LeftStick(Direction),
    RightStick(Direction),
    LeftTrigger,
    RightTrigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fret {
    Green,
    Red,
    Yellow,
    Blue,
    Orange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuitarControl {
    Fret(Fret),
    StrumUp,
    StrumDown,
    Minus,
    Plus,
    Stick(Direction),
    Whammy,
    TouchBar(Direction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimeControl {
    Beam(u8),
    NextBeam,
    PreviousBeam,
    Visor(u8),
    NextVisor,
    PreviousVisor,
    SpringBall,
    Stick(Direction),
}

/// Every logical control a mapping framework can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Button(CoreButton),
    DPad(Direction),
    Swing(Direction),
    Tilt(Direction),
    Point(Direction),
    PointHide,
    Shake(Axis),
    ImuRecenter,
    Hotkey(Hotkey),
    Nunchuk(NunchukControl),
    Classic(ClassicControl),
    Guitar(GuitarControl),
    Prime(PrimeControl),
}

/// Current values of the mapped controls.
///
/// Values are in `0.0..=1.0`, a digital control counts as pressed above one half.
pub trait ControlSource: Send {
    fn state(&self, control: Control) -> f32;

    /// Raw accelerometer reading in m/s² when a motion sensor is bound.
    fn imu_acceleration(&self) -> Option<Vec3> {
        None
    }

    /// Raw gyroscope reading in rad/s when a motion sensor is bound.
    fn imu_angular_velocity(&self) -> Option<Vec3> {
        None
    }

    fn set_rumble(&self, _on: bool) {}

    fn is_pressed(&self, control: Control) -> bool {
        self.state(control) > 0.5
    }

    /// Signed value of an axis built from two opposing controls.
    fn axis(&self, negative: Control, positive: Control) -> f32 {
        (self.state(positive) - self.state(negative)).clamp(-1.0, 1.0)
    }
}

/// A report sent by the remote to the host, tagged with the L2CAP channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostReport {
    pub channel: u16,
    pub data: Vec<u8>,
}

/// Receives everything the emulated remote sends to the host.
pub trait ReportSink: Send {
    fn interrupt_report(&mut self, channel: u16, data: &[u8]);

    /// Decoded speaker output, `volume` in `0.0..=1.0`, `pan` in `-1.0..=1.0`.
    fn speaker_samples(&mut self, _samples: &[i16], _volume: f32, _pan: f32) {}
}

impl ReportSink for crossbeam_channel::Sender<HostReport> {
    fn interrupt_report(&mut self, channel: u16, data: &[u8]) {
        let report = HostReport {
            channel,
            data: data.to_vec(),
        };
        if self.send(report).is_err() {
            tracing::debug!(channel, "report receiver disconnected");
        }
    }
}

/// Persistent storage of the EEPROM image.
pub trait EepromStore: Send {
    /// Returns `None` when nothing was stored yet for `name`.
    fn load(&self, name: &str) -> io::Result<Option<Vec<u8>>>;

    fn save(&self, name: &str, data: &[u8]) -> io::Result<()>;

    /// Mii data imported into fresh images.
    fn load_mii(&self) -> io::Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// Keeps nothing, every reset starts with a factory image.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEepromStore;

impl EepromStore for NullEepromStore {
    fn load(&self, _name: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn save(&self, _name: &str, _data: &[u8]) -> io::Result<()> {
        Ok(())
    }
}

/// Stores `<name>.bin` per device and reads `mii.bin` from a directory.
#[derive(Debug, Clone)]
pub struct FileEepromStore {
    directory: PathBuf,
}

impl FileEepromStore {
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{name}.bin"))
    }

    fn read_optional(path: PathBuf) -> io::Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl EepromStore for FileEepromStore {
    fn load(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        Self::read_optional(self.path(name))
    }

    fn save(&self, name: &str, data: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.directory)?;
        fs::write(self.path(name), data)
    }

    fn load_mii(&self) -> io::Result<Option<Vec<u8>>> {
        Self::read_optional(self.path("mii"))
    }
}

/// Movie playback and netplay hooks. The default implementation is inert.
pub trait ReplaySource: Send {
    /// When true, button state is only sampled while building data reports.
    fn wants_determinism(&self) -> bool {
        false
    }

    /// Fills the report from a recording, returns true if it did.
    fn play_input(
        &mut self,
        _index: u32,
        _report: &mut DataReportBuilder,
        _extension: ExtensionNumber,
        _key: Option<&EncryptionKey>,
    ) -> bool {
        false
    }

    /// Replaces the report payload with the netplay synchronized one, returns true if it did.
    fn netplay_data(&mut self, _index: u32, _data: &mut [u8], _mode: u8) -> bool {
        false
    }

    /// Observes every data report before it is sent.
    fn check_status(
        &mut self,
        _index: u32,
        _report: &DataReportBuilder,
        _extension: ExtensionNumber,
        _key: Option<&EncryptionKey>,
    ) {
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoReplay;

impl ReplaySource for NoReplay {}

/// Everything the remote needs from its host.
pub struct HostInterface {
    pub input: Box<dyn ControlSource>,
    pub sink: Box<dyn ReportSink>,
    pub store: Box<dyn EepromStore>,
    pub replay: Box<dyn ReplaySource>,
}

impl HostInterface {
    #[must_use]
    pub fn new(input: impl ControlSource + 'static, sink: impl ReportSink + 'static) -> Self {
        Self {
            input: Box::new(input),
            sink: Box::new(sink),
            store: Box::new(NullEepromStore),
            replay: Box::new(NoReplay),
        }
    }

    #[must_use]
    pub fn with_store(mut self, store: impl EepromStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    #[must_use]
    pub fn with_replay(mut self, replay: impl ReplaySource + 'static) -> Self {
        self.replay = Box::new(replay);
        self
    }
}
