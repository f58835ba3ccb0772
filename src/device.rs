use std::sync::{Mutex, MutexGuard};

use tracing::{debug, error, info, trace, warn};

use crate::bus::I2cBus;
use crate::calibration::{convert_accel_data, AccelerometerCalibration};
use crate::camera::{self, CameraLogic};
use crate::config::{PrimeHackSettings, WiimoteConfig};
use crate::dynamics::{
    directional_input, emulate_cursor, emulate_imu_cursor, emulate_shake, emulate_swing,
    emulate_tilt, shake_input, ImuCursorState, MotionState, RotationalState, ShakeState,
};
use crate::eeprom::{Eeprom, EEPROM_FREE_SIZE};
use crate::extensions::{
    self, Attachments, Classic, ExtensionNumber, ExtensionPort, Guitar, MotionPlus, Nunchuk,
};
use crate::host::{
    Control, ControlSource, CoreButton, Direction, HostInterface, Hotkey, NunchukControl,
    PrimeControl,
};
use crate::input::{
    AcknowledgeData, ButtonData, ErrorCode, InputReport, MemoryData, StatusData, StatusFlags,
};
use crate::math::{Matrix33, Transform, Vec3, GRAVITY_ACCELERATION, TAU};
use crate::output::{AddressSpace, Addressing, OutputReport, PlayerLedFlags, WRITE_MEMORY_ID};
use crate::primehack::PatchInput;
use crate::report::{DataReportBuilder, ReportingMode, INPUT_REPORT_HEADER};
use crate::result::ProtocolError;
use crate::speaker::{self, SpeakerLogic};
use crate::UPDATE_FREQ;

/// Data on this control channel resets the remote.
pub const DISCONNECT_CONTROL_CHANNEL: u16 = 99;

/// Slot reserved for the balance board.
pub const BALANCE_BOARD_INDEX: u32 = 4;

// https://www.wiibrew.org/wiki/Wiimote#HID_Interface
const HID_TYPE_SET_REPORT: u8 = 0x5;
const HID_TYPE_DATA: u8 = 0xA;
const HID_PARAM_INPUT: u8 = 0x1;
const HID_PARAM_OUTPUT: u8 = 0x2;
const HID_HANDSHAKE_SUCCESS: u8 = 0x00;

/// The EEPROM answers on the bus too, but only through the EEPROM address space.
const EEPROM_I2C_ADDR: u8 = 0x50;

const MAX_BATTERY_LEVEL: f32 = 200.0;
const BATTERY_LOW_THRESHOLD: u8 = 0x20;

/// Largest chunk of a memory read answered per tick.
const READ_CHUNK_SIZE: u16 = 16;

const DPAD: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

/// Scale of the PrimeHack camera stick.
const PRIME_STICK_SCALE: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReadRequest {
    space: AddressSpace,
    slave_address: u8,
    address: u16,
    size: u16,
}

/// Orientation hotkeys. Toggles flip on the press edge, holds apply while pressed.
#[derive(Debug, Default, Clone, Copy)]
struct Modifiers {
    sideways_toggle: bool,
    upright_toggle: bool,
    sideways_hold: bool,
    upright_hold: bool,
    sideways_was_pressed: bool,
    upright_was_pressed: bool,
}

impl Modifiers {
    fn update(&mut self, input: &dyn ControlSource) {
        let sideways = input.is_pressed(Control::Hotkey(Hotkey::SidewaysToggle));
        if sideways && !self.sideways_was_pressed {
            self.sideways_toggle = !self.sideways_toggle;
        }
        self.sideways_was_pressed = sideways;

        let upright = input.is_pressed(Control::Hotkey(Hotkey::UprightToggle));
        if upright && !self.upright_was_pressed {
            self.upright_toggle = !self.upright_toggle;
        }
        self.upright_was_pressed = upright;

        self.sideways_hold = input.is_pressed(Control::Hotkey(Hotkey::SidewaysHold));
        self.upright_hold = input.is_pressed(Control::Hotkey(Hotkey::UprightHold));
    }
}

fn device_name(index: u32) -> String {
    if index == BALANCE_BOARD_INDEX {
        "BalanceBoard".to_string()
    } else {
        format!("Wiimote{}", index + 1)
    }
}

fn pressed_buttons(input: &dyn ControlSource, sideways: bool) -> ButtonData {
    let buttons = CoreButton::ALL
        .iter()
        .filter(|button| input.is_pressed(Control::Button(**button)))
        .fold(ButtonData::empty(), |acc, button| acc | ButtonData::from_button(*button));
    DPAD.iter()
        .filter(|direction| input.is_pressed(Control::DPad(**direction)))
        .fold(buttons, |acc, direction| acc | ButtonData::from_dpad(*direction, sideways))
}

/// Everything behind the device lock.
pub struct WiimoteState {
    index: u32,
    name: String,
    config: WiimoteConfig,
    host: HostInterface,

    channel: u16,
    mode: ReportingMode,
    continuous: bool,
    speaker_mute: bool,
    rumble: bool,
    status: StatusData,

    eeprom: Eeprom,
    eeprom_dirty: bool,
    read_request: Option<ReadRequest>,

    camera: CameraLogic,
    speaker: SpeakerLogic,
    attachments: Attachments,
    motion_plus: Option<MotionPlus>,

    modifiers: Modifiers,
    swing: MotionState,
    tilt: RotationalState,
    cursor: MotionState,
    shake: ShakeState,
    imu_cursor: ImuCursorState,
    camera_locked: bool,
}

impl WiimoteState {
    /// L2CAP channel of the last host message, 0 while disconnected.
    #[must_use]
    pub const fn channel(&self) -> u16 {
        self.channel
    }

    #[must_use]
    pub const fn reporting_mode(&self) -> ReportingMode {
        self.mode
    }

    #[must_use]
    pub const fn is_continuous(&self) -> bool {
        self.continuous
    }

    #[must_use]
    pub const fn is_rumbling(&self) -> bool {
        self.rumble
    }

    #[must_use]
    pub const fn status(&self) -> StatusData {
        self.status
    }

    #[must_use]
    pub const fn eeprom(&self) -> &Eeprom {
        &self.eeprom
    }

    #[must_use]
    pub const fn config(&self) -> &WiimoteConfig {
        &self.config
    }

    #[must_use]
    pub const fn camera(&self) -> &CameraLogic {
        &self.camera
    }

    #[must_use]
    pub const fn speaker(&self) -> &SpeakerLogic {
        &self.speaker
    }

    /// Set by the memory patches while a motion puzzle holds the camera.
    #[must_use]
    pub const fn is_camera_locked(&self) -> bool {
        self.camera_locked
    }

    #[must_use]
    pub const fn has_read_request(&self) -> bool {
        self.read_request.is_some()
    }

    #[must_use]
    pub const fn active_extension(&self) -> ExtensionNumber {
        self.attachments.active_number()
    }

    #[must_use]
    pub fn nunchuk(&self) -> Option<&Nunchuk> {
        self.attachments.nunchuk()
    }

    #[must_use]
    pub fn classic(&self) -> Option<&Classic> {
        self.attachments.classic()
    }

    #[must_use]
    pub fn guitar(&self) -> Option<&Guitar> {
        self.attachments.guitar()
    }

    #[must_use]
    pub const fn motion_plus(&self) -> Option<&MotionPlus> {
        self.motion_plus.as_ref()
    }

    #[must_use]
    pub const fn is_sideways(&self) -> bool {
        self.config.sideways ^ self.modifiers.sideways_toggle ^ self.modifiers.sideways_hold
    }

    #[must_use]
    pub const fn is_upright(&self) -> bool {
        self.config.upright ^ self.modifiers.upright_toggle ^ self.modifiers.upright_hold
    }

    /// Rotation from the held orientation to the remote's own axes.
    #[must_use]
    pub fn orientation(&self) -> Matrix33 {
        let quarter_turn = |flag: bool| if flag { TAU / 4.0 } else { 0.0 };
        Matrix33::rotate_z(-quarter_turn(self.is_sideways()))
            * Matrix33::rotate_x(quarter_turn(self.is_upright()))
    }

    fn transformation(&self, extra_rotation: Matrix33) -> Transform {
        let angle = -self.tilt.angle - self.swing.angle - self.cursor.angle;
        let rotation = extra_rotation * Matrix33::from_angles(angle);
        // Shake happens in the remote's own frame.
        let translation = -self.swing.position
            - self.cursor.position
            - rotation.transposed() * self.shake.position;
        Transform {
            rotation,
            translation,
        }
    }

    /// World to remote transform including the IMU pointer.
    #[must_use]
    pub fn total_transformation(&self) -> Transform {
        let imu = self.imu_cursor.rotation * Matrix33::rotate_x(self.imu_cursor.recentered_pitch);
        self.transformation(imu)
    }

    /// Acceleration felt by the remote in m/s².
    #[must_use]
    pub fn total_acceleration(&self) -> Vec3 {
        let extra = self
            .host
            .input
            .imu_acceleration()
            .unwrap_or(Vec3::new(0.0, 0.0, GRAVITY_ACCELERATION));
        let transform = self.transformation(Matrix33::IDENTITY);
        self.orientation() * transform.transform_vector(self.swing.acceleration + extra)
            + self.shake.acceleration
    }

    /// Angular velocity of the remote in rad/s.
    #[must_use]
    pub fn total_angular_velocity(&self) -> Vec3 {
        let extra = self.host.input.imu_angular_velocity().unwrap_or(Vec3::ZERO);
        self.orientation()
            * (self.tilt.angular_velocity
                + self.swing.angular_velocity
                + self.cursor.angular_velocity
                + extra)
    }

    fn with_bus<R>(&mut self, f: impl FnOnce(&mut I2cBus<'_>) -> R) -> R {
        let mut port = ExtensionPort::new(self.motion_plus.as_mut(), self.attachments.active_mut());
        let mut bus = I2cBus::new();
        bus.add_slave(&mut self.speaker);
        bus.add_slave(&mut self.camera);
        bus.add_slave(&mut port);
        f(&mut bus)
    }

    fn is_extension_connected(&mut self) -> bool {
        ExtensionPort::new(self.motion_plus.as_mut(), self.attachments.active_mut())
            .is_device_connected()
    }

    fn set_rumble(&mut self, on: bool) {
        self.rumble = on;
        self.host.input.set_rumble(on);
    }

    fn reset(&mut self) {
        self.set_rumble(false);
        self.channel = 0;
        self.mode = ReportingMode::Core;
        self.continuous = false;
        self.speaker_mute = false;

        self.flush_eeprom();
        self.eeprom = self.load_eeprom();
        self.read_request = None;

        // Start detached, the swap logic attaches one part per tick.
        self.motion_plus = None;
        self.attachments.set_active(ExtensionNumber::None);
        self.handle_extension_swap();

        self.speaker.reset();
        self.camera.reset();

        self.status = StatusData::default();
        let connected = self.is_extension_connected();
        self.status
            .flags
            .set(StatusFlags::EXTENSION_CONTROLLER_CONNECTED, connected);

        self.modifiers = Modifiers::default();
        self.swing = MotionState::default();
        self.tilt = RotationalState::default();
        self.cursor = MotionState::default();
        self.shake = ShakeState::default();
        self.imu_cursor = ImuCursorState::default();
        self.camera_locked = false;
    }

    fn flush_eeprom(&mut self) {
        if !self.eeprom_dirty {
            return;
        }
        match self.host.store.save(&self.name, self.eeprom.as_bytes()) {
            Ok(()) => info!(name = %self.name, "saved EEPROM"),
            Err(err) => error!(name = %self.name, %err, "failed to save EEPROM"),
        }
        self.eeprom_dirty = false;
    }

    fn load_eeprom(&self) -> Eeprom {
        match self.host.store.load(&self.name) {
            Ok(Some(data)) => return Eeprom::from_bytes(&data),
            Ok(None) => {}
            Err(err) => warn!(name = %self.name, %err, "failed to load EEPROM"),
        }

        let mut eeprom = Eeprom::default();
        match self.host.store.load_mii() {
            Ok(Some(mii)) => eeprom.import_mii(&mii),
            Ok(None) => {}
            Err(err) => warn!(%err, "failed to load Mii data"),
        }
        eeprom
    }

    fn handle_extension_swap(&mut self) {
        let active = self.attachments.active_number();
        let desired = self.config.extension;

        if self.motion_plus.is_some() && !self.config.motion_plus {
            debug!(index = self.index, "detaching MotionPlus");
            self.motion_plus = None;
            self.attachments.set_active(ExtensionNumber::None);
            return;
        }

        if self.config.motion_plus && self.motion_plus.is_none() {
            // The accessory has to be unplugged before the MotionPlus goes in between.
            if active == ExtensionNumber::None {
                debug!(index = self.index, "attaching MotionPlus");
                self.motion_plus = Some(MotionPlus::default());
            } else {
                self.attachments.set_active(ExtensionNumber::None);
            }
            return;
        }

        if active != desired {
            let next = if active == ExtensionNumber::None {
                desired
            } else {
                ExtensionNumber::None
            };
            debug!(index = self.index, from = ?active, to = ?next, "switching extension");
            self.attachments.set_active(next);
            self.attachments.active_mut().reset();
            if let Some(motion_plus) = self.motion_plus.as_mut() {
                motion_plus.reset();
            }
        }
    }

    fn update_buttons(&mut self) {
        let sideways = self.is_sideways();
        self.status.buttons = pressed_buttons(&*self.host.input, sideways);
    }

    #[allow(clippy::cast_precision_loss)]
    fn step_dynamics(&mut self) {
        let dt = 1.0 / UPDATE_FREQ as f32;
        let input = &*self.host.input;
        self.modifiers.update(input);

        emulate_swing(&mut self.swing, directional_input(input, Control::Swing), dt);
        emulate_tilt(&mut self.tilt, directional_input(input, Control::Tilt), dt);
        emulate_cursor(
            &mut self.cursor,
            directional_input(input, Control::Point),
            input.is_pressed(Control::PointHide),
            dt,
        );
        emulate_shake(&mut self.shake, shake_input(input, Control::Shake), dt);
        emulate_imu_cursor(
            &mut self.imu_cursor,
            input.imu_angular_velocity(),
            input.imu_acceleration(),
            input.is_pressed(Control::ImuRecenter),
            dt,
        );
    }

    fn update(&mut self) {
        if self.channel == 0 {
            return;
        }

        self.step_dynamics();
        if !self.host.replay.wants_determinism() {
            self.update_buttons();
        }

        self.handle_extension_swap();
        let input = &*self.host.input;
        let extension = self.attachments.active_mut();
        extension.update(input);
        extension.prepare_input(input);
        if let Some(motion_plus) = self.motion_plus.as_mut() {
            motion_plus.update();
        }

        if self.process_extension_port_event() {
            return;
        }
        if self.process_read_data_request() {
            return;
        }
        self.send_data_report();
    }

    /// Reports a plugged or unplugged accessory, which also stops data reporting.
    fn process_extension_port_event(&mut self) -> bool {
        let connected = self.is_extension_connected();
        if connected
            == self
                .status
                .flags
                .contains(StatusFlags::EXTENSION_CONTROLLER_CONNECTED)
        {
            return false;
        }

        debug!(index = self.index, connected, "extension port event");
        self.mode = ReportingMode::Disabled;
        self.handle_request_status();
        true
    }

    fn send_input_report(&mut self, report: &InputReport) {
        let mut data = vec![INPUT_REPORT_HEADER];
        data.extend_from_slice(&report.to_bytes());
        self.host.sink.interrupt_report(self.channel, &data);
    }

    fn send_ack(&mut self, report_number: u8, error: ErrorCode) {
        let ack = AcknowledgeData {
            buttons: self.status.buttons,
            report_number,
            error_code: error as u8,
        };
        self.send_input_report(&InputReport::Acknowledge(ack));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn handle_request_status(&mut self) {
        let connected = self.is_extension_connected();
        self.status
            .flags
            .set(StatusFlags::EXTENSION_CONTROLLER_CONNECTED, connected);

        // Recordings expect a full battery.
        let battery = if self.host.replay.wants_determinism() {
            1.0
        } else {
            self.config.battery / 100.0
        };
        self.status.battery_level = (battery.clamp(0.0, 1.0) * MAX_BATTERY_LEVEL) as u8;
        self.status.flags.set(
            StatusFlags::BATTERY_LOW,
            self.status.battery_level < BATTERY_LOW_THRESHOLD,
        );

        self.send_input_report(&InputReport::StatusInformation(self.status));
    }

    fn send_data_report(&mut self) {
        if self.mode == ReportingMode::Disabled {
            return;
        }

        let mut report = DataReportBuilder::new(self.mode);
        let extension = self.attachments.active_number();
        let played = self.host.replay.play_input(
            self.index,
            &mut report,
            extension,
            self.attachments.active().encryption_key(),
        );

        if played {
            self.status.buttons = report.core_buttons();
        } else {
            self.fill_data_report(&mut report);
        }

        if self
            .host
            .replay
            .netplay_data(self.index, report.data_mut(), self.mode.id())
        {
            self.status.buttons = report.core_buttons();
        }
        self.host.replay.check_status(
            self.index,
            &report,
            extension,
            self.attachments.active().encryption_key(),
        );

        self.host
            .sink
            .interrupt_report(self.channel, &report.to_report());
        self.mode = self.mode.next();
    }

    fn fill_data_report(&mut self, report: &mut DataReportBuilder) {
        if report.has_core() {
            if self.host.replay.wants_determinism() {
                self.update_buttons();
            }
            report.set_core_buttons(self.status.buttons);
        }

        if report.has_accel() {
            let calibration = AccelerometerCalibration::default();
            report.set_accel_data(convert_accel_data(
                self.total_acceleration(),
                calibration.zero_g(),
                calibration.one_g(),
                10,
            ));
        }

        if report.has_ir() {
            let transform = self.total_transformation();
            self.camera.update(&transform);
            let register = camera::REG_DATA + self.mode.ir_data_offset();
            let ir_data = report.ir_data_mut();
            let size = ir_data.len();
            if self.with_bus(|bus| bus.bus_read(camera::I2C_ADDR, register, &mut *ir_data)) != size {
                ir_data.fill(0xFF);
            }
        }

        if report.has_ext() {
            let angular_velocity = self.total_angular_velocity();
            if let Some(motion_plus) = self.motion_plus.as_mut() {
                motion_plus.prepare_input(angular_velocity, self.attachments.active());
            }
            let ext_data = report.ext_data_mut();
            let size = ext_data.len();
            let read = self.with_bus(|bus| {
                bus.bus_read(
                    extensions::I2C_ADDR,
                    extensions::CONTROLLER_DATA_OFFSET,
                    &mut *ext_data,
                )
            });
            if read != size {
                ext_data.fill(0xFF);
            }
        }
    }

    fn control_channel(&mut self, channel: u16, data: &[u8]) -> Result<(), ProtocolError> {
        let Some((&header, payload)) = data.split_first() else {
            return Err(ProtocolError::ZeroSizedPacket { channel });
        };
        self.channel = channel;

        let (kind, param) = (header >> 4, header & 0x0F);
        match kind {
            HID_TYPE_SET_REPORT if param != HID_PARAM_INPUT => {
                let result = self.handle_output_report(payload);
                self.host
                    .sink
                    .interrupt_report(self.channel, &[HID_HANDSHAKE_SUCCESS]);
                result
            }
            _ => Err(ProtocolError::UnexpectedHidPacket { kind, param }),
        }
    }

    fn interrupt_channel(&mut self, channel: u16, data: &[u8]) -> Result<(), ProtocolError> {
        let Some((&header, payload)) = data.split_first() else {
            return Err(ProtocolError::ZeroSizedPacket { channel });
        };
        self.channel = channel;

        let (kind, param) = (header >> 4, header & 0x0F);
        match (kind, param) {
            (HID_TYPE_DATA, HID_PARAM_OUTPUT) => self.handle_output_report(payload),
            _ => Err(ProtocolError::UnexpectedHidPacket { kind, param }),
        }
    }

    fn handle_output_report(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        let parsed = OutputReport::parse(data)?;
        let id = data[0];
        trace!(index = self.index, report = ?parsed.report, "output report");

        // Every report carries the rumble bit.
        self.set_rumble(parsed.rumble);

        match parsed.report {
            OutputReport::Rumble(_) => return Ok(()),
            OutputReport::PlayerLed(leds) => self.set_leds(leds),
            OutputReport::DataReportingMode(mode) => {
                self.continuous = mode.continuous;
                self.mode = ReportingMode::try_from(mode.mode)?;
                debug!(index = self.index, mode = ?self.mode, continuous = self.continuous, "reporting mode");
            }
            OutputReport::IrCameraEnable(enabled) => {
                self.status
                    .flags
                    .set(StatusFlags::IR_CAMERA_ENABLED, enabled);
            }
            OutputReport::SpeakerEnable(enabled) => {
                self.status.flags.set(StatusFlags::SPEAKER_ENABLED, enabled);
            }
            OutputReport::SpeakerMute(muted) => self.speaker_mute = muted,
            OutputReport::IrCameraEnable2(enabled) => self.camera.set_enabled(enabled),
            OutputReport::StatusRequest => {
                self.handle_request_status();
                return Ok(());
            }
            OutputReport::WriteMemory(addressing, payload) => {
                self.handle_write_data(addressing, &payload);
                return Ok(());
            }
            OutputReport::ReadMemory(addressing) => {
                self.handle_read_data(addressing);
                return Ok(());
            }
            OutputReport::SpeakerData(length, payload) => {
                self.handle_speaker_data(length, &payload);
                return Ok(());
            }
        }

        if parsed.ack {
            self.send_ack(id, ErrorCode::Success);
        }
        Ok(())
    }

    fn set_leds(&mut self, leds: PlayerLedFlags) {
        let bits = (self.status.flags.bits() & 0x0F) | leds.bits();
        self.status.flags = StatusFlags::from_bits_retain(bits);
    }

    #[allow(clippy::cast_possible_truncation)]
    fn handle_write_data(&mut self, addressing: Addressing, payload: &[u8; 16]) {
        let size = usize::from(addressing.size);
        if size == 0 || size > payload.len() {
            warn!(index = self.index, size, "bad memory write size");
            return;
        }
        let data = &payload[..size];

        let error = match addressing.space {
            AddressSpace::Eeprom => {
                let address = (addressing.address & 0xFFFF) as usize;
                if address + size > EEPROM_FREE_SIZE {
                    warn!(index = self.index, address, size, "EEPROM write out of range");
                    ErrorCode::InvalidAddress
                } else {
                    self.eeprom.write(address, data);
                    self.eeprom_dirty = true;
                    ErrorCode::Success
                }
            }
            AddressSpace::I2cBus | AddressSpace::I2cBusAlt => {
                let slave = addressing.slave_address();
                if slave == EEPROM_I2C_ADDR {
                    warn!(index = self.index, "EEPROM write through register space");
                    ErrorCode::InvalidAddress
                } else if self.with_bus(|bus| bus.bus_write(slave, addressing.register(), data)) == size {
                    ErrorCode::Success
                } else {
                    debug!(index = self.index, slave, register = addressing.register(), "bus write not acknowledged");
                    ErrorCode::Nack
                }
            }
            AddressSpace::Invalid => {
                warn!(index = self.index, "write to invalid address space");
                ErrorCode::InvalidSpace
            }
        };

        self.send_ack(WRITE_MEMORY_ID, error);
    }

    #[allow(clippy::cast_possible_truncation)]
    fn handle_read_data(&mut self, addressing: Addressing) {
        if self.read_request.is_some() {
            warn!(index = self.index, "read request while another one is in progress");
            return;
        }
        if addressing.size == 0 {
            return;
        }
        self.read_request = Some(ReadRequest {
            space: addressing.space,
            slave_address: addressing.slave_address(),
            address: (addressing.address & 0xFFFF) as u16,
            size: addressing.size,
        });
    }

    /// Answers one chunk of the pending read, returns false if there is none.
    #[allow(clippy::cast_possible_truncation)]
    fn process_read_data_request(&mut self) -> bool {
        let Some(mut request) = self.read_request else {
            return false;
        };

        let chunk = request.size.min(READ_CHUNK_SIZE);
        let length = usize::from(chunk);
        let mut data = [0u8; 16];

        let error = match request.space {
            AddressSpace::Eeprom => {
                if usize::from(request.address) + usize::from(request.size) > EEPROM_FREE_SIZE {
                    ErrorCode::InvalidAddress
                } else {
                    self.eeprom
                        .read(usize::from(request.address), &mut data[..length]);
                    ErrorCode::Success
                }
            }
            AddressSpace::I2cBus | AddressSpace::I2cBusAlt => {
                if request.slave_address == EEPROM_I2C_ADDR {
                    ErrorCode::InvalidAddress
                } else {
                    let register = request.address as u8;
                    let read = self.with_bus(|bus| {
                        bus.bus_read(request.slave_address, register, &mut data[..length])
                    });
                    if read == length {
                        ErrorCode::Success
                    } else {
                        ErrorCode::Nack
                    }
                }
            }
            AddressSpace::Invalid => ErrorCode::InvalidSpace,
        };

        let address = request.address;
        let reply_size = if error == ErrorCode::Success {
            request.address = request.address.wrapping_add(chunk);
            request.size -= chunk;
            self.read_request = (request.size > 0).then_some(request);
            length
        } else {
            debug!(index = self.index, ?error, address, "read request failed");
            self.read_request = None;
            usize::from(READ_CHUNK_SIZE)
        };

        let reply = MemoryData::new(self.status.buttons, address, reply_size, error, data);
        self.send_input_report(&InputReport::ReadMemory(reply));
        true
    }

    fn handle_speaker_data(&mut self, length: u8, payload: &[u8; 20]) {
        if self.speaker_mute || !self.status.flags.contains(StatusFlags::SPEAKER_ENABLED) {
            trace!(index = self.index, "speaker data while muted or disabled");
            return;
        }
        let length = usize::from(length);
        if length > payload.len() {
            error!(index = self.index, length, "bad speaker data length");
            return;
        }

        self.with_bus(|bus| {
            bus.bus_write(speaker::I2C_ADDR, speaker::SPEAKER_DATA_OFFSET, &payload[..length])
        });
        let samples = self.speaker.take_samples();
        if !samples.is_empty() {
            let volume = self.speaker.volume();
            let pan = self.config.speaker_pan / 100.0;
            self.host.sink.speaker_samples(&samples, volume, pan);
        }
    }

    fn is_button_pressed(&self) -> bool {
        let input = &*self.host.input;
        !pressed_buttons(input, false).is_empty()
            || self.attachments.active().is_button_pressed(input)
    }
}

/// An emulated Wii remote.
///
/// The host drives it by calling [`Wiimote::update`] at [`crate::UPDATE_FREQ`]
/// and forwarding L2CAP traffic to [`Wiimote::control_channel`] and [`Wiimote::interrupt_channel`].
pub struct Wiimote {
    index: u32,
    state: Mutex<WiimoteState>,
}

impl Wiimote {
    #[must_use]
    pub fn new(index: u32, config: WiimoteConfig, host: HostInterface) -> Self {
        let mut state = WiimoteState {
            index,
            name: device_name(index),
            config: config.sanitized(),
            host,
            channel: 0,
            mode: ReportingMode::Core,
            continuous: false,
            speaker_mute: false,
            rumble: false,
            status: StatusData::default(),
            eeprom: Eeprom::default(),
            eeprom_dirty: false,
            read_request: None,
            camera: CameraLogic::default(),
            speaker: SpeakerLogic::default(),
            attachments: Attachments::default(),
            motion_plus: None,
            modifiers: Modifiers::default(),
            swing: MotionState::default(),
            tilt: RotationalState::default(),
            cursor: MotionState::default(),
            shake: ShakeState::default(),
            imu_cursor: ImuCursorState::default(),
            camera_locked: false,
        };
        state.reset();
        Self {
            index,
            state: Mutex::new(state),
        }
    }

    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Name used for the stored EEPROM image.
    #[must_use]
    pub fn name(&self) -> String {
        device_name(self.index)
    }

    /// Locks the device state for inspection.
    pub fn state(&self) -> MutexGuard<'_, WiimoteState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(err) => err.into_inner(),
        }
    }

    /// Returns to the power-on state, saving a modified EEPROM first.
    pub fn reset(&self) {
        self.state().reset();
    }

    /// Advances the remote by one tick and sends whatever report is due.
    pub fn update(&self) {
        self.state().update();
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().channel != 0
    }

    /// Handles data the host sent on the control channel.
    pub fn control_channel(&self, channel: u16, data: &[u8]) {
        if channel == DISCONNECT_CONTROL_CHANNEL {
            debug!(index = self.index, "disconnect");
            self.reset();
            return;
        }
        let result = self.state().control_channel(channel, data);
        self.log_protocol_error(result);
    }

    /// Handles data the host sent on the interrupt channel.
    pub fn interrupt_channel(&self, channel: u16, data: &[u8]) {
        let result = self.state().interrupt_channel(channel, data);
        self.log_protocol_error(result);
    }

    fn log_protocol_error(&self, result: Result<(), ProtocolError>) {
        match result {
            Ok(()) => {}
            Err(err @ ProtocolError::ZeroSizedPacket { .. }) => {
                error!(index = self.index, %err, "dropping host message");
            }
            Err(err) => warn!(index = self.index, %err, "dropping host message"),
        }
    }

    pub fn set_config(&self, config: WiimoteConfig) {
        self.state().config = config.sanitized();
    }

    /// Plugs in an accessory. It shows up over the next ticks.
    pub fn select_extension(&self, extension: ExtensionNumber) {
        self.state().config.extension = extension;
    }

    pub fn set_motion_plus(&self, attached: bool) {
        self.state().config.motion_plus = attached;
    }

    /// Any button of the remote or its accessory, used to wake up the console.
    #[must_use]
    pub fn check_for_button_press(&self) -> bool {
        self.state().is_button_pressed()
    }

    fn is_pressed(&self, control: Control) -> bool {
        self.state().host.input.is_pressed(control)
    }

    #[must_use]
    pub fn check_beam(&self, beam: u8) -> bool {
        self.is_pressed(Control::Prime(PrimeControl::Beam(beam)))
    }

    #[must_use]
    pub fn check_visor(&self, visor: u8) -> bool {
        self.is_pressed(Control::Prime(PrimeControl::Visor(visor)))
    }

    #[must_use]
    pub fn check_beam_scroll(&self, next: bool) -> bool {
        self.is_pressed(Control::Prime(if next {
            PrimeControl::NextBeam
        } else {
            PrimeControl::PreviousBeam
        }))
    }

    #[must_use]
    pub fn check_visor_scroll(&self, next: bool) -> bool {
        self.is_pressed(Control::Prime(if next {
            PrimeControl::NextVisor
        } else {
            PrimeControl::PreviousVisor
        }))
    }

    #[must_use]
    pub fn check_spring_ball(&self) -> bool {
        self.is_pressed(Control::Prime(PrimeControl::SpringBall))
    }

    /// Camera stick for controller mode, x right and y down. Centered while the camera is locked.
    #[must_use]
    pub fn prime_stick(&self) -> (f64, f64) {
        let state = self.state();
        if state.camera_locked {
            return (0.0, 0.0);
        }
        let stick = directional_input(&*state.host.input, |direction| {
            Control::Prime(PrimeControl::Stick(direction))
        });
        (
            f64::from(stick.x) * PRIME_STICK_SCALE,
            f64::from(stick.z) * -PRIME_STICK_SCALE,
        )
    }

    #[must_use]
    pub fn prime_controller_mode(&self) -> bool {
        self.state().config.prime.controller_mode
    }

    #[must_use]
    pub fn prime_settings(&self) -> PrimeHackSettings {
        self.state().config.prime.clone()
    }
}

impl PatchInput for Wiimote {
    fn check_forward(&self) -> bool {
        self.is_pressed(Control::Nunchuk(NunchukControl::Stick(Direction::Up)))
    }

    fn check_back(&self) -> bool {
        self.is_pressed(Control::Nunchuk(NunchukControl::Stick(Direction::Down)))
    }

    fn check_left(&self) -> bool {
        self.is_pressed(Control::Nunchuk(NunchukControl::Stick(Direction::Left)))
    }

    fn check_right(&self) -> bool {
        self.is_pressed(Control::Nunchuk(NunchukControl::Stick(Direction::Right)))
    }

    fn improved_motion_controls(&self) -> bool {
        self.state().config.prime.improved_motion_controls
    }

    fn lock_camera_in_puzzles(&self) -> bool {
        self.state().config.prime.lock_camera_in_motion_puzzles
    }

    fn set_camera_lock(&self, locked: bool) {
        let mut state = self.state();
        if state.camera_locked != locked {
            debug!(index = state.index, locked, "camera lock");
        }
        state.camera_locked = locked;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crossbeam_channel::Receiver;

    use super::*;
    use crate::host::{FileEepromStore, HostReport, ReportSink};
    use crate::input::ACKNOWLEDGE_ID;
    use crate::output::{
        IR_CAMERA_ENABLE_2_ID, SPEAKER_DATA_ID, SPEAKER_ENABLE_ID, STATUS_REQUEST_ID,
    };
    use crate::speaker::FORMAT_PCM;
    use crate::testing::{init_logging, TestControls};

    const CHANNEL: u16 = 0x41;

    fn emulated(config: WiimoteConfig, input: TestControls) -> (Wiimote, Receiver<HostReport>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let wiimote = Wiimote::new(0, config, HostInterface::new(input, sender));
        (wiimote, receiver)
    }

    fn send(wiimote: &Wiimote, report: &[u8]) {
        let mut data = vec![0xA2];
        data.extend_from_slice(report);
        wiimote.interrupt_channel(CHANNEL, &data);
    }

    fn next_report(receiver: &Receiver<HostReport>) -> InputReport {
        let report = receiver.try_recv().unwrap();
        assert_eq!(report.channel, CHANNEL);
        assert_eq!(report.data[0], INPUT_REPORT_HEADER);
        InputReport::try_from(&report.data[1..]).unwrap()
    }

    fn set_mode(wiimote: &Wiimote, mode: ReportingMode) {
        send(wiimote, &[0x12, 0x00, mode.id()]);
    }

    fn write_memory(wiimote: &Wiimote, addressing: Addressing, data: &[u8]) {
        let mut payload = [0u8; 16];
        payload[..data.len()].copy_from_slice(data);
        let (buffer, length) = OutputReport::WriteMemory(addressing, payload).to_array(false);
        send(wiimote, &buffer[..length]);
    }

    fn read_memory(wiimote: &Wiimote, addressing: Addressing) {
        let (buffer, length) = OutputReport::ReadMemory(addressing).to_array(false);
        send(wiimote, &buffer[..length]);
    }

    fn ack_error(receiver: &Receiver<HostReport>) -> u8 {
        match next_report(receiver) {
            InputReport::Acknowledge(ack) => {
                assert_eq!(ack.report_number(), WRITE_MEMORY_ID);
                ack.error_code()
            }
            other => panic!("expected an acknowledge, got {other:?}"),
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(device_name(0), "Wiimote1");
        assert_eq!(device_name(3), "Wiimote4");
        assert_eq!(device_name(BALANCE_BOARD_INDEX), "BalanceBoard");
    }

    #[test]
    fn test_no_reports_before_connection() {
        let (wiimote, receiver) = emulated(WiimoteConfig::default(), TestControls::default());
        wiimote.update();
        assert!(!wiimote.is_connected());
        assert!(receiver.is_empty());
    }

    #[test]
    fn test_core_report_with_buttons() {
        let input = TestControls::pressed(&[
            Control::Button(CoreButton::A),
            Control::DPad(Direction::Up),
        ]);
        let (wiimote, receiver) = emulated(WiimoteConfig::default(), input);
        set_mode(&wiimote, ReportingMode::Core);
        assert!(receiver.is_empty());

        wiimote.update();
        let report = receiver.try_recv().unwrap();
        assert_eq!(report.data.len(), 4);
        assert_eq!(report.data[..2], [INPUT_REPORT_HEADER, 0x30]);
        assert_eq!(
            ButtonData::from_bytes([report.data[2], report.data[3]]),
            ButtonData::A | ButtonData::UP
        );
    }

    #[test]
    fn test_sideways_dpad_rotates() {
        let input = TestControls::pressed(&[Control::DPad(Direction::Up)]);
        let config = WiimoteConfig {
            sideways: true,
            ..WiimoteConfig::default()
        };
        let (wiimote, receiver) = emulated(config, input);
        set_mode(&wiimote, ReportingMode::Core);
        wiimote.update();
        match next_report(&receiver) {
            InputReport::DataReport(0x30, data) => assert_eq!(data.buttons(), ButtonData::RIGHT),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_extension_change_interrupts_reporting() {
        let (wiimote, receiver) = emulated(WiimoteConfig::default(), TestControls::default());
        set_mode(&wiimote, ReportingMode::CoreExt8);
        wiimote.update();
        match next_report(&receiver) {
            InputReport::DataReport(0x32, data) => assert_eq!(data.data[2..10], [0xFF; 8]),
            other => panic!("unexpected {other:?}"),
        }

        wiimote.select_extension(ExtensionNumber::Nunchuk);
        wiimote.update();
        match next_report(&receiver) {
            InputReport::StatusInformation(status) => assert!(status
                .flags()
                .contains(StatusFlags::EXTENSION_CONTROLLER_CONNECTED)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(wiimote.state().reporting_mode(), ReportingMode::Disabled);
        assert!(wiimote.state().nunchuk().is_some());

        wiimote.update();
        assert!(receiver.is_empty());

        set_mode(&wiimote, ReportingMode::CoreExt8);
        wiimote.update();
        match next_report(&receiver) {
            InputReport::DataReport(0x32, data) => assert_eq!(data.data[2..4], [0x80, 0x80]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_extension_swap_goes_through_none() {
        let config = WiimoteConfig {
            extension: ExtensionNumber::Nunchuk,
            ..WiimoteConfig::default()
        };
        let (wiimote, _receiver) = emulated(config, TestControls::default());
        set_mode(&wiimote, ReportingMode::Core);
        wiimote.update();
        assert_eq!(wiimote.state().active_extension(), ExtensionNumber::Nunchuk);

        wiimote.select_extension(ExtensionNumber::Classic);
        wiimote.update();
        assert_eq!(wiimote.state().active_extension(), ExtensionNumber::None);
        wiimote.update();
        assert_eq!(wiimote.state().active_extension(), ExtensionNumber::Classic);
        assert!(wiimote.state().classic().is_some());
    }

    #[test]
    fn test_motion_plus_attach_and_detach() {
        let config = WiimoteConfig {
            extension: ExtensionNumber::Nunchuk,
            motion_plus: true,
            ..WiimoteConfig::default()
        };
        let (wiimote, receiver) = emulated(config, TestControls::default());
        assert!(wiimote.state().motion_plus().is_some());
        assert_eq!(wiimote.state().active_extension(), ExtensionNumber::None);

        set_mode(&wiimote, ReportingMode::Core);
        wiimote.update();
        assert_eq!(wiimote.state().active_extension(), ExtensionNumber::Nunchuk);
        assert!(matches!(next_report(&receiver), InputReport::StatusInformation(_)));

        wiimote.set_motion_plus(false);
        wiimote.update();
        assert!(wiimote.state().motion_plus().is_none());
        assert_eq!(wiimote.state().active_extension(), ExtensionNumber::None);
        match next_report(&receiver) {
            InputReport::StatusInformation(status) => assert!(!status
                .flags()
                .contains(StatusFlags::EXTENSION_CONTROLLER_CONNECTED)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_reset_is_idempotent() {
        let (wiimote, _receiver) = emulated(WiimoteConfig::default(), TestControls::default());
        send(&wiimote, &[0x12, 0x04, 0x31]);
        read_memory(&wiimote, Addressing::eeprom(0, 0x40));
        assert!(wiimote.state().has_read_request());

        let snapshot = |wiimote: &Wiimote| {
            let state = wiimote.state();
            (
                state.channel(),
                state.reporting_mode(),
                state.is_continuous(),
                state.has_read_request(),
                state.status(),
                state.active_extension(),
            )
        };
        wiimote.reset();
        let first = snapshot(&wiimote);
        wiimote.reset();
        assert_eq!(snapshot(&wiimote), first);
        assert_eq!(
            first,
            (0, ReportingMode::Core, false, false, StatusData::default(), ExtensionNumber::None)
        );
    }

    #[test]
    fn test_disconnect_channel_resets() {
        let (wiimote, _receiver) = emulated(WiimoteConfig::default(), TestControls::default());
        set_mode(&wiimote, ReportingMode::CoreAccel);
        assert!(wiimote.is_connected());
        wiimote.control_channel(DISCONNECT_CONTROL_CHANNEL, &[0x00]);
        assert!(!wiimote.is_connected());
        assert_eq!(wiimote.state().reporting_mode(), ReportingMode::Core);
    }

    #[test]
    fn test_set_report_gets_handshake() {
        let (wiimote, receiver) = emulated(WiimoteConfig::default(), TestControls::default());
        wiimote.control_channel(0x40, &[0x52, STATUS_REQUEST_ID, 0x00]);

        let status = receiver.try_recv().unwrap();
        assert_eq!(status.data[1], crate::input::STATUS_ID);
        let handshake = receiver.try_recv().unwrap();
        assert_eq!(handshake.data, vec![HID_HANDSHAKE_SUCCESS]);
        assert_eq!(handshake.channel, 0x40);
    }

    #[test]
    fn test_malformed_messages_are_dropped() {
        init_logging();
        let (wiimote, receiver) = emulated(WiimoteConfig::default(), TestControls::default());
        wiimote.control_channel(0x40, &[]);
        wiimote.interrupt_channel(CHANNEL, &[]);
        assert!(!wiimote.is_connected());

        // Handshake on the control channel, input report on the interrupt channel.
        wiimote.control_channel(0x40, &[0x00]);
        wiimote.interrupt_channel(CHANNEL, &[0xA1, 0x30, 0x00, 0x00]);
        // Unknown report id.
        send(&wiimote, &[0x42, 0x00]);
        assert!(receiver.is_empty());
    }

    #[test]
    fn test_status_battery() {
        let config = WiimoteConfig {
            battery: 10.0,
            ..WiimoteConfig::default()
        };
        let (wiimote, receiver) = emulated(config, TestControls::default());
        send(&wiimote, &[STATUS_REQUEST_ID, 0x00]);
        match next_report(&receiver) {
            InputReport::StatusInformation(status) => {
                assert_eq!(status.battery_level(), 20);
                assert!(status.flags().contains(StatusFlags::BATTERY_LOW));
            }
            other => panic!("unexpected {other:?}"),
        }

        wiimote.set_config(WiimoteConfig::default());
        send(&wiimote, &[0x11, 0x30]);
        send(&wiimote, &[STATUS_REQUEST_ID, 0x00]);
        match next_report(&receiver) {
            InputReport::StatusInformation(status) => {
                assert_eq!(status.battery_level(), 0xC8);
                assert_eq!(status.flags(), StatusFlags::LED_1 | StatusFlags::LED_2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_ack_only_when_requested() {
        let (wiimote, receiver) = emulated(WiimoteConfig::default(), TestControls::default());
        send(&wiimote, &[SPEAKER_ENABLE_ID, 0x04]);
        assert!(receiver.is_empty());
        send(&wiimote, &[SPEAKER_ENABLE_ID, 0x06]);
        match next_report(&receiver) {
            InputReport::Acknowledge(ack) => {
                assert_eq!(ack.report_number(), SPEAKER_ENABLE_ID);
                assert_eq!(ack.error_code(), ErrorCode::Success as u8);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(wiimote
            .state()
            .status()
            .flags()
            .contains(StatusFlags::SPEAKER_ENABLED));
    }

    #[test]
    fn test_rumble_bit_reaches_input() {
        let (wiimote, _receiver) = emulated(WiimoteConfig::default(), TestControls::default());
        send(&wiimote, &[0x11, 0x11]);
        assert!(wiimote.state().is_rumbling());
        send(&wiimote, &[0x10, 0x00]);
        assert!(!wiimote.state().is_rumbling());
    }

    #[test]
    fn test_read_eeprom_calibration() {
        let (wiimote, receiver) = emulated(WiimoteConfig::default(), TestControls::default());
        read_memory(&wiimote, Addressing::eeprom(0x0016, 10));
        wiimote.update();

        match next_report(&receiver) {
            InputReport::ReadMemory(memory) => {
                assert_eq!(memory.error_flag(), 0);
                assert_eq!(memory.size(), 10);
                assert_eq!(memory.address_offset(), 0x0016);
                let state = wiimote.state();
                assert_eq!(memory.data[..10], state.eeprom().as_bytes()[0x16..0x20]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!wiimote.state().has_read_request());
    }

    #[test]
    fn test_read_is_split_in_chunks() {
        let (wiimote, receiver) = emulated(WiimoteConfig::default(), TestControls::default());
        read_memory(&wiimote, Addressing::eeprom(0x0000, 0x18));

        let mut offsets = Vec::new();
        for _ in 0..2 {
            wiimote.update();
            match next_report(&receiver) {
                InputReport::ReadMemory(memory) => offsets.push((memory.address_offset(), memory.size())),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(offsets, vec![(0x0000, 16), (0x0010, 8)]);

        // Back to data reports once the read is done.
        wiimote.update();
        assert!(matches!(next_report(&receiver), InputReport::DataReport(0x30, _)));
    }

    #[test]
    fn test_read_errors() {
        let (wiimote, receiver) = emulated(WiimoteConfig::default(), TestControls::default());
        let expect_error = |addressing: Addressing, code: u8| {
            read_memory(&wiimote, addressing);
            wiimote.update();
            match next_report(&receiver) {
                InputReport::ReadMemory(memory) => {
                    assert_eq!(memory.error_flag(), code);
                    assert_eq!(memory.size(), 16);
                }
                other => panic!("unexpected {other:?}"),
            }
            assert!(!wiimote.state().has_read_request());
        };

        expect_error(Addressing::eeprom(0x16F8, 0x10), ErrorCode::InvalidAddress as u8);
        expect_error(Addressing::control_registers(0xA0_0000, 4), ErrorCode::InvalidAddress as u8);
        // Nothing answers on the inactive MotionPlus address.
        expect_error(Addressing::control_registers(0xA6_00FA, 6), ErrorCode::Nack as u8);
    }

    #[test]
    fn test_second_read_request_is_ignored() {
        let (wiimote, receiver) = emulated(WiimoteConfig::default(), TestControls::default());
        read_memory(&wiimote, Addressing::eeprom(0x0000, 4));
        read_memory(&wiimote, Addressing::eeprom(0x0100, 4));
        wiimote.update();
        match next_report(&receiver) {
            InputReport::ReadMemory(memory) => assert_eq!(memory.address_offset(), 0x0000),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!wiimote.state().has_read_request());
    }

    #[test]
    fn test_write_errors() {
        let (wiimote, receiver) = emulated(WiimoteConfig::default(), TestControls::default());

        write_memory(&wiimote, Addressing::eeprom(0x16FC, 8), &[0; 8]);
        assert_eq!(ack_error(&receiver), ErrorCode::InvalidAddress as u8);

        write_memory(&wiimote, Addressing::control_registers(0xA0_0000, 1), &[0]);
        assert_eq!(ack_error(&receiver), ErrorCode::InvalidAddress as u8);

        write_memory(&wiimote, Addressing::control_registers(0xA4_00F0, 1), &[0x55]);
        assert_eq!(ack_error(&receiver), ErrorCode::Nack as u8);

        let invalid = Addressing {
            space: AddressSpace::Invalid,
            address: 0,
            size: 1,
        };
        write_memory(&wiimote, invalid, &[0]);
        assert_eq!(ack_error(&receiver), ErrorCode::InvalidSpace as u8);
    }

    #[test]
    fn test_eeprom_write_persists_across_resets() {
        let directory = tempfile::tempdir().unwrap();
        let new_wiimote = || {
            let (sender, receiver) = crossbeam_channel::unbounded();
            let host = HostInterface::new(TestControls::default(), sender)
                .with_store(FileEepromStore::new(directory.path()));
            (Wiimote::new(0, WiimoteConfig::default(), host), receiver)
        };

        let (wiimote, receiver) = new_wiimote();
        write_memory(&wiimote, Addressing::eeprom(0x0FCA, 4), &[1, 2, 3, 4]);
        assert_eq!(ack_error(&receiver), ErrorCode::Success as u8);
        wiimote.reset();
        assert!(FileEepromStore::new(directory.path()).path("Wiimote1").exists());

        let (restored, _receiver) = new_wiimote();
        assert_eq!(restored.state().eeprom().as_bytes()[0x0FCA..0x0FCE], [1, 2, 3, 4]);
    }

    #[test]
    fn test_extension_registers_through_bus() {
        let config = WiimoteConfig {
            extension: ExtensionNumber::Classic,
            ..WiimoteConfig::default()
        };
        let (wiimote, receiver) = emulated(config, TestControls::default());
        assert!(wiimote.state().classic().is_some());

        read_memory(&wiimote, Addressing::control_registers(0xA4_00FA, 6));
        wiimote.update();
        match next_report(&receiver) {
            InputReport::ReadMemory(memory) => {
                assert_eq!(memory.error_flag(), 0);
                assert_eq!(memory.data[..6], [0x00, 0x00, 0xA4, 0x20, 0x01, 0x01]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_zero_key_extension_reads_decode_on_host() {
        let config = WiimoteConfig {
            extension: ExtensionNumber::Nunchuk,
            ..WiimoteConfig::default()
        };
        let (wiimote, receiver) = emulated(config, TestControls::default());
        let calibration = |wiimote: &Wiimote| {
            read_memory(wiimote, Addressing::control_registers(0xA4_0020, 6));
            loop {
                wiimote.update();
                match next_report(&receiver) {
                    InputReport::ReadMemory(memory) => {
                        assert_eq!(memory.error_flag(), 0);
                        return memory.data[..6].to_vec();
                    }
                    InputReport::StatusInformation(_) => {}
                    other => panic!("unexpected {other:?}"),
                }
            }
        };
        let plain = calibration(&wiimote);

        write_memory(&wiimote, Addressing::control_registers(0xA4_0040, 16), &[0; 16]);
        assert_eq!(ack_error(&receiver), ErrorCode::Success as u8);
        write_memory(&wiimote, Addressing::control_registers(0xA4_00F0, 1), &[0xAA]);
        assert_eq!(ack_error(&receiver), ErrorCode::Success as u8);

        let encrypted = calibration(&wiimote);
        assert_ne!(encrypted, plain);
        let decoded: Vec<u8> = encrypted
            .iter()
            .map(|x| (x ^ 0x17).wrapping_add(0x17))
            .collect();
        assert_eq!(decoded, plain);
    }

    #[test]
    fn test_ir_camera_points() {
        let (wiimote, receiver) = emulated(WiimoteConfig::default(), TestControls::default());
        set_mode(&wiimote, ReportingMode::CoreAccelIr12);
        wiimote.update();
        match next_report(&receiver) {
            InputReport::DataReport(0x33, data) => assert_eq!(data.data[5..17], [0xFF; 12]),
            other => panic!("unexpected {other:?}"),
        }

        send(&wiimote, &[IR_CAMERA_ENABLE_2_ID, 0x04]);
        write_memory(&wiimote, Addressing::control_registers(0xB0_0033, 1), &[0x03]);
        assert_eq!(ack_error(&receiver), ErrorCode::Success as u8);
        wiimote.update();
        match next_report(&receiver) {
            InputReport::DataReport(0x33, data) => assert_ne!(data.data[5..8], [0xFF; 3]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_interleaved_reports_alternate() {
        let (wiimote, receiver) = emulated(WiimoteConfig::default(), TestControls::default());
        set_mode(&wiimote, ReportingMode::InterleavedA);
        let ids: Vec<u8> = (0..4)
            .map(|_| {
                wiimote.update();
                receiver.try_recv().unwrap().data[1]
            })
            .collect();
        assert_eq!(ids, vec![0x3E, 0x3F, 0x3E, 0x3F]);
    }

    #[test]
    fn test_orientation_changes_acceleration_axis() {
        let input = TestControls::pressed(&[Control::Swing(Direction::Right)]);
        let (wiimote, _receiver) = emulated(WiimoteConfig::default(), input.clone());
        set_mode(&wiimote, ReportingMode::CoreAccel);
        wiimote.update();
        let accel = wiimote.state().total_acceleration();
        assert!(accel.x > 1.0);

        let config = WiimoteConfig {
            sideways: true,
            ..WiimoteConfig::default()
        };
        let (wiimote, _receiver) = emulated(config, input);
        set_mode(&wiimote, ReportingMode::CoreAccel);
        wiimote.update();
        let accel = wiimote.state().total_acceleration();
        assert!(accel.y < -1.0);
        assert!(accel.x.abs() < 0.5);
    }

    #[test]
    fn test_resting_acceleration_is_gravity() {
        let (wiimote, _receiver) = emulated(WiimoteConfig::default(), TestControls::default());
        set_mode(&wiimote, ReportingMode::CoreAccel);
        wiimote.update();
        let accel = wiimote.state().total_acceleration();
        assert!(accel.x.abs() < 1e-4 && accel.y.abs() < 1e-4);
        assert!((accel.z - GRAVITY_ACCELERATION).abs() < 1e-4);
    }

    #[test]
    fn test_orientation_hotkeys() {
        let input = TestControls::default();
        let (wiimote, _receiver) = emulated(WiimoteConfig::default(), input.clone());
        set_mode(&wiimote, ReportingMode::Core);

        input.press(Control::Hotkey(Hotkey::SidewaysToggle));
        wiimote.update();
        assert!(wiimote.state().is_sideways());
        wiimote.update();
        assert!(wiimote.state().is_sideways());
        input.release(Control::Hotkey(Hotkey::SidewaysToggle));
        wiimote.update();
        input.press(Control::Hotkey(Hotkey::SidewaysToggle));
        wiimote.update();
        assert!(!wiimote.state().is_sideways());

        input.press(Control::Hotkey(Hotkey::UprightHold));
        wiimote.update();
        assert!(wiimote.state().is_upright());
        input.release(Control::Hotkey(Hotkey::UprightHold));
        wiimote.update();
        assert!(!wiimote.state().is_upright());
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        samples: Arc<Mutex<Vec<(Vec<i16>, f32, f32)>>>,
    }

    impl ReportSink for RecordingSink {
        fn interrupt_report(&mut self, _channel: u16, _data: &[u8]) {}

        fn speaker_samples(&mut self, samples: &[i16], volume: f32, pan: f32) {
            self.samples
                .lock()
                .unwrap()
                .push((samples.to_vec(), volume, pan));
        }
    }

    #[test]
    fn test_speaker_data_reaches_sink() {
        let sink = RecordingSink::default();
        let config = WiimoteConfig {
            speaker_pan: -50.0,
            ..WiimoteConfig::default()
        };
        let wiimote = Wiimote::new(1, config, HostInterface::new(TestControls::default(), sink.clone()));

        let speaker_data = |data: &[u8]| {
            let mut report = vec![SPEAKER_DATA_ID, (data.len() as u8) << 3];
            report.extend_from_slice(data);
            report.resize(22, 0);
            send(&wiimote, &report);
        };

        // Disabled speakers drop their data.
        speaker_data(&[0x40, 0xC0]);
        assert!(sink.samples.lock().unwrap().is_empty());

        send(&wiimote, &[SPEAKER_ENABLE_ID, 0x04]);
        let config = [0x00, FORMAT_PCM, 0xA0, 0x0F, 0xFF, 0x00, 0x00];
        write_memory(&wiimote, Addressing::control_registers(0xA2_0001, 7), &config);
        speaker_data(&[0x40, 0xC0]);

        let samples = sink.samples.lock().unwrap();
        assert_eq!(samples.len(), 1);
        let (data, volume, pan) = &samples[0];
        assert_eq!(data, &vec![0x4000, -0x4000]);
        assert!((volume - 1.0).abs() < f32::EPSILON);
        assert!((pan + 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_button_press_checks() {
        let input = TestControls::default();
        let config = WiimoteConfig {
            extension: ExtensionNumber::Nunchuk,
            ..WiimoteConfig::default()
        };
        let (wiimote, _receiver) = emulated(config, input.clone());
        set_mode(&wiimote, ReportingMode::Core);
        wiimote.update();
        assert!(!wiimote.check_for_button_press());

        input.press(Control::Nunchuk(NunchukControl::Z));
        assert!(wiimote.check_for_button_press());
        input.release_all();
        input.press(Control::DPad(Direction::Left));
        assert!(wiimote.check_for_button_press());
    }

    #[test]
    fn test_prime_queries() {
        let input = TestControls::pressed(&[
            Control::Prime(PrimeControl::Beam(2)),
            Control::Prime(PrimeControl::NextVisor),
            Control::Prime(PrimeControl::Stick(Direction::Right)),
            Control::Prime(PrimeControl::Stick(Direction::Up)),
            Control::Nunchuk(NunchukControl::Stick(Direction::Up)),
        ]);
        let (wiimote, _receiver) = emulated(WiimoteConfig::default(), input);
        assert!(wiimote.check_beam(2));
        assert!(!wiimote.check_beam(1));
        assert!(wiimote.check_visor_scroll(true));
        assert!(!wiimote.check_visor_scroll(false));
        assert!(!wiimote.check_spring_ball());
        assert!(wiimote.check_forward());
        assert!(!wiimote.check_back());

        let (x, y) = wiimote.prime_stick();
        assert!((x - 15.0).abs() < 1e-6);
        assert!((y + 15.0).abs() < 1e-6);
        assert!(!wiimote.prime_controller_mode());
        assert!(wiimote.improved_motion_controls());
    }

    #[test]
    fn test_camera_lock_centers_prime_stick() {
        let input = TestControls::pressed(&[Control::Prime(PrimeControl::Stick(Direction::Right))]);
        let (wiimote, _receiver) = emulated(WiimoteConfig::default(), input);
        assert!(!wiimote.state().is_camera_locked());
        assert!(wiimote.prime_stick().0 > 0.0);

        wiimote.set_camera_lock(true);
        assert!(wiimote.state().is_camera_locked());
        assert_eq!(wiimote.prime_stick(), (0.0, 0.0));

        wiimote.set_camera_lock(false);
        assert!(wiimote.prime_stick().0 > 0.0);

        wiimote.set_camera_lock(true);
        wiimote.reset();
        assert!(!wiimote.state().is_camera_locked());
    }

    #[test]
    fn test_acknowledge_report_layout() {
        let (wiimote, receiver) = emulated(WiimoteConfig::default(), TestControls::default());
        send(&wiimote, &[0x13, 0x06]);
        let report = receiver.try_recv().unwrap();
        assert_eq!(report.data, vec![INPUT_REPORT_HEADER, ACKNOWLEDGE_ID, 0x00, 0x00, 0x13, 0x00]);
    }
}
