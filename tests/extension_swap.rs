use crossbeam_channel::Receiver;
use proptest::prelude::*;
use wiimote_emu::host::Control;
use wiimote_emu::input::StatusFlags;
use wiimote_emu::prelude::*;

struct Idle;

impl ControlSource for Idle {
    fn state(&self, _control: Control) -> f32 {
        0.0
    }
}

#[derive(Debug, Clone)]
enum Step {
    Select(ExtensionNumber),
    MotionPlus(bool),
    Update,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        prop::sample::select(ExtensionNumber::ALL.to_vec()).prop_map(Step::Select),
        any::<bool>().prop_map(Step::MotionPlus),
        Just(Step::Update),
        Just(Step::Update),
    ]
}

const STATUS_REPORT_ID: u8 = 0x20;
const STATUS_FLAGS_INDEX: usize = 4;

fn connected_wiimote() -> (Wiimote, Receiver<HostReport>) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    let wiimote = Wiimote::new(0, WiimoteConfig::default(), HostInterface::new(Idle, sender));
    wiimote.interrupt_channel(0x41, &[0xA2, 0x15, 0x00]);
    // Answer to the status request above.
    receiver.try_iter().for_each(drop);
    (wiimote, receiver)
}

fn is_connected(wiimote: &Wiimote) -> bool {
    wiimote
        .state()
        .status()
        .flags
        .contains(StatusFlags::EXTENSION_CONTROLLER_CONNECTED)
}

fn check_tick(
    wiimote: &Wiimote,
    receiver: &Receiver<HostReport>,
    previous: ExtensionNumber,
) -> Result<ExtensionNumber, TestCaseError> {
    let was_connected = is_connected(wiimote);
    wiimote.update();

    let status_reports: Vec<_> = receiver
        .try_iter()
        .filter(|report| report.data[1] == STATUS_REPORT_ID)
        .collect();

    let state = wiimote.state();
    let active = state.active_extension();
    let connected = state
        .status()
        .flags
        .contains(StatusFlags::EXTENSION_CONTROLLER_CONNECTED);
    // Accessories are always unplugged before another one goes in.
    prop_assert!(
        previous == active || previous == ExtensionNumber::None || active == ExtensionNumber::None,
        "{previous:?} -> {active:?}"
    );
    prop_assert_eq!(connected, active != ExtensionNumber::None);

    if connected == was_connected {
        prop_assert!(status_reports.is_empty(), "unsolicited status report");
    } else {
        // A plug event is reported once and stops data reporting.
        prop_assert_eq!(status_reports.len(), 1);
        let flags = StatusFlags::from_bits_truncate(status_reports[0].data[STATUS_FLAGS_INDEX]);
        prop_assert_eq!(
            flags.contains(StatusFlags::EXTENSION_CONTROLLER_CONNECTED),
            connected
        );
        prop_assert_eq!(state.reporting_mode(), ReportingMode::Disabled);
    }
    Ok(active)
}

proptest! {
    #[test]
    fn swaps_pass_through_unplugged(steps in prop::collection::vec(step(), 1..64)) {
        let (wiimote, receiver) = connected_wiimote();
        let mut active = wiimote.state().active_extension();
        let mut desired = ExtensionNumber::None;
        let mut motion_plus = false;

        for step in steps {
            match step {
                Step::Select(extension) => {
                    desired = extension;
                    wiimote.select_extension(extension);
                }
                Step::MotionPlus(attached) => {
                    motion_plus = attached;
                    wiimote.set_motion_plus(attached);
                }
                Step::Update => active = check_tick(&wiimote, &receiver, active)?,
            }
        }

        for _ in 0..4 {
            active = check_tick(&wiimote, &receiver, active)?;
        }
        prop_assert_eq!(active, desired);
        prop_assert_eq!(wiimote.state().motion_plus().is_some(), motion_plus);
    }
}
