use crate::state::{AutopilotType, Mode};

const MAV_MODE_FLAG_CUSTOM_MODE_ENABLED: f32 = 1.0;

const PX4_MAIN_MODE_AUTO: u32 = 4;
const PX4_SUB_MODE_AUTO_TAKEOFF: u32 = 2;
const PX4_SUB_MODE_AUTO_LOITER: u32 = 3;
const PX4_SUB_MODE_AUTO_MISSION: u32 = 4;

const fn px4_mode(main: u32, sub: u32) -> u32 {
    (main << 16) | (sub << 24)
}

// ArduCopter custom_mode numbers.
const APM_MODES: &[(u32, Mode)] = &[(4, Mode::Guided), (3, Mode::Auto), (17, Mode::Brake)];

// PX4 has no brake mode; loiter holds position instead. Decoding takes the
// first match, so a loitering PX4 vehicle reports GUIDED.
const PX4_MODES: &[(u32, Mode)] = &[
    (px4_mode(PX4_MAIN_MODE_AUTO, PX4_SUB_MODE_AUTO_LOITER), Mode::Guided),
    (px4_mode(PX4_MAIN_MODE_AUTO, PX4_SUB_MODE_AUTO_MISSION), Mode::Auto),
    (px4_mode(PX4_MAIN_MODE_AUTO, PX4_SUB_MODE_AUTO_TAKEOFF), Mode::Takeoff),
    (px4_mode(PX4_MAIN_MODE_AUTO, PX4_SUB_MODE_AUTO_LOITER), Mode::Brake),
];

fn mode_table(autopilot: AutopilotType) -> &'static [(u32, Mode)] {
    match autopilot {
        AutopilotType::ArduPilotMega => APM_MODES,
        AutopilotType::Px4 => PX4_MODES,
        AutopilotType::Generic | AutopilotType::Unknown => &[],
    }
}

/// Interpret a heartbeat `custom_mode` for the detected family.
pub fn decode(autopilot: AutopilotType, custom_mode: u32) -> Mode {
    mode_table(autopilot)
        .iter()
        .find(|&&(code, _)| code == custom_mode)
        .map(|&(_, mode)| mode)
        .unwrap_or(Mode::Other)
}

/// `custom_mode` the vehicle reports while in `mode`.
pub fn custom_mode(autopilot: AutopilotType, mode: Mode) -> Option<u32> {
    mode_table(autopilot)
        .iter()
        .find(|&&(_, m)| m == mode)
        .map(|&(code, _)| code)
}

/// MAV_CMD_DO_SET_MODE parameters selecting `mode`.
pub fn set_mode_params(autopilot: AutopilotType, mode: Mode) -> Option<[f32; 7]> {
    let code = custom_mode(autopilot, mode)?;
    let params = match autopilot {
        AutopilotType::Px4 => [
            MAV_MODE_FLAG_CUSTOM_MODE_ENABLED,
            ((code >> 16) & 0xFF) as f32,
            ((code >> 24) & 0xFF) as f32,
            0.0,
            0.0,
            0.0,
            0.0,
        ],
        _ => [
            MAV_MODE_FLAG_CUSTOM_MODE_ENABLED,
            code as f32,
            0.0,
            0.0,
            0.0,
            0.0,
            0.0,
        ],
    };
    Some(params)
}

pub fn available_modes(autopilot: AutopilotType) -> Vec<Mode> {
    let mut modes: Vec<Mode> = mode_table(autopilot).iter().map(|&(_, mode)| mode).collect();
    modes.dedup();
    modes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apm_guided_decodes() {
        assert_eq!(decode(AutopilotType::ArduPilotMega, 4), Mode::Guided);
        assert_eq!(decode(AutopilotType::ArduPilotMega, 3), Mode::Auto);
        assert_eq!(decode(AutopilotType::ArduPilotMega, 17), Mode::Brake);
    }

    #[test]
    fn px4_guided_decodes() {
        assert_eq!(decode(AutopilotType::Px4, 50_593_792), Mode::Guided);
        assert_eq!(decode(AutopilotType::Px4, px4_mode(4, 4)), Mode::Auto);
        assert_eq!(decode(AutopilotType::Px4, px4_mode(4, 2)), Mode::Takeoff);
    }

    #[test]
    fn unknown_codes_and_families_are_other() {
        assert_eq!(decode(AutopilotType::ArduPilotMega, 999), Mode::Other);
        assert_eq!(decode(AutopilotType::Px4, 4), Mode::Other);
        assert_eq!(decode(AutopilotType::Unknown, 4), Mode::Other);
        assert_eq!(decode(AutopilotType::Generic, 4), Mode::Other);
    }

    #[test]
    fn encode_matches_table() {
        assert_eq!(custom_mode(AutopilotType::ArduPilotMega, Mode::Brake), Some(17));
        assert_eq!(custom_mode(AutopilotType::ArduPilotMega, Mode::Takeoff), None);
        assert_eq!(
            custom_mode(AutopilotType::Px4, Mode::Brake),
            custom_mode(AutopilotType::Px4, Mode::Guided)
        );
        assert_eq!(custom_mode(AutopilotType::Unknown, Mode::Guided), None);
    }

    #[test]
    fn set_mode_params_per_family() {
        assert_eq!(
            set_mode_params(AutopilotType::ArduPilotMega, Mode::Guided),
            Some([1.0, 4.0, 0.0, 0.0, 0.0, 0.0, 0.0])
        );
        assert_eq!(
            set_mode_params(AutopilotType::Px4, Mode::Auto),
            Some([1.0, 4.0, 4.0, 0.0, 0.0, 0.0, 0.0])
        );
        assert_eq!(set_mode_params(AutopilotType::Generic, Mode::Auto), None);
    }

    #[test]
    fn generic_has_no_modes() {
        assert!(available_modes(AutopilotType::Generic).is_empty());
        assert_eq!(available_modes(AutopilotType::ArduPilotMega).len(), APM_MODES.len());
    }
}
