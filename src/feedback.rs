// src/feedback.rs
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn label(self) -> &'static str {
        match self {
            Side::Left => "Left",
            Side::Right => "Right",
        }
    }
}

/// Coaching outcome for a counted repetition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Feedback {
    RaiseBothArms,
    RaiseLeftArm,
    RaiseRightArm,
    WellDone,
    SquatWellDone(Side),
    SquatDeeper(Side),
}

/// Audio asset selector. Mapping a cue to a file is up to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AudioCue {
    BothArmsHigher,
    LeftArmHigher,
    RightArmHigher,
    WellDone,
    SquatDeeper,
}

impl Feedback {
    /// Text shown to the user.
    pub fn message(self) -> String {
        match self {
            Feedback::RaiseBothArms => "Please Raise Your Arms Higher!".to_string(),
            Feedback::RaiseLeftArm => "Please Raise Your Left Arm Higher!".to_string(),
            Feedback::RaiseRightArm => "Please Raise Your Right Arm Higher!".to_string(),
            Feedback::WellDone => "Well Done!".to_string(),
            Feedback::SquatWellDone(side) => format!("{}: Well Done!", side.label()),
            Feedback::SquatDeeper(side) => format!("{}: Please Squat Deeper!", side.label()),
        }
    }

    pub fn audio_cue(self) -> AudioCue {
        match self {
            Feedback::RaiseBothArms => AudioCue::BothArmsHigher,
            Feedback::RaiseLeftArm => AudioCue::LeftArmHigher,
            Feedback::RaiseRightArm => AudioCue::RightArmHigher,
            Feedback::WellDone | Feedback::SquatWellDone(_) => AudioCue::WellDone,
            Feedback::SquatDeeper(_) => AudioCue::SquatDeeper,
        }
    }

    /// Stable code used in exported records.
    pub fn code(self) -> &'static str {
        match self {
            Feedback::RaiseBothArms => "RAISE_BOTH_ARMS",
            Feedback::RaiseLeftArm => "RAISE_LEFT_ARM",
            Feedback::RaiseRightArm => "RAISE_RIGHT_ARM",
            Feedback::WellDone => "WELL_DONE",
            Feedback::SquatWellDone(Side::Left) => "SQUAT_WELL_DONE_LEFT",
            Feedback::SquatWellDone(Side::Right) => "SQUAT_WELL_DONE_RIGHT",
            Feedback::SquatDeeper(Side::Left) => "SQUAT_DEEPER_LEFT",
            Feedback::SquatDeeper(Side::Right) => "SQUAT_DEEPER_RIGHT",
        }
    }

    pub fn is_positive(self) -> bool {
        matches!(self, Feedback::WellDone | Feedback::SquatWellDone(_))
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squat_messages_name_the_side() {
        assert_eq!(Feedback::SquatWellDone(Side::Left).message(), "Left: Well Done!");
        assert_eq!(
            Feedback::SquatDeeper(Side::Right).message(),
            "Right: Please Squat Deeper!"
        );
    }

    #[test]
    fn well_done_shares_one_cue() {
        assert_eq!(Feedback::WellDone.audio_cue(), AudioCue::WellDone);
        assert_eq!(Feedback::SquatWellDone(Side::Right).audio_cue(), AudioCue::WellDone);
        assert_eq!(Feedback::SquatDeeper(Side::Left).audio_cue(), AudioCue::SquatDeeper);
        assert!(!Feedback::RaiseLeftArm.is_positive());
    }
}
