use thiserror::Error;

/// Errors raised while validating configuration. All of them are fatal:
/// a node that hits one must not enter its control loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{0} parameter not set")]
    MissingParameter(String),

    #[error("{name} should be of size {expected} but is of size {found}")]
    WrongLength {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("{name} = {value} is outside the valid range {range}")]
    OutOfRange {
        name: String,
        value: f64,
        range: &'static str,
    },

    #[error("joint {joint} lower limit {lower} is above upper limit {upper}")]
    InvertedLimits { joint: usize, lower: f64, upper: f64 },

    #[error("frame '{0}' not found in the kinematic description")]
    UnknownFrame(String),

    #[error("tip frame '{tip}' is not downstream of base frame '{base}'")]
    InvalidChain { base: String, tip: String },

    #[error("chain from '{base}' to '{tip}' has {found} revolute joints, expected {expected}")]
    JointCountMismatch {
        base: String,
        tip: String,
        expected: usize,
        found: usize,
    },

    #[error("poll timeout {timeout_ms} ms must be shorter than the tick period {period_ms} ms")]
    PollTimeoutTooLong { timeout_ms: u64, period_ms: f64 },
}

/// A joint setpoint left the configured range. Fatal for the whole process.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("joint {joint} value {value:.4} outside limits [{lower:.4}, {upper:.4}]")]
pub struct SafetyViolation {
    /// 1-based joint number, matching the `panda_jointN` names.
    pub joint: usize,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Runtime errors of the control loops that are not safety related.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error("joint state has {found} entries, expected at least {expected}")]
    ShortJointState { expected: usize, found: usize },

    #[error("torque loop has not been activated")]
    NotActivated,

    #[error(transparent)]
    Safety(#[from] SafetyViolation),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
