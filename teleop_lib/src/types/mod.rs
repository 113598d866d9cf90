pub mod config;
pub mod error;
pub mod haptic;
pub mod joint_state;
pub mod trajectory;

pub use config::*;
pub use error::*;
pub use haptic::*;
pub use joint_state::*;
pub use trajectory::*;
