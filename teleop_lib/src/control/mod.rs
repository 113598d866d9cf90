pub mod teleop;
pub mod torque;

pub use teleop::*;
pub use torque::*;
