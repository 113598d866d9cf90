pub mod filter;
pub mod fusion;
pub mod ik;
pub mod kinematics;
pub mod mailbox;
pub mod motion_generator;
pub mod safety;
pub mod smoothing;
pub mod tracing;

pub use filter::*;
pub use fusion::*;
pub use ik::*;
pub use kinematics::*;
pub use mailbox::*;
pub use motion_generator::*;
pub use safety::*;
pub use smoothing::*;
pub use self::tracing::init_tracing;
