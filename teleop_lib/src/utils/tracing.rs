//! Tracing initialization shared by the teleop and torque controller nodes.
//!
//! Both nodes run inside a dora dataflow, which installs its own global
//! subscriber. We therefore install a thread-local subscriber so the control
//! loop logs stay readable and never fight with the runtime's.

use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;

/// Initialize tracing with a thread-local subscriber.
///
/// - Respects `RUST_LOG` (defaults to `"info"`)
/// - Compact output without target/file/line metadata
///
/// The returned guard keeps the subscriber active and must stay in scope for
/// as long as the calling thread logs. Threads spawned by a node need their
/// own guard.
///
/// # Example
/// ```no_run
/// use teleop_lib::init_tracing;
///
/// fn main() {
///     let _guard = init_tracing();
///     // control loop here
/// }
/// ```
pub fn init_tracing() -> DefaultGuard {
    use tracing_subscriber::layer::SubscriberExt;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_names(true);

    let subscriber = tracing_subscriber::Registry::default()
        .with(env_filter)
        .with(fmt_layer);

    tracing::subscriber::set_default(subscriber)
}
