//! State capture types: snapshots, diffs, and capture sessions.
//!
//! The engine never inspects the environment directly; it consumes immutable
//! [`StateSnapshot`]s from a [`StateSource`] and derives [`StateDiff`]s from
//! snapshot pairs. Snapshots use a fixed schema; there is no runtime type
//! inference at the capture boundary.

mod diff;
mod session;
mod snapshot;
mod system;

pub use diff::{diff_snapshots, ChangeCategory, StateChange, StateDiff};
pub use session::CaptureSession;
pub use snapshot::{
    ApplicationState, Bounds, KeyboardState, MouseState, StateSnapshot, StateSource,
    SystemMetrics, UiElement, WindowState,
};
pub use system::SystemMetricsSource;
