pub mod capture;
pub mod suspender;
mod types;

pub use capture::{KeyCallback, KeyCapture, KeyEvent};
pub use suspender::{KeySuspender, SuspenderConfig};
pub use types::{KeyCode, Modifiers};
