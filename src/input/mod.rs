/// Global push-to-talk hotkey registration
pub mod hotkey;

pub use hotkey::HotkeyBinding;
