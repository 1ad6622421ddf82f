//! CLI commands module.

mod config;
mod listen;
mod relay;
mod session;
mod status;
mod stt;
mod tts;
mod util;

pub use config::ConfigCommand;
pub use listen::ListenCommand;
pub use relay::RelayCommand;
pub use session::SessionCommand;
pub use status::StatusCommand;
pub use stt::SttCommand;
pub use tts::TtsCommand;

pub(crate) use util::*;
