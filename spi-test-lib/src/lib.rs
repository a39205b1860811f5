pub mod bus;
pub mod devices;
pub mod port;
pub mod protocol;
pub mod session;
pub mod terminal;

pub use session::{run_interactive_session, SessionConfig};
