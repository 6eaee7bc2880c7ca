pub mod buffer;
pub mod engine;
pub mod group;
pub mod inbox;
pub mod mixer;
pub mod position;
pub mod state;
pub mod track;

pub use engine::{MasterLooper, Ports};
pub use inbox::{EventSender, LooperEvent};
pub use state::SystemState;
