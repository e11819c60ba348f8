pub mod api;
pub mod bus;
pub mod controller;
pub mod error;
pub mod input;
pub mod storage;

pub use api::{ HttpSessionApi, SessionApi };
pub use bus::{ SelectionBus, SessionEvent };
pub use controller::{ ChatController, ChatState, ControllerConfig };
pub use error::{ ApiError, ChatErrorKind };
pub use input::ChatInput;
pub use storage::{ FileSessionSlot, Location, MemorySessionSlot, SessionSlot };
