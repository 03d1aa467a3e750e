pub mod cause;
pub mod quality;
pub mod time;
pub mod type_id;

pub use cause::{Cause, CauseOfTransmission};
pub use quality::Quality;
pub use time::{Cp24Time2a, Cp56Time2a, TimeFormat, TimeTag};
pub use type_id::TypeId;
