pub mod event;
pub mod phase;
pub mod surface;
pub mod trial;

pub use event::EventKind;
pub use phase::SessionPhase;
pub use surface::{Bounds, ClickAction, DisplayList, DrawItem, Rgba, Shape, Surface, SurfaceError};
pub use trial::{Contingency, ParseTrialTypeError, RATIO_LEVELS, TrialType};
