//! Live form sessions
//!
//! A [`FormSession`] applies user events to a compiled schema; a
//! [`SharedSession`] serializes events arriving from concurrent handlers.

mod autosave;
mod draft;
mod form_session;
mod handle;
mod script;

pub use autosave::AutosaveStatus;
pub use draft::Draft;
pub use form_session::{CancelReason, FormSession, SessionSnapshot, SessionStatus};
pub use handle::SharedSession;
pub use script::{parse_script, replay, EventOutcome, ScriptEvent};
