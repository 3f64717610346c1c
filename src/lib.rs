//! Form Studio - dynamic form configuration engine
//!
//! Forms are described as JSON configs, compiled into a [`forms::FormSchema`]
//! and filled in through a [`session::FormSession`] that tracks values,
//! validation errors and step navigation.

pub mod config;
pub mod error;
pub mod forms;
pub mod hooks;
pub mod session;

pub use error::{CallbackError, ConfigError, SessionError, SubmitError, TransitionError};
pub use forms::{FormConfig, FormSchema, FormValues, ValidatorRegistry};
pub use hooks::{FormHooks, NoopHooks, TracingHooks};
pub use session::{Draft, FormSession, SharedSession};
