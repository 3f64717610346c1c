//! Host callbacks invoked by form sessions

mod tracing_hooks;
mod traits;

pub use tracing_hooks::TracingHooks;
pub use traits::{FormHooks, NoopHooks};

#[cfg(test)]
pub use traits::MockFormHooks;
