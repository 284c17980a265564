//! Backend abstraction: a uniform `invoke(prompt, model, ...) → text` contract
//! over subprocess-based CLI backends and HTTP chat-completion backends, with
//! activity-based timeouts, transient-error retry, and CLI→HTTP fallback.

pub mod cleanup;
pub mod error;
pub mod factory;
pub mod http;
pub mod invoke;
pub mod retry;
pub mod subprocess;
pub mod template;

pub use error::{BackendError, BackendResult};
pub use factory::{command_on_path, BackendRegistry, ResolvedAdapter};
pub use http::HttpAdapter;
pub use invoke::{Invoke, InvokeRequest};
pub use subprocess::SubprocessAdapter;
