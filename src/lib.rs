//! Course-management command dispatch for the kore course service.
//!
//! A `Dispatcher` turns a user command into a short, fixed sequence of REST
//! calls against the kore backend, asking the user through a
//! `DialogProvider` and reporting through a `NotificationSink`. The
//! `proxy` module is the matching server side: it relays the same API to
//! the course service on behalf of the logged-in user.

pub mod commands;
pub mod config;
pub mod dialog;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod model;
pub mod notify;
pub mod proxy;
pub mod routing;
pub mod terminal;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use commands::{Command, CommandInfo};
pub use config::{ClientConfig, KoreConfig, ProxyConfig};
pub use dispatcher::{DispatchService, Dispatcher, OperationResult};
pub use error::{DispatchError, FailureKind, TransportError};
pub use model::{Context, Operation, Route, Verb};
pub use transport::{HttpTransport, Transport};

use std::sync::Arc;

/// Build a dispatcher over HTTP from client configuration.
pub fn http_dispatcher(
    config: &ClientConfig,
    dialogs: Arc<dyn dialog::DialogProvider>,
    notices: Arc<dyn notify::NotificationSink>,
) -> Result<Dispatcher, String> {
    let transport = HttpTransport::new(config)?;
    Ok(Dispatcher::new(Arc::new(transport), dialogs, notices)
        .with_no_content_reasons(config.no_content_reasons.clone())
        .with_notice_policy(config.notices))
}
