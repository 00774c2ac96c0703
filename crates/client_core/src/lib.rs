//! Client runtime for server-driven pages.
//!
//! The building blocks are [`NamedChain`] (resumable named step sequences),
//! [`InstanceRegistry`] (named singletons) and [`ResponseDispatcher`] (applies
//! server response envelopes and resumes the chain that issued the request).
//! The [`widgets`] module builds the autocomplete, layer and tabs controllers
//! on top of them.

pub mod chain;
pub mod error;
pub mod page;
pub mod registry;
pub mod responses;
pub mod settings;
pub mod transport;
pub mod widgets;

pub use chain::{ChainState, NamedChain, Step};
pub use error::{DispatchError, SettingsError, TransportError};
pub use page::{HeadlessPage, Page};
pub use registry::{InstanceRegistry, StoreOutcome, SINGLETON_NAME};
pub use responses::{
    DispatchContext, DispatchEvent, DispatchOutcome, ResponseDispatcher, ResponseListener,
    ResponseRequest,
};
pub use settings::{load_settings, Settings};
pub use transport::{HttpTransport, Method, MissingTransport, Transport, TransportRequest};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
