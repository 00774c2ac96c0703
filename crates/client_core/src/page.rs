//! Host page capabilities used by the built-in response handlers.

use shared::domain::ElementId;
use tracing::info;

/// Everything the dispatcher needs from the page it runs in. Implementations
/// decide how markup is applied and whether extracted scripts are evaluated.
pub trait Page: Send + Sync {
    /// Surfaces a blocking message to the user.
    fn alert(&self, message: &str);

    fn replace_element(&self, element_id: &ElementId, html: &str);

    fn update_element(&self, element_id: &ElementId, html: &str);

    /// Receives script bodies extracted from element markup, in document order.
    fn run_scripts(&self, scripts: &[String]) {
        let _ = scripts;
    }

    /// Navigates by submitting a synthesized POST form targeting `url`.
    fn redirect_post(&self, url: &str);

    fn reload(&self);
}

/// A page with no DOM: every call is logged and otherwise ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessPage;

impl Page for HeadlessPage {
    fn alert(&self, message: &str) {
        info!(message, "page: alert");
    }

    fn replace_element(&self, element_id: &ElementId, html: &str) {
        info!(%element_id, bytes = html.len(), "page: replace element");
    }

    fn update_element(&self, element_id: &ElementId, html: &str) {
        info!(%element_id, bytes = html.len(), "page: update element");
    }

    fn run_scripts(&self, scripts: &[String]) {
        info!(count = scripts.len(), "page: skipping embedded scripts");
    }

    fn redirect_post(&self, url: &str) {
        info!(url, "page: redirect via post form");
    }

    fn reload(&self) {
        info!("page: reload");
    }
}
