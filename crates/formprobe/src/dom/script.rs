//! Page behavior hooks for in-memory documents.

use super::{Document, NodeId};

/// What happens after a submit handler ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitDisposition {
    /// Navigate to the form's action
    #[default]
    Default,
    /// The handler took over (`preventDefault`)
    Prevented,
}

/// Application logic attached to a document
///
/// Every hook gets the whole document so it can read controls and toggle
/// other elements. Hooks run synchronously inside the triggering action.
pub trait PageScript: Send + Sync {
    /// Document finished loading
    fn on_load(&self, _doc: &mut Document) {}

    /// Value of a text control changed by a keystroke or clear
    fn on_input(&self, _doc: &mut Document, _target: NodeId) {}

    /// Committed change (checkbox toggled, option selected, files attached)
    fn on_change(&self, _doc: &mut Document, _target: NodeId) {}

    /// Element clicked, before the default action
    fn on_click(&self, _doc: &mut Document, _target: NodeId) {}

    /// Form submitted and passed native constraint validation
    fn on_submit(&self, _doc: &mut Document, _form: NodeId) -> SubmitDisposition {
        SubmitDisposition::Default
    }
}
