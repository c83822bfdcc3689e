use crate::models::{FocusRef, TargetId};
use crate::targets::TargetCatalog;

use super::{FocusEvent, FocusedElement};

/// Turns successive focus readings into enter/leave edges.
pub struct FocusTransitions {
    catalog: TargetCatalog,
    current: Option<(TargetId, FocusRef)>,
}

impl FocusTransitions {
    pub fn new(catalog: TargetCatalog) -> Self {
        Self {
            catalog,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&(TargetId, FocusRef)> {
        self.current.as_ref()
    }

    /// `None` means nothing is focused. Moving straight from one monitored
    /// field to another yields `Left` followed by `Entered`.
    pub fn observe(&mut self, reading: Option<&FocusedElement>) -> Vec<FocusEvent> {
        let next = reading.and_then(|element| self.classify(element));

        let same = match (&self.current, &next) {
            (Some((cur_target, cur_focus)), Some(FocusEvent::Entered { target, focus, .. })) => {
                cur_target == target && cur_focus == focus
            }
            (None, None) => true,
            _ => false,
        };
        if same {
            return Vec::new();
        }

        let mut events = Vec::with_capacity(2);
        if self.current.take().is_some() {
            events.push(FocusEvent::Left);
        }
        if let Some(entered) = next {
            if let FocusEvent::Entered { target, focus, .. } = &entered {
                self.current = Some((target.clone(), *focus));
            }
            events.push(entered);
        }
        events
    }

    fn classify(&self, element: &FocusedElement) -> Option<FocusEvent> {
        let app = self.catalog.find(&element.bundle_id)?;
        if !app.accepts_role(&element.role) {
            return None;
        }
        // Sources that can't tell are given the benefit of the doubt; the
        // role check already says it's a text field.
        if element.editable == Some(false) {
            return None;
        }
        Some(FocusEvent::Entered {
            target: app.id(),
            focus: element.focus,
            context_tag: app.name.clone(),
        })
    }
}
