use serde::{Deserialize, Serialize};

use crate::models::TargetId;

const DEFAULT_TEXT_ROLES: [&str; 2] = ["AXTextArea", "AXTextField"];

/// A messaging application whose compose field is guarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetApp {
    pub name: String,
    pub bundle_id: String,
    /// Accessibility roles that count as a compose field in this app.
    #[serde(default = "default_text_roles")]
    pub text_field_roles: Vec<String>,
}

fn default_text_roles() -> Vec<String> {
    DEFAULT_TEXT_ROLES.iter().map(|r| r.to_string()).collect()
}

impl TargetApp {
    pub fn new(name: &str, bundle_id: &str) -> Self {
        Self {
            name: name.to_string(),
            bundle_id: bundle_id.to_string(),
            text_field_roles: default_text_roles(),
        }
    }

    pub fn id(&self) -> TargetId {
        TargetId::new(self.bundle_id.clone())
    }

    pub fn accepts_role(&self, role: &str) -> bool {
        self.text_field_roles.iter().any(|r| r == role)
    }
}

pub fn default_targets() -> Vec<TargetApp> {
    vec![
        TargetApp::new("Messages", "com.apple.MobileSMS"),
        TargetApp::new("Slack", "com.tinyspeck.slackmacgap"),
        TargetApp::new("Discord", "com.hnc.Discord"),
    ]
}

/// Lookup table over the configured targets.
#[derive(Debug, Clone)]
pub struct TargetCatalog {
    targets: Vec<TargetApp>,
}

impl TargetCatalog {
    pub fn new(targets: Vec<TargetApp>) -> Self {
        Self { targets }
    }

    pub fn find(&self, bundle_id: &str) -> Option<&TargetApp> {
        self.targets.iter().find(|t| t.bundle_id == bundle_id)
    }

    pub fn is_target(&self, bundle_id: &str) -> bool {
        self.find(bundle_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetApp> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl Default for TargetCatalog {
    fn default() -> Self {
        Self::new(default_targets())
    }
}
