//! Partnerships directory shown as a logo grid on the landing page.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnerCategory {
    Hardware,
    Software,
    Research,
    Community,
}

impl Display for PartnerCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PartnerCategory::Hardware => "Hardware",
            PartnerCategory::Software => "Software",
            PartnerCategory::Research => "Research",
            PartnerCategory::Community => "Community",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub name: String,
    pub category: PartnerCategory,
    /// Path or URL of the logo asset
    pub logo: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default)]
pub struct PartnerDirectory {
    partners: Vec<Partner>,
}

impl PartnerDirectory {
    pub fn new(partners: Vec<Partner>) -> Self {
        Self { partners }
    }

    /// Parses a JSON array of partners.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn active(&self) -> impl Iterator<Item = &Partner> {
        self.partners.iter().filter(|p| p.active)
    }

    /// Active featured partners, by name.
    pub fn featured(&self) -> Vec<&Partner> {
        let mut out: Vec<_> = self.active().filter(|p| p.featured).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Active partners grouped by category, each group ordered by name.
    pub fn by_category(&self) -> BTreeMap<PartnerCategory, Vec<&Partner>> {
        let mut groups: BTreeMap<PartnerCategory, Vec<&Partner>> = BTreeMap::new();
        for partner in self.active() {
            groups.entry(partner.category).or_default().push(partner);
        }
        for group in groups.values_mut() {
            group.sort_by(|a, b| a.name.cmp(&b.name));
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.partners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }
}
