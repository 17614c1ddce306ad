//! The fixed set of document collections a question can be routed to.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CollectionEntry {
    pub name: String,
    pub description: String,
    /// Lowercase terms used by the keyword router.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl CollectionEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            keywords: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| (*k).to_owned()).collect();
        self
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog has no collections")]
    Empty,
    #[error("catalog entry {0} has an empty name")]
    EmptyName(usize),
    #[error("duplicate collection name in catalog: {0}")]
    Duplicate(String),
    #[error("default collection {0} is not in the catalog")]
    UnknownDefault(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Catalog {
    pub default_collection: String,
    #[serde(default)]
    pub collections: Vec<CollectionEntry>,
}

impl Catalog {
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the catalog is empty, a name is blank or repeated, or the
    /// default collection is not listed.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.collections.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::new();
        for (i, entry) in self.collections.iter().enumerate() {
            if entry.name.trim().is_empty() {
                return Err(CatalogError::EmptyName(i));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(CatalogError::Duplicate(entry.name.clone()));
            }
        }
        if !self.contains(&self.default_collection) {
            return Err(CatalogError::UnknownDefault(self.default_collection.clone()));
        }
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CollectionEntry> {
        self.collections.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.iter().map(|c| c.name.as_str())
    }

    /// One `- name: description` line per collection.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for entry in &self.collections {
            let _ = writeln!(out, "- {}: {}", entry.name, entry.description);
        }
        out
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            default_collection: "FAQs_DocuMedAi".into(),
            collections: vec![
                CollectionEntry::new(
                    "About_Us",
                    "Company background, mission, vision, founding story and overall philosophy.",
                )
                .with_keywords(&[
                    "company",
                    "mission",
                    "vision",
                    "founder",
                    "founded",
                    "story",
                    "who are you",
                ]),
                CollectionEntry::new(
                    "Business_Associate_Agreement",
                    "Legal agreement on Protected Health Information (PHI), HIPAA obligations of \
                     business associates, data ownership and training requirements.",
                )
                .with_keywords(&["baa", "business associate", "phi", "protected health"]),
                CollectionEntry::new(
                    "Consent_to_Use_DocuMed_AI_Scribe",
                    "Patient consent for the AI scribe, how it affects patients, and patient \
                     privacy during consultations.",
                )
                .with_keywords(&["consent", "patient", "patients", "consultation"]),
                CollectionEntry::new(
                    "DocuMed_Ai_Privacy_and_Security",
                    "Security practices, HIPAA compliance, encryption, cloud hosting and how AI \
                     models handle data.",
                )
                .with_keywords(&[
                    "security",
                    "secure",
                    "encryption",
                    "encrypted",
                    "hipaa",
                    "hosting",
                ]),
                CollectionEntry::new(
                    "FAQs_DocuMedAi",
                    "Primary document for general questions: functionality, basic pricing, \
                     account management and common troubleshooting.",
                )
                .with_keywords(&["account", "login", "password", "troubleshoot", "problem"]),
                CollectionEntry::new(
                    "How_it_Works",
                    "Scribe workflow, using the app, transcription, EMR integration and template \
                     customization.",
                )
                .with_keywords(&[
                    "how does",
                    "workflow",
                    "transcription",
                    "emr",
                    "template",
                    "record",
                ]),
                CollectionEntry::new(
                    "Our_Core_Values",
                    "Guiding principles, ethical stance on AI, commitment to independent \
                     practices and company values.",
                )
                .with_keywords(&["values", "principles", "ethics", "ethical"]),
                CollectionEntry::new(
                    "Pricing_Plan",
                    "Pricing, subscription tiers, included minutes and features per plan.",
                )
                .with_keywords(&[
                    "price",
                    "pricing",
                    "cost",
                    "plan",
                    "plans",
                    "subscription",
                    "minutes",
                ]),
                CollectionEntry::new(
                    "Privacy_Policy",
                    "Official privacy practices: data collection, usage, retention, user rights \
                     and cookies.",
                )
                .with_keywords(&["privacy", "cookie", "cookies", "retention", "personal data"]),
                CollectionEntry::new(
                    "Terms_of_Service",
                    "Legal terms of use, user agreements, communication consents, purchase \
                     conditions and intellectual property.",
                )
                .with_keywords(&[
                    "terms",
                    "agreement",
                    "intellectual property",
                    "refund",
                    "purchase",
                ]),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_is_valid() {
        let catalog = Catalog::default();
        assert_eq!(catalog.validate(), Ok(()));
        assert_eq!(catalog.collections.len(), 10);
        assert!(catalog.contains("Pricing_Plan"));
    }

    #[test]
    fn duplicate_names_rejected() {
        let catalog = Catalog {
            default_collection: "a".into(),
            collections: vec![
                CollectionEntry::new("a", "x"),
                CollectionEntry::new("a", "y"),
            ],
        };
        assert_eq!(catalog.validate(), Err(CatalogError::Duplicate("a".into())));
    }

    #[test]
    fn unknown_default_rejected() {
        let catalog = Catalog {
            default_collection: "missing".into(),
            collections: vec![CollectionEntry::new("a", "x")],
        };
        assert!(matches!(catalog.validate(), Err(CatalogError::UnknownDefault(_))));
    }

    #[test]
    fn empty_and_blank_names_rejected() {
        let empty = Catalog {
            default_collection: "a".into(),
            collections: Vec::new(),
        };
        assert_eq!(empty.validate(), Err(CatalogError::Empty));

        let blank = Catalog {
            default_collection: "a".into(),
            collections: vec![
                CollectionEntry::new("a", "x"),
                CollectionEntry::new(" ", "y"),
            ],
        };
        assert_eq!(blank.validate(), Err(CatalogError::EmptyName(1)));
    }

    #[test]
    fn describe_lists_every_collection() {
        let catalog = Catalog {
            default_collection: "a".into(),
            collections: vec![
                CollectionEntry::new("a", "first"),
                CollectionEntry::new("b", "second"),
            ],
        };
        assert_eq!(catalog.describe(), "- a: first\n- b: second\n");
    }
}
