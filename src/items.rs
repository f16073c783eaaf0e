use serde::{Deserialize, Serialize};

/// A quote scraped from one listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleItem {
    pub title: Option<String>,
    pub url: String,
    /// Author name; missing for anonymous quotes.
    pub description: Option<String>,
}
