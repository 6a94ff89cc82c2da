use anyhow::Result;

use crate::formula::{Catalog, Formula};

/// Formulae whose name or description contains `query`, ignoring case.
pub fn search_formulae<C: Catalog>(catalog: &C, query: &str) -> Result<Vec<Formula>> {
    let query = query.to_lowercase();
    let mut found: Vec<Formula> = catalog
        .load_all()?
        .into_iter()
        .filter(|f| matches(&query, &f.name, &f.description))
        .collect();
    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
}

/// Case-insensitive substring match; `query` must already be lowercase.
pub(super) fn matches(query: &str, name: &str, description: &str) -> bool {
    name.to_lowercase().contains(query) || description.to_lowercase().contains(query)
}
