//! Dependency listings for `grew deps`.

use std::collections::BTreeSet;

use anyhow::Result;

use crate::formula::Catalog;
use crate::resolver::{DependencyGraph, Resolver};

/// Every transitive dependency of `name`, sorted, without `name` itself.
pub fn flat_dependencies<C: Catalog>(catalog: &C, name: &str) -> Result<Vec<String>> {
    let graph = Resolver::new(catalog).graph(name)?;
    Ok(graph.formulae.into_keys().filter(|n| n != name).collect())
}

/// Box-drawing rendering of the dependency tree rooted at `name`.
///
/// A formula reached a second time is printed but not expanded again.
pub fn tree_lines<C: Catalog>(catalog: &C, name: &str) -> Result<Vec<String>> {
    let graph = Resolver::new(catalog).graph(name)?;
    let mut lines = vec![name.to_string()];
    let mut expanded = BTreeSet::from([name.to_string()]);
    render(&graph, name, "", &mut expanded, &mut lines);
    Ok(lines)
}

fn render(
    graph: &DependencyGraph,
    name: &str,
    prefix: &str,
    expanded: &mut BTreeSet<String>,
    lines: &mut Vec<String>,
) {
    let deps: Vec<&str> = graph.dependencies(name).collect();
    for (i, dep) in deps.iter().enumerate() {
        let last = i + 1 == deps.len();
        let branch = if last { "└── " } else { "├── " };
        lines.push(format!("{}{}{}", prefix, branch, dep));
        if expanded.insert(dep.to_string()) {
            let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
            render(graph, dep, &child_prefix, expanded, lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{formula, mock_catalog};

    fn diamond() -> crate::formula::MockCatalog {
        mock_catalog(vec![
            formula("app", "1.0", &["left", "right"]),
            formula("left", "1.0", &["base"]),
            formula("right", "1.0", &["base"]),
            formula("base", "1.0", &[]),
        ])
    }

    #[test]
    fn test_flat_dependencies() {
        let deps = flat_dependencies(&diamond(), "app").unwrap();
        assert_eq!(deps, vec!["base", "left", "right"]);
    }

    #[test]
    fn test_flat_dependencies_leaf() {
        assert!(flat_dependencies(&diamond(), "base").unwrap().is_empty());
    }

    #[test]
    fn test_tree_lines() {
        let lines = tree_lines(&diamond(), "app").unwrap();
        assert_eq!(
            lines,
            vec![
                "app",
                "├── left",
                "│   └── base",
                "└── right",
                "    └── base",
            ]
        );
    }

    #[test]
    fn test_tree_lines_repeat_not_expanded() {
        let catalog = mock_catalog(vec![
            formula("app", "1.0", &["lib", "tool"]),
            formula("tool", "1.0", &["lib"]),
            formula("lib", "1.0", &["zlib"]),
            formula("zlib", "1.0", &[]),
        ]);
        let lines = tree_lines(&catalog, "app").unwrap();
        assert_eq!(
            lines,
            vec![
                "app",
                "├── lib",
                "│   └── zlib",
                "└── tool",
                "    └── lib",
            ]
        );
    }

    #[test]
    fn test_missing_dependency() {
        let catalog = mock_catalog(vec![formula("app", "1.0", &["ghost"])]);
        let err = flat_dependencies(&catalog, "app").unwrap_err();
        assert_eq!(
            err.to_string(),
            "dependency \"ghost\" required by \"app\" not found"
        );
    }
}
