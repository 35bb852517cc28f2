use morph_graph_lib::{HeteroGraph, MorphologicalGraph};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Row counts of a morphological graph, keyed by display names
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Summary {
    pub nodes: BTreeMap<String, usize>,
    pub edges: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hetero: Option<HeteroSummary>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HeteroSummary {
    pub nodes: usize,
    pub edges: usize,
}

impl Summary {
    pub fn new(graph: &MorphologicalGraph, hetero: Option<&HeteroGraph>) -> Self {
        Self {
            nodes: graph
                .nodes
                .iter()
                .map(|(kind, table)| (kind.to_string(), table.len()))
                .collect(),
            edges: graph
                .edges
                .iter()
                .map(|(edge_type, table)| (edge_type.to_string(), table.len()))
                .collect(),
            hetero: hetero.map(|h| HeteroSummary {
                nodes: h.node_count(),
                edges: h.edge_count(),
            }),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Nodes:")?;
        for (kind, count) in &self.nodes {
            writeln!(f, "  {kind:<10} {count}")?;
        }
        writeln!(f, "Edges:")?;
        for (edge_type, count) in &self.edges {
            writeln!(f, "  {edge_type:<34} {count}")?;
        }
        if let Some(hetero) = &self.hetero {
            writeln!(
                f,
                "Heterogeneous graph: {} nodes, {} edges",
                hetero.nodes, hetero.edges
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::grid_city;
    use morph_graph_lib::{MorphologyConfig, morphological_graph};

    #[test]
    fn test_summary_counts_and_json() {
        let (buildings, streets) = grid_city(2, 100.0, 1, None).unwrap();
        let graph = morphological_graph(&buildings, &streets, &MorphologyConfig::default()).unwrap();
        let summary = Summary::new(&graph, None);

        // 4 block cells plus the ring around the grid
        assert_eq!(summary.nodes["private"], 5);
        assert_eq!(summary.nodes["public"], 12);
        assert_eq!(summary.edges.len(), 3);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["nodes"]["public"], 12);
        assert!(json.get("hetero").is_none());
        assert!(summary.to_string().contains("(private, faced_to, public)"));
    }
}
