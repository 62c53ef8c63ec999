//! A typed multi-partite graph.
//!
//! Nodes are grouped into named compartments (`"species"`, `"nutrients"`) and edges into
//! named edge types (`"trophic"`, `"competition"`), each restricted to a pair of compartments.
//! The topology only grows: compartments can be extended but never shrink, and there are no
//! removal operations.

use crate::errors::{EndynError, EndynResult};
use ndarray::Array2;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Graph};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A node of the underlying graph: its compartment and its position within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub compartment: usize,
    pub index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Compartment {
    name: String,
    labels: Vec<String>,
    index: HashMap<String, usize>,
    nodes: Vec<NodeIndex>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EdgeType {
    name: String,
    source: usize,
    target: usize,
    n_edges: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    graph: Graph<NodeRef, usize, Directed>,
    compartments: Vec<Compartment>,
    edge_types: Vec<EdgeType>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    fn compartment_id(&self, name: &str) -> EndynResult<usize> {
        self.compartments
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| EndynError::Topology(format!("unknown node compartment {:?}", name)))
    }

    fn edge_type_id(&self, name: &str) -> EndynResult<usize> {
        self.edge_types
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| EndynError::Topology(format!("unknown edge type {:?}", name)))
    }

    /// Add a new named compartment holding the given labelled nodes.
    pub fn add_node_compartment<S: AsRef<str>>(
        &mut self,
        name: &str,
        labels: &[S],
    ) -> EndynResult<()> {
        if self.has_node_compartment(name) {
            return Err(EndynError::Topology(format!(
                "node compartment {:?} already exists",
                name
            )));
        }
        self.compartments.push(Compartment {
            name: name.to_string(),
            labels: vec![],
            index: HashMap::new(),
            nodes: vec![],
        });
        let id = self.compartments.len() - 1;
        // Undo the registration if the labels are invalid.
        if let Err(e) = self.push_nodes(id, labels) {
            self.compartments.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Append nodes to an existing compartment.
    pub fn extend_compartment<S: AsRef<str>>(
        &mut self,
        name: &str,
        labels: &[S],
    ) -> EndynResult<()> {
        let id = self.compartment_id(name)?;
        self.push_nodes(id, labels)
    }

    fn push_nodes<S: AsRef<str>>(&mut self, id: usize, labels: &[S]) -> EndynResult<()> {
        let compartment = &self.compartments[id];
        let mut seen = HashMap::new();
        for label in labels {
            let label = label.as_ref();
            if compartment.index.contains_key(label) || seen.insert(label, ()).is_some() {
                return Err(EndynError::Topology(format!(
                    "duplicate label {:?} in node compartment {:?}",
                    label, compartment.name
                )));
            }
        }

        for label in labels {
            let index = self.compartments[id].labels.len();
            let node = self.graph.add_node(NodeRef {
                compartment: id,
                index,
            });
            let compartment = &mut self.compartments[id];
            compartment.labels.push(label.as_ref().to_string());
            compartment.index.insert(label.as_ref().to_string(), index);
            compartment.nodes.push(node);
        }
        Ok(())
    }

    /// Declare a new edge type between two existing compartments.
    pub fn add_edge_type(&mut self, name: &str, between: (&str, &str)) -> EndynResult<()> {
        if self.has_edge_type(name) {
            return Err(EndynError::Topology(format!(
                "edge type {:?} already exists",
                name
            )));
        }
        let source = self.compartment_id(between.0)?;
        let target = self.compartment_id(between.1)?;
        self.edge_types.push(EdgeType {
            name: name.to_string(),
            source,
            target,
            n_edges: 0,
        });
        Ok(())
    }

    /// Add a single edge given local indices within the edge type's compartments.
    pub fn add_edge(&mut self, edge_type: &str, source: usize, target: usize) -> EndynResult<()> {
        let id = self.edge_type_id(edge_type)?;
        let (a, b) = self.endpoints(id, source, target)?;
        if self.find_edge(id, a, b).is_none() {
            self.graph.add_edge(a, b, id);
            self.edge_types[id].n_edges += 1;
        }
        Ok(())
    }

    /// Add every `true` entry of an adjacency matrix as an edge.
    ///
    /// The matrix shape must be `(|source compartment|, |target compartment|)`.
    pub fn add_edges(&mut self, edge_type: &str, adjacency: &Array2<bool>) -> EndynResult<()> {
        let id = self.edge_type_id(edge_type)?;
        let et = &self.edge_types[id];
        let expected = (
            self.compartments[et.source].labels.len(),
            self.compartments[et.target].labels.len(),
        );
        if adjacency.dim() != expected {
            return Err(EndynError::Topology(format!(
                "adjacency for edge type {:?} has shape {:?}, expected {:?}",
                edge_type,
                adjacency.dim(),
                expected
            )));
        }
        for ((i, j), &linked) in adjacency.indexed_iter() {
            if linked {
                self.add_edge(edge_type, i, j)?;
            }
        }
        Ok(())
    }

    fn endpoints(
        &self,
        edge_type: usize,
        source: usize,
        target: usize,
    ) -> EndynResult<(NodeIndex, NodeIndex)> {
        let et = &self.edge_types[edge_type];
        let src = &self.compartments[et.source];
        let tgt = &self.compartments[et.target];
        match (src.nodes.get(source), tgt.nodes.get(target)) {
            (Some(a), Some(b)) => Ok((*a, *b)),
            _ => Err(EndynError::Topology(format!(
                "edge ({}, {}) of type {:?} is outside compartments {:?} ({} nodes) and {:?} ({} nodes)",
                source,
                target,
                et.name,
                src.name,
                src.nodes.len(),
                tgt.name,
                tgt.nodes.len()
            ))),
        }
    }

    fn find_edge(&self, edge_type: usize, a: NodeIndex, b: NodeIndex) -> Option<EdgeIndex> {
        self.graph
            .edges_connecting(a, b)
            .find(|e| *e.weight() == edge_type)
            .map(|e| e.id())
    }

    pub fn has_node_compartment(&self, name: &str) -> bool {
        self.compartments.iter().any(|c| c.name == name)
    }

    pub fn has_edge_type(&self, name: &str) -> bool {
        self.edge_types.iter().any(|e| e.name == name)
    }

    pub fn n_nodes(&self, compartment: &str) -> EndynResult<usize> {
        Ok(self.compartments[self.compartment_id(compartment)?].labels.len())
    }

    pub fn labels(&self, compartment: &str) -> EndynResult<&[String]> {
        Ok(&self.compartments[self.compartment_id(compartment)?].labels)
    }

    pub fn node_index(&self, compartment: &str, label: &str) -> EndynResult<usize> {
        let c = &self.compartments[self.compartment_id(compartment)?];
        c.index.get(label).copied().ok_or_else(|| {
            EndynError::Topology(format!(
                "no node labelled {:?} in compartment {:?}",
                label, c.name
            ))
        })
    }

    pub fn has_edge(&self, edge_type: &str, source: usize, target: usize) -> EndynResult<bool> {
        let id = self.edge_type_id(edge_type)?;
        let (a, b) = self.endpoints(id, source, target)?;
        Ok(self.find_edge(id, a, b).is_some())
    }

    pub fn n_edges(&self, edge_type: &str) -> EndynResult<usize> {
        Ok(self.edge_types[self.edge_type_id(edge_type)?].n_edges)
    }

    /// All edges of a type as `(source, target)` local indices, sorted.
    pub fn edges(&self, edge_type: &str) -> EndynResult<Vec<(usize, usize)>> {
        let id = self.edge_type_id(edge_type)?;
        let mut edges: Vec<(usize, usize)> = self
            .graph
            .edge_references()
            .filter(|e| *e.weight() == id)
            .map(|e| (self.graph[e.source()].index, self.graph[e.target()].index))
            .collect();
        edges.sort_unstable();
        Ok(edges)
    }

    /// Dense adjacency matrix of an edge type.
    pub fn adjacency(&self, edge_type: &str) -> EndynResult<Array2<bool>> {
        let id = self.edge_type_id(edge_type)?;
        let et = &self.edge_types[id];
        let mut matrix = Array2::from_elem(
            (
                self.compartments[et.source].labels.len(),
                self.compartments[et.target].labels.len(),
            ),
            false,
        );
        for (i, j) in self.edges(edge_type)? {
            matrix[[i, j]] = true;
        }
        Ok(matrix)
    }

    pub fn compartment_names(&self) -> impl Iterator<Item = &str> {
        self.compartments.iter().map(|c| c.name.as_str())
    }

    pub fn edge_type_names(&self) -> impl Iterator<Item = &str> {
        self.edge_types.iter().map(|e| e.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn species_and_nutrients() -> Topology {
        let mut topology = Topology::new();
        topology
            .add_node_compartment("species", &["a", "b", "c"])
            .unwrap();
        topology
            .add_node_compartment("nutrients", &["n1", "n2"])
            .unwrap();
        topology
            .add_edge_type("trophic", ("species", "species"))
            .unwrap();
        topology
            .add_edge_type("uptake", ("species", "nutrients"))
            .unwrap();
        topology
    }

    #[test]
    fn add_edges_from_adjacency() {
        let mut topology = species_and_nutrients();
        let a = array![
            [false, false, false],
            [true, false, false],
            [true, true, false]
        ];
        topology.add_edges("trophic", &a).unwrap();

        assert_eq!(topology.n_edges("trophic").unwrap(), 3);
        assert_eq!(
            topology.edges("trophic").unwrap(),
            vec![(1, 0), (2, 0), (2, 1)]
        );
        assert_eq!(topology.adjacency("trophic").unwrap(), a);
        assert!(topology.has_edge("trophic", 2, 1).unwrap());
        assert!(!topology.has_edge("trophic", 1, 2).unwrap());
    }

    #[test]
    fn edges_stay_within_their_compartments() {
        let mut topology = species_and_nutrients();
        topology.add_edge("uptake", 0, 1).unwrap();
        assert!(topology.add_edge("uptake", 0, 2).is_err());
        assert!(topology.add_edge("uptake", 3, 0).is_err());

        let wrong_shape = Array2::from_elem((3, 3), true);
        assert!(topology.add_edges("uptake", &wrong_shape).is_err());
        assert_eq!(topology.n_edges("uptake").unwrap(), 1);
    }

    #[test]
    fn edge_types_are_independent() {
        let mut topology = species_and_nutrients();
        topology
            .add_edge_type("competition", ("species", "species"))
            .unwrap();
        topology.add_edge("trophic", 1, 0).unwrap();
        topology.add_edge("competition", 1, 0).unwrap();
        topology.add_edge("trophic", 1, 0).unwrap();

        assert_eq!(topology.n_edges("trophic").unwrap(), 1);
        assert_eq!(topology.n_edges("competition").unwrap(), 1);
        assert!(topology.has_edge_type("competition"));
        assert!(!topology.has_edge_type("refuge"));
    }

    #[test]
    fn compartments_grow_but_reject_duplicates() {
        let mut topology = species_and_nutrients();
        assert!(topology.add_node_compartment("species", &["d"]).is_err());
        assert!(topology.extend_compartment("species", &["a"]).is_err());
        assert!(topology.extend_compartment("species", &["d", "d"]).is_err());
        assert_eq!(topology.n_nodes("species").unwrap(), 3);

        topology.extend_compartment("species", &["d"]).unwrap();
        assert_eq!(topology.n_nodes("species").unwrap(), 4);
        assert_eq!(topology.node_index("species", "d").unwrap(), 3);
        assert_eq!(topology.labels("nutrients").unwrap(), &["n1", "n2"]);

        assert!(topology.add_node_compartment("bad", &["x", "x"]).is_err());
        assert!(!topology.has_node_compartment("bad"));
    }
}
