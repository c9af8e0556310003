//! Sheet and level records
//!
//! A sheet is stored as its chunks (triangle plus deleted flag) and an
//! explicit adjacency list of `(a, edge_a, b, edge_b)` tuples. Importing
//! rebuilds the same graph, so the bare chunks and the outline come back
//! unchanged. A level is a list of sheets plus optional bounds and agent
//! placements.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tessellation::{ChunkGraph, ChunkId, Sheet, Triangle};

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("level parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("chunk id {0} appears more than once")]
    DuplicateChunk(u32),
    #[error("adjacency refers to unknown chunk id {0}")]
    UnknownChunk(u32),
    #[error("edge {edge} of chunk {chunk} is out of range")]
    BadEdge { chunk: u32, edge: usize },
    #[error("chunk {0} is listed as adjacent to itself")]
    SelfAdjacent(u32),
    #[error("max_area must be positive, got {0}")]
    BadMaxArea(f32),
}

/// A split threshold must be a positive number
pub fn is_valid_max_area(max_area: f32) -> bool {
    max_area > 0.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: u32,
    pub triangle: Triangle,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjacencyRecord {
    pub a: u32,
    pub edge_a: usize,
    pub b: u32,
    pub edge_b: usize,
}

/// One sheet, independent of any graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetRecord {
    /// Chunks below this area break off when bumped. `None` takes the
    /// world's `default_max_area` on load; a bare import never splits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_area: Option<f32>,
    pub chunks: Vec<ChunkRecord>,
    #[serde(default)]
    pub adjacency: Vec<AdjacencyRecord>,
}

impl SheetRecord {
    /// Axis-aligned rectangle made of two triangles
    pub fn rectangle(min: Vec2, max: Vec2, max_area: f32) -> Self {
        let (lo_hi, hi_lo) = (Vec2::new(min.x, max.y), Vec2::new(max.x, min.y));
        Self {
            max_area: Some(max_area),
            chunks: vec![
                ChunkRecord {
                    id: 0,
                    triangle: Triangle::new(min, lo_hi, max),
                    deleted: false,
                },
                ChunkRecord {
                    id: 1,
                    triangle: Triangle::new(min, max, hi_lo),
                    deleted: false,
                },
            ],
            adjacency: vec![AdjacencyRecord {
                a: 0,
                edge_a: 2,
                b: 1,
                edge_b: 0,
            }],
        }
    }

    /// Check ids, edge indices and `max_area` without touching a graph
    pub fn validate(&self) -> Result<(), LevelError> {
        if let Some(max_area) = self.max_area
            && !is_valid_max_area(max_area)
        {
            return Err(LevelError::BadMaxArea(max_area));
        }
        let mut ids = BTreeSet::new();
        for chunk in &self.chunks {
            if !ids.insert(chunk.id) {
                return Err(LevelError::DuplicateChunk(chunk.id));
            }
        }
        for adj in &self.adjacency {
            for (id, edge) in [(adj.a, adj.edge_a), (adj.b, adj.edge_b)] {
                if !ids.contains(&id) {
                    return Err(LevelError::UnknownChunk(id));
                }
                if edge >= 3 {
                    return Err(LevelError::BadEdge { chunk: id, edge });
                }
            }
            if adj.a == adj.b {
                return Err(LevelError::SelfAdjacent(adj.a));
            }
        }
        Ok(())
    }

    /// Rebuild this sheet's chunks in `graph`.
    ///
    /// The root is the first alive chunk in record order. Returns `None` if
    /// no chunk is alive. Tuples for pairs that are already linked (the same
    /// pair listed from both sides) are skipped. The graph is untouched when
    /// validation fails.
    pub fn import(&self, graph: &mut ChunkGraph) -> Result<Option<Sheet>, LevelError> {
        self.validate()?;

        let mut ids: BTreeMap<u32, ChunkId> = BTreeMap::new();
        let mut root = None;
        for record in &self.chunks {
            let chunk = graph.insert(record.triangle);
            if record.deleted {
                graph.set_deleted(chunk);
            } else if root.is_none() {
                root = Some(chunk);
            }
            ids.insert(record.id, chunk);
        }

        for adj in &self.adjacency {
            let (Some(&a), Some(&b)) = (ids.get(&adj.a), ids.get(&adj.b)) else {
                continue;
            };
            if graph.index_of_edge_adjacent(a, b).is_none() {
                graph.link(a, adj.edge_a, b, adj.edge_b);
            }
        }

        let max_area = self.max_area.unwrap_or(f32::MAX);
        Ok(root.map(|root| Sheet::new(root).with_max_area(max_area)))
    }
}

impl Sheet {
    /// Record of this sheet: every reachable chunk including deleted ones,
    /// root first, and each adjacency between exported chunks once
    pub fn export(&mut self, graph: &ChunkGraph) -> SheetRecord {
        let root = self.root();
        let mut order = vec![root];
        order.extend(self.chunks_including_deleted(graph).iter().copied().filter(|&c| c != root));
        let ids: BTreeMap<ChunkId, u32> =
            order.iter().enumerate().map(|(i, &c)| (c, i as u32)).collect();

        let chunks = order
            .iter()
            .map(|&c| ChunkRecord {
                id: ids[&c],
                triangle: *graph.triangle(c),
                deleted: graph.is_deleted(c),
            })
            .collect();

        let mut adjacency = Vec::new();
        for &c in &order {
            let a = ids[&c];
            for edge_a in 0..3 {
                for link in graph.chunk(c).links_on_edge(edge_a) {
                    match ids.get(&link.chunk) {
                        Some(&b) if a < b => adjacency.push(AdjacencyRecord {
                            a,
                            edge_a,
                            b,
                            edge_b: link.edge,
                        }),
                        _ => {}
                    }
                }
            }
        }

        SheetRecord {
            max_area: Some(self.max_area()),
            chunks,
            adjacency,
        }
    }
}

/// Playable area; walls are built just outside it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    /// Four clockwise wall rectangles of the given thickness framing the
    /// bounds: left, right, bottom, top
    pub fn walls(&self, thickness: f32) -> [[Vec2; 4]; 4] {
        let (min, max, t) = (self.min, self.max, thickness);
        let rect = |lo: Vec2, hi: Vec2| [lo, Vec2::new(lo.x, hi.y), hi, Vec2::new(hi.x, lo.y)];
        [
            rect(Vec2::new(min.x - t, min.y - t), Vec2::new(min.x, max.y + t)),
            rect(Vec2::new(max.x, min.y - t), Vec2::new(max.x + t, max.y + t)),
            rect(Vec2::new(min.x, min.y - t), Vec2::new(max.x, min.y)),
            rect(Vec2::new(min.x, max.y), Vec2::new(max.x, max.y + t)),
        ]
    }
}

/// Square agent of side `size`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentPlacement {
    pub position: Vec2,
    #[serde(default)]
    pub angle: f32,
    pub size: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Level {
    #[serde(default)]
    pub sheets: Vec<SheetRecord>,
    #[serde(default)]
    pub bounds: Option<Bounds>,
    #[serde(default)]
    pub agents: Vec<AgentPlacement>,
}

impl Level {
    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, LevelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LevelError> {
        let level = Self::from_json(&fs::read_to_string(path.as_ref())?)?;
        log::info!("Loaded level from {}", path.as_ref().display());
        Ok(level)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LevelError> {
        fs::write(path.as_ref(), self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn v(x: f32, y: f32) -> Vec2 {
        Vec2::new(x, y)
    }

    fn same_loop(a: &[Vec2], b: &[Vec2]) -> bool {
        let n = a.len();
        n == b.len() && (n == 0 || (0..n).any(|k| (0..n).all(|i| a[(i + k) % n] == b[i])))
    }

    fn triangles(graph: &ChunkGraph, chunks: &BTreeSet<ChunkId>) -> Vec<Triangle> {
        chunks.iter().map(|&c| *graph.triangle(c)).collect()
    }

    fn same_triangles(a: &[Triangle], b: &[Triangle]) -> bool {
        a.len() == b.len() && a.iter().all(|t| b.contains(t))
    }

    /// Import `record` into a fresh graph and check it matches `sheet`
    fn assert_round_trip(graph: &ChunkGraph, sheet: &mut Sheet, record: &SheetRecord) {
        let mut copy_graph = ChunkGraph::new();
        let mut copy = record.import(&mut copy_graph).unwrap().unwrap();

        assert_eq!(copy.max_area(), sheet.max_area());
        assert!(same_triangles(
            &triangles(graph, sheet.bare_chunks(graph)),
            &triangles(&copy_graph, copy.bare_chunks(&copy_graph)),
        ));
        assert!(same_triangles(
            &triangles(graph, sheet.chunks_including_deleted(graph)),
            &triangles(&copy_graph, copy.chunks_including_deleted(&copy_graph)),
        ));
        assert!(same_loop(sheet.perimeter(graph), copy.perimeter(&copy_graph)));
    }

    #[test]
    fn test_round_trip_with_deleted_neighbor() {
        let mut graph = ChunkGraph::new();
        let big = graph.insert(Triangle::new(v(0.0, 0.0), v(0.0, 2.0), v(2.0, 0.0)));
        let low = graph.insert(Triangle::new(v(0.0, 1.0), v(0.0, 0.0), v(-1.0, 0.5)));
        let high = graph.insert(Triangle::new(v(0.0, 2.0), v(0.0, 1.0), v(-1.0, 1.5)));
        graph.link(big, 0, low, 0);
        graph.link(big, 0, high, 0);
        graph.set_deleted(high);
        let mut sheet = Sheet::new(big).with_max_area(0.25);

        let record = sheet.export(&graph);
        assert_eq!(record.chunks.len(), 3);
        assert_eq!(record.chunks[0].triangle, *graph.triangle(big));
        assert_eq!(record.chunks.iter().filter(|c| c.deleted).count(), 1);
        assert_eq!(record.adjacency.len(), 2);
        assert_eq!(record.max_area, Some(0.25));

        assert_round_trip(&graph, &mut sheet, &record);
    }

    #[test]
    fn test_round_trip_after_breaking() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut graph = ChunkGraph::new();
        let record = SheetRecord::rectangle(v(0.0, 0.0), v(4.0, 2.0), 0.5);
        let mut sheet = record.import(&mut graph).unwrap().unwrap();

        for _ in 0..6 {
            let root = sheet.root();
            sheet.random_binary_division(&mut graph, root, &mut rng);
        }
        let victim = *sheet.bare_chunks(&graph).iter().next().unwrap();
        let mut sheet = sheet.remove_chunks(&mut graph, &[victim]).remove(0);

        let record = sheet.export(&graph);
        assert!(record.chunks.iter().any(|c| c.deleted));
        assert_round_trip(&graph, &mut sheet, &record);

        // And once more through JSON
        let json = serde_json::to_string(&record).unwrap();
        let back: SheetRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_export_skips_unreachable_neighbors() {
        let mut graph = ChunkGraph::new();
        let a = graph.insert(Triangle::new(v(0.0, 0.0), v(0.0, 1.0), v(1.0, 1.0)));
        let b = graph.insert(Triangle::new(v(0.0, 0.0), v(1.0, 1.0), v(1.0, 0.0)));
        let c = graph.insert(Triangle::new(v(1.0, 0.0), v(1.0, 1.0), v(2.0, 0.0)));
        graph.link(a, 2, b, 0);
        graph.link(b, 1, c, 0);
        graph.set_deleted(b);

        let mut sheet = Sheet::new(a);
        let record = sheet.export(&graph);
        // b is exported as a deleted chunk, c is only reachable through it
        assert_eq!(record.chunks.len(), 2);
        assert_eq!(record.adjacency.len(), 1);
        assert_eq!(record.max_area, Some(f32::MAX));
    }

    #[test]
    fn test_import_skips_repeated_pairs() {
        let mut record = SheetRecord::rectangle(v(0.0, 0.0), v(1.0, 1.0), 1.0);
        record.adjacency.push(AdjacencyRecord {
            a: 1,
            edge_a: 0,
            b: 0,
            edge_b: 2,
        });
        let mut graph = ChunkGraph::new();
        let mut sheet = record.import(&mut graph).unwrap().unwrap();
        assert_eq!(sheet.chunks(&graph).len(), 2);
        assert_eq!(sheet.perimeter(&graph).len(), 4);
    }

    #[test]
    fn test_import_all_deleted_is_none() {
        let mut record = SheetRecord::rectangle(v(0.0, 0.0), v(1.0, 1.0), 1.0);
        for chunk in &mut record.chunks {
            chunk.deleted = true;
        }
        let mut graph = ChunkGraph::new();
        assert!(record.import(&mut graph).unwrap().is_none());
    }

    #[test]
    fn test_root_is_first_alive_record() {
        let mut record = SheetRecord::rectangle(v(0.0, 0.0), v(1.0, 1.0), 1.0);
        record.chunks[0].deleted = true;
        let mut graph = ChunkGraph::new();
        let sheet = record.import(&mut graph).unwrap().unwrap();
        assert_eq!(*graph.triangle(sheet.root()), record.chunks[1].triangle);
    }

    #[test]
    fn test_validation_errors() {
        let base = SheetRecord::rectangle(v(0.0, 0.0), v(1.0, 1.0), 1.0);

        let mut dup = base.clone();
        dup.chunks[1].id = 0;
        assert!(matches!(dup.validate(), Err(LevelError::DuplicateChunk(0))));

        let mut unknown = base.clone();
        unknown.adjacency[0].a = 7;
        assert!(matches!(unknown.validate(), Err(LevelError::UnknownChunk(7))));

        let mut edge = base.clone();
        edge.adjacency[0].edge_b = 3;
        assert!(matches!(edge.validate(), Err(LevelError::BadEdge { chunk: 1, edge: 3 })));

        let mut itself = base.clone();
        itself.adjacency[0].b = 0;
        assert!(matches!(itself.validate(), Err(LevelError::SelfAdjacent(0))));

        let mut area = base.clone();
        area.max_area = Some(0.0);
        assert!(matches!(area.validate(), Err(LevelError::BadMaxArea(_))));
        area.max_area = Some(-1.0);
        assert!(matches!(area.validate(), Err(LevelError::BadMaxArea(_))));
        area.max_area = Some(f32::NAN);
        assert!(matches!(area.validate(), Err(LevelError::BadMaxArea(_))));

        // Failed imports leave the graph alone
        let mut graph = ChunkGraph::new();
        assert!(unknown.import(&mut graph).is_err());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_unsplittable_sheet_survives_json() {
        let mut graph = ChunkGraph::new();
        let a = graph.insert(Triangle::new(v(0.0, 0.0), v(0.0, 1.0), v(1.0, 1.0)));
        let mut sheet = Sheet::new(a);
        assert_eq!(sheet.max_area(), f32::MAX);

        let level = Level {
            sheets: vec![sheet.export(&graph)],
            ..Default::default()
        };
        let back = Level::from_json(&level.to_json().unwrap()).unwrap();
        assert_eq!(back.sheets[0].max_area, Some(f32::MAX));
        let copy = back.sheets[0].import(&mut ChunkGraph::new()).unwrap().unwrap();
        assert_eq!(copy.max_area(), f32::MAX);
    }

    #[test]
    fn test_level_json() {
        let json = r#"{
            "sheets": [{
                "max_area": 0.5,
                "chunks": [
                    { "id": 10, "triangle": [[0, 0], [0, 1], [1, 1]] },
                    { "id": 20, "triangle": [[0, 0], [1, 1], [1, 0]], "deleted": true }
                ],
                "adjacency": [{ "a": 10, "edge_a": 2, "b": 20, "edge_b": 0 }]
            }],
            "bounds": { "min": [-5, -5], "max": [5, 5] },
            "agents": [{ "position": [-3, 0], "size": 0.5 }]
        }"#;
        let level = Level::from_json(json).unwrap();
        assert_eq!(level.sheets.len(), 1);
        assert!(level.sheets[0].chunks[1].deleted);
        assert_eq!(level.agents[0].angle, 0.0);

        let back = Level::from_json(&level.to_json().unwrap()).unwrap();
        assert_eq!(back, level);

        assert!(matches!(Level::from_json("{ \"sheets\": 3 }"), Err(LevelError::Parse(_))));
    }

    #[test]
    fn test_walls_frame_bounds() {
        let bounds = Bounds {
            min: v(0.0, 0.0),
            max: v(10.0, 4.0),
        };
        let walls = bounds.walls(1.0);
        assert_eq!(walls[0], [v(-1.0, -1.0), v(-1.0, 5.0), v(0.0, 5.0), v(0.0, -1.0)]);
        assert_eq!(walls[3], [v(0.0, 4.0), v(0.0, 5.0), v(10.0, 5.0), v(10.0, 4.0)]);
        for wall in walls {
            assert!(Triangle::new(wall[0], wall[1], wall[2]).is_clockwise());
        }
    }
}
