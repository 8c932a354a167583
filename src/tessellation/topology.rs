//! Road network topology extraction
//!
//! Linestrips are tagged with the topology identifiers of their two
//! endpoints. Grouping all linestrips by those identifiers yields the
//! intersections of the network: an identifier claimed by a single
//! linestrip end is a dead end, one shared by two or more is a junction.
//! The grouping must be rebuilt after any structural change to the
//! linestrip list, because membership depends on the current endpoint
//! identifiers.

use indexmap::IndexMap;

use crate::geometry::{Linestrip, NO_TOPOLOGY_ID};

/// An intersection: a topology identifier plus the indices of all
/// linestrips touching it.
#[derive(Debug, Clone)]
pub struct Intersection {
    pub id: i32,
    pub linestrips: Vec<usize>,
}

/// The full intersection map of a linestrip set, with the dead ends and
/// junctions classified for the triangulation passes.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub intersections: Vec<Intersection>,
    /// Indices into `intersections` with two or more incident linestrips.
    pub junctions: Vec<usize>,
    /// Indices into `intersections` with exactly one incident linestrip.
    pub dead_ends: Vec<usize>,
}

/// Builds the intersection map of a linestrip set. Endpoints tagged with
/// [`NO_TOPOLOGY_ID`] are not part of the network and are discarded.
pub fn extract_intersections(linestrips: &[Linestrip]) -> Topology {
    let mut groups: IndexMap<i32, Vec<usize>> = IndexMap::new();
    for (i, linestrip) in linestrips.iter().enumerate() {
        groups.entry(linestrip.start_id).or_default().push(i);
        groups.entry(linestrip.end_id).or_default().push(i);
    }
    groups.shift_remove(&NO_TOPOLOGY_ID);

    let mut topology = Topology {
        intersections: Vec::with_capacity(groups.len()),
        ..Default::default()
    };
    for (id, members) in groups {
        let index = topology.intersections.len();
        if members.len() == 1 {
            topology.dead_ends.push(index);
        } else {
            topology.junctions.push(index);
        }
        topology.intersections.push(Intersection { id, linestrips: members });
    }
    topology
}

/// Union-find over linestrip indices with path compression, used to
/// collapse duplicate linestrips onto a single survivor.
#[derive(Debug)]
pub struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    pub fn new(size: usize) -> Self {
        UnionFind {
            parent: (0..size).collect(),
        }
    }

    pub fn find(&mut self, index: usize) -> usize {
        let mut root = index;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression
        let mut current = index;
        while self.parent[current] != root {
            current = std::mem::replace(&mut self.parent[current], root);
        }
        root
    }

    /// Makes `survivor` the representative of `doomed`'s set.
    pub fn union(&mut self, doomed: usize, survivor: usize) {
        let doomed_root = self.find(doomed);
        let survivor_root = self.find(survivor);
        self.parent[doomed_root] = survivor_root;
    }
}

/// Removes duplicate linestrips: for every two-member junction whose two
/// linestrips connect the exact same identifier pair (in either
/// direction), one of the two is dropped. Returns the reduced linestrip
/// list and the number of duplicates removed.
pub fn remove_duplicate_linestrips(
    linestrips: &[Linestrip],
    topology: &Topology,
) -> (Vec<Linestrip>, usize) {
    let mut duplicates = 0;
    let mut mapping = UnionFind::new(linestrips.len());

    for intersection in &topology.intersections {
        if intersection.linestrips.len() != 2 {
            continue;
        }
        let first = mapping.find(intersection.linestrips[0]);
        let second = mapping.find(intersection.linestrips[1]);
        if first == second {
            continue;
        }
        let a = &linestrips[first];
        let b = &linestrips[second];
        if (a.start_id == b.start_id && a.end_id == b.end_id)
            || (a.start_id == b.end_id && a.end_id == b.start_id)
        {
            duplicates += 1;
            mapping.union(first, second);
        }
    }

    let mut survivors: Vec<usize> = (0..linestrips.len()).map(|i| mapping.find(i)).collect();
    survivors.sort_unstable();
    survivors.dedup();

    let reduced = survivors.into_iter().map(|i| linestrips[i].clone()).collect();
    (reduced, duplicates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linestrip(start_id: i32, end_id: i32, indices: Vec<u32>) -> Linestrip {
        Linestrip {
            start_id,
            end_id,
            func_class: 0,
            indices,
        }
    }

    #[test]
    fn test_classifies_dead_ends_and_junctions() {
        // Three strips meeting at id 3, each with a free far end
        let linestrips = vec![
            linestrip(1, 3, vec![0, 1]),
            linestrip(3, 2, vec![1, 2]),
            linestrip(3, 4, vec![1, 3]),
        ];
        let topology = extract_intersections(&linestrips);
        assert_eq!(topology.junctions.len(), 1);
        assert_eq!(topology.dead_ends.len(), 3);

        let junction = &topology.intersections[topology.junctions[0]];
        assert_eq!(junction.id, 3);
        assert_eq!(junction.linestrips, vec![0, 1, 2]);
    }

    #[test]
    fn test_discards_unclassified_endpoints() {
        let linestrips = vec![linestrip(-1, 5, vec![0, 1]), linestrip(5, -1, vec![1, 2])];
        let topology = extract_intersections(&linestrips);
        assert_eq!(topology.intersections.len(), 1);
        assert_eq!(topology.intersections[0].id, 5);
    }

    #[test]
    fn test_every_networked_linestrip_appears_twice() {
        let linestrips = vec![
            linestrip(1, 2, vec![0, 1]),
            linestrip(2, 3, vec![1, 2]),
            linestrip(3, 1, vec![2, 0]),
        ];
        let topology = extract_intersections(&linestrips);
        let mut appearances = vec![0usize; linestrips.len()];
        for intersection in &topology.intersections {
            for &i in &intersection.linestrips {
                appearances[i] += 1;
            }
        }
        assert!(appearances.iter().all(|&count| count == 2));
    }

    #[test]
    fn test_removes_duplicate_pair() {
        // Two strips connecting 1 <-> 2, one reversed
        let linestrips = vec![
            linestrip(1, 2, vec![0, 1]),
            linestrip(2, 1, vec![1, 0]),
        ];
        let topology = extract_intersections(&linestrips);
        let (reduced, duplicates) = remove_duplicate_linestrips(&linestrips, &topology);
        assert_eq!(duplicates, 1);
        assert_eq!(reduced.len(), 1);
    }

    #[test]
    fn test_duplicate_removal_closure() {
        let linestrips = vec![
            linestrip(1, 2, vec![0, 1]),
            linestrip(1, 2, vec![0, 2]),
            linestrip(2, 3, vec![1, 3]),
        ];
        let topology = extract_intersections(&linestrips);
        let (reduced, duplicates) = remove_duplicate_linestrips(&linestrips, &topology);
        assert_eq!(duplicates, 1);

        // Rebuilding on the reduced list must reference only valid indices
        // and contain no remaining duplicate pair.
        let rebuilt = extract_intersections(&reduced);
        for intersection in &rebuilt.intersections {
            for &i in &intersection.linestrips {
                assert!(i < reduced.len());
            }
        }
        let (again, residual) = remove_duplicate_linestrips(&reduced, &rebuilt);
        assert_eq!(residual, 0);
        assert_eq!(again.len(), reduced.len());
    }

    #[test]
    fn test_union_find_path_compression() {
        let mut uf = UnionFind::new(4);
        uf.union(0, 1);
        uf.union(1, 2);
        uf.union(2, 3);
        assert_eq!(uf.find(0), 3);
        assert_eq!(uf.find(1), 3);
        assert_eq!(uf.find(3), 3);
    }
}
