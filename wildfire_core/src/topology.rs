//! Topology Builder - the sensor graph and its relay channels.
//!
//! A topology is declared once (locations, undirected edges, one station,
//! one fire origin) and never changes afterwards. Channel derivation then
//! runs one randomized depth-first traversal from the station per target
//! node and records every hop of the discovered path as a directed
//! child -> parent channel:
//!
//! ```text
//!   target T          parent(T)           ...          station
//!      o ───channel───▶ o ───channel───▶ o ───────────▶ S
//! ```
//!
//! Because each traversal is randomized independently, a node commonly ends
//! up with several channel next-hops. The relay protocol uses that
//! redundancy to route around burned nodes.

use crate::error::ConfigError;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use tracing::debug;

/// Integer grid coordinate identifying a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    /// Creates a location.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Packs the coordinate into a 64-bit id (used to key random streams).
    pub fn stream_id(&self) -> u64 {
        ((self.x as u32 as u64) << 32) | self.y as u32 as u64
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for Location {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// Raw topology declaration, as handed over by a configuration loader.
///
/// Station and fire origin are lists so that a loader can pass through
/// whatever it read; [`Topology::build`] insists on exactly one of each.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyInput {
    /// Declared node locations
    pub locations: Vec<Location>,

    /// Undirected edges between declared locations
    pub edges: Vec<(Location, Location)>,

    /// Station declarations (must be exactly one)
    pub stations: Vec<Location>,

    /// Fire origin declarations (must be exactly one)
    pub fire_origins: Vec<Location>,
}

impl TopologyInput {
    /// Creates an empty declaration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a node.
    pub fn node(mut self, x: i32, y: i32) -> Self {
        self.locations.push(Location::new(x, y));
        self
    }

    /// Declares an undirected edge.
    pub fn edge(mut self, a: (i32, i32), b: (i32, i32)) -> Self {
        self.edges.push((a.into(), b.into()));
        self
    }

    /// Declares the station.
    pub fn station(mut self, x: i32, y: i32) -> Self {
        self.stations.push(Location::new(x, y));
        self
    }

    /// Declares the fire origin.
    pub fn fire(mut self, x: i32, y: i32) -> Self {
        self.fire_origins.push(Location::new(x, y));
        self
    }
}

/// Static description of one node: adjacency, channels and role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Node location (unique key)
    pub location: Location,

    /// Physically adjacent nodes (symmetric)
    pub neighbors: Vec<Location>,

    /// Directed next-hops toward the station
    pub channels: Vec<Location>,

    /// True for the single station node
    pub is_station: bool,
}

impl NodeSpec {
    fn new(location: Location) -> Self {
        Self {
            location,
            neighbors: Vec::new(),
            channels: Vec::new(),
            is_station: false,
        }
    }

    fn add_neighbor(&mut self, other: Location) {
        if !self.neighbors.contains(&other) {
            self.neighbors.push(other);
        }
    }

    fn add_channel(&mut self, next_hop: Location) {
        if !self.channels.contains(&next_hop) {
            self.channels.push(next_hop);
        }
    }
}

/// The validated node graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    /// All nodes, keyed (and iterated) by location
    nodes: BTreeMap<Location, NodeSpec>,

    /// The single station
    station: Location,

    /// Where the fire starts
    fire_origin: Location,
}

impl Topology {
    /// Builds the node graph from a declaration.
    ///
    /// Duplicate locations and duplicate edges collapse. Channels are left
    /// empty; call [`Topology::derive_channels`] afterwards.
    ///
    /// # Errors
    /// [`ConfigError`] when the station or fire origin is not declared
    /// exactly once, references an undeclared node, or when an edge
    /// references an undeclared node or loops onto itself.
    pub fn build(input: &TopologyInput) -> Result<Self, ConfigError> {
        let station = match input.stations.as_slice() {
            [station] => *station,
            other => return Err(ConfigError::StationCount(other.len())),
        };
        let fire_origin = match input.fire_origins.as_slice() {
            [origin] => *origin,
            other => return Err(ConfigError::FireOriginCount(other.len())),
        };

        let mut nodes: BTreeMap<Location, NodeSpec> = input
            .locations
            .iter()
            .map(|&location| (location, NodeSpec::new(location)))
            .collect();

        if !nodes.contains_key(&station) {
            return Err(ConfigError::UndeclaredStation(station));
        }
        if !nodes.contains_key(&fire_origin) {
            return Err(ConfigError::UndeclaredFireOrigin(fire_origin));
        }

        for &(from, to) in &input.edges {
            if from == to {
                return Err(ConfigError::SelfLoop(from));
            }
            for endpoint in [from, to] {
                if !nodes.contains_key(&endpoint) {
                    return Err(ConfigError::UndeclaredEdgeEndpoint {
                        from,
                        to,
                        missing: endpoint,
                    });
                }
            }
            if let Some(node) = nodes.get_mut(&from) {
                node.add_neighbor(to);
            }
            if let Some(node) = nodes.get_mut(&to) {
                node.add_neighbor(from);
            }
        }

        if let Some(node) = nodes.get_mut(&station) {
            node.is_station = true;
        }

        Ok(Self {
            nodes,
            station,
            fire_origin,
        })
    }

    /// Derives the channel routing structure.
    ///
    /// Replaces any previously derived channels. Nodes that cannot be
    /// reached from the station get none.
    pub fn derive_channels<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for node in self.nodes.values_mut() {
            node.channels.clear();
        }

        let targets: Vec<Location> = self.nodes.keys().copied().collect();
        for target in targets {
            if target == self.station {
                continue;
            }

            let Some(parents) = self.trace_from_station(target, rng) else {
                debug!(node = %target, "unreachable from station, no channel");
                continue;
            };

            let mut child = target;
            while child != self.station {
                let Some(&parent) = parents.get(&child) else {
                    break;
                };
                if let Some(node) = self.nodes.get_mut(&child) {
                    node.add_channel(parent);
                }
                child = parent;
            }
        }
    }

    /// Randomized depth-first traversal from the station, stopping at
    /// `target`. Returns the parent map, or `None` if `target` is never
    /// reached.
    fn trace_from_station<R: Rng + ?Sized>(
        &self,
        target: Location,
        rng: &mut R,
    ) -> Option<HashMap<Location, Location>> {
        let mut visited = HashSet::new();
        let mut parents = HashMap::new();
        let mut stack: Vec<(Location, Option<Location>)> = vec![(self.station, None)];

        while let Some((current, parent)) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(parent) = parent {
                parents.insert(current, parent);
            }
            if current == target {
                return Some(parents);
            }

            let mut next: Vec<Location> = self
                .neighbors(current)
                .iter()
                .copied()
                .filter(|n| !visited.contains(n))
                .collect();
            next.shuffle(rng);
            stack.extend(next.into_iter().map(|n| (n, Some(current))));
        }

        None
    }

    /// Returns the station location.
    pub fn station(&self) -> Location {
        self.station
    }

    /// Returns the fire origin location.
    pub fn fire_origin(&self) -> Location {
        self.fire_origin
    }

    /// Returns a node by location.
    pub fn node(&self, location: Location) -> Option<&NodeSpec> {
        self.nodes.get(&location)
    }

    /// Iterates over all nodes in location order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.values()
    }

    /// Returns the number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the topology has no nodes (never true once built).
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the neighbors of a node (empty for unknown locations).
    pub fn neighbors(&self, location: Location) -> &[Location] {
        self.nodes
            .get(&location)
            .map(|n| n.neighbors.as_slice())
            .unwrap_or(&[])
    }

    /// Returns the channel next-hops of a node (empty for unknown locations).
    pub fn channels(&self, location: Location) -> &[Location] {
        self.nodes
            .get(&location)
            .map(|n| n.channels.as_slice())
            .unwrap_or(&[])
    }

    /// Returns every node connected to the station, the station included.
    pub fn reachable_from_station(&self) -> BTreeSet<Location> {
        let mut seen = BTreeSet::from([self.station]);
        let mut frontier = vec![self.station];
        while let Some(current) = frontier.pop() {
            for &n in self.neighbors(current) {
                if seen.insert(n) {
                    frontier.push(n);
                }
            }
        }
        seen
    }

    /// Returns the nodes that can never relay to the station.
    pub fn unreachable(&self) -> Vec<Location> {
        let reachable = self.reachable_from_station();
        self.nodes
            .keys()
            .filter(|l| !reachable.contains(l))
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn line() -> TopologyInput {
        TopologyInput::new()
            .node(0, 0)
            .node(1, 0)
            .node(2, 0)
            .edge((0, 0), (1, 0))
            .edge((1, 0), (2, 0))
            .station(0, 0)
            .fire(2, 0)
    }

    fn grid(rows: i32, cols: i32) -> TopologyInput {
        let mut input = TopologyInput::new();
        for y in 0..rows {
            for x in 0..cols {
                input = input.node(x, y);
                if x + 1 < cols {
                    input = input.edge((x, y), (x + 1, y));
                }
                if y + 1 < rows {
                    input = input.edge((x, y), (x, y + 1));
                }
            }
        }
        input.station(0, 0).fire(cols - 1, rows - 1)
    }

    /// Follows channels with the relay rule (no burning nodes), returning
    /// the hops taken and whether the station was reached.
    fn relay_walk<R: Rng>(topology: &Topology, from: Location, rng: &mut R) -> (Vec<Location>, bool) {
        let mut visited = Vec::new();
        let mut current = from;
        loop {
            if current == topology.station() {
                return (visited, true);
            }
            let mut hops = topology.channels(current).to_vec();
            hops.shuffle(rng);
            let Some(next) = hops.into_iter().find(|h| !visited.contains(h)) else {
                return (visited, false);
            };
            visited.push(current);
            current = next;
        }
    }

    #[test]
    fn test_build_symmetric_neighbors() {
        let topology = Topology::build(&line()).unwrap();

        assert_eq!(topology.len(), 3);
        assert_eq!(topology.station(), Location::new(0, 0));
        assert_eq!(topology.fire_origin(), Location::new(2, 0));
        assert_eq!(topology.neighbors(Location::new(1, 0)).len(), 2);
        assert!(topology.node(Location::new(0, 0)).unwrap().is_station);
        assert!(!topology.node(Location::new(1, 0)).unwrap().is_station);

        for node in topology.nodes() {
            for n in &node.neighbors {
                assert!(topology.neighbors(*n).contains(&node.location));
            }
        }
    }

    #[test]
    fn test_duplicates_collapse() {
        let input = line().node(1, 0).edge((1, 0), (0, 0));
        let topology = Topology::build(&input).unwrap();

        assert_eq!(topology.len(), 3);
        assert_eq!(topology.neighbors(Location::new(0, 0)), &[Location::new(1, 0)]);
    }

    #[test]
    fn test_build_rejects_bad_references() {
        let missing_edge = line().edge((2, 0), (9, 9));
        assert_eq!(
            Topology::build(&missing_edge),
            Err(ConfigError::UndeclaredEdgeEndpoint {
                from: Location::new(2, 0),
                to: Location::new(9, 9),
                missing: Location::new(9, 9),
            })
        );

        let mut missing_station = line();
        missing_station.stations = vec![Location::new(5, 5)];
        assert_eq!(
            Topology::build(&missing_station),
            Err(ConfigError::UndeclaredStation(Location::new(5, 5)))
        );

        let mut missing_fire = line();
        missing_fire.fire_origins = vec![Location::new(-1, 0)];
        assert_eq!(
            Topology::build(&missing_fire),
            Err(ConfigError::UndeclaredFireOrigin(Location::new(-1, 0)))
        );

        let self_loop = line().edge((1, 0), (1, 0));
        assert_eq!(
            Topology::build(&self_loop),
            Err(ConfigError::SelfLoop(Location::new(1, 0)))
        );
    }

    #[test]
    fn test_build_requires_single_station_and_origin() {
        let two_stations = line().station(1, 0);
        assert_eq!(Topology::build(&two_stations), Err(ConfigError::StationCount(2)));

        let mut no_station = line();
        no_station.stations.clear();
        assert_eq!(Topology::build(&no_station), Err(ConfigError::StationCount(0)));

        let two_fires = line().fire(1, 0);
        assert_eq!(Topology::build(&two_fires), Err(ConfigError::FireOriginCount(2)));
    }

    #[test]
    fn test_line_channels_point_to_station() {
        let mut topology = Topology::build(&line()).unwrap();
        topology.derive_channels(&mut ChaCha8Rng::seed_from_u64(42));

        assert!(topology.channels(Location::new(0, 0)).is_empty());
        assert_eq!(topology.channels(Location::new(1, 0)), &[Location::new(0, 0)]);
        assert_eq!(topology.channels(Location::new(2, 0)), &[Location::new(1, 0)]);
    }

    #[test]
    fn test_disconnected_node_gets_no_channel() {
        let input = line().node(10, 10).node(11, 10).edge((10, 10), (11, 10));
        let mut topology = Topology::build(&input).unwrap();
        topology.derive_channels(&mut ChaCha8Rng::seed_from_u64(7));

        assert!(topology.channels(Location::new(10, 10)).is_empty());
        assert!(topology.channels(Location::new(11, 10)).is_empty());
        assert_eq!(
            topology.unreachable(),
            vec![Location::new(10, 10), Location::new(11, 10)]
        );
    }

    #[test]
    fn test_grid_accumulates_redundant_channels() {
        let mut topology = Topology::build(&grid(4, 4)).unwrap();
        topology.derive_channels(&mut ChaCha8Rng::seed_from_u64(3));

        let redundant = topology.nodes().filter(|n| n.channels.len() > 1).count();
        assert!(redundant > 0, "expected at least one node with several next-hops");
    }

    #[test]
    fn test_derivation_is_reproducible_per_seed() {
        let mut a = Topology::build(&grid(3, 5)).unwrap();
        let mut b = a.clone();
        a.derive_channels(&mut ChaCha8Rng::seed_from_u64(99));
        b.derive_channels(&mut ChaCha8Rng::seed_from_u64(99));

        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn prop_channel_guarantees(
            rows in 1i32..5,
            cols in 2i32..6,
            removed in proptest::collection::vec(any::<bool>(), 40),
            seed in any::<u64>(),
        ) {
            // Grid with some edges knocked out, possibly disconnecting it.
            let full = grid(rows, cols);
            let mut input = full.clone();
            input.edges = full
                .edges
                .iter()
                .enumerate()
                .filter(|(i, _)| !removed.get(*i).copied().unwrap_or(false))
                .map(|(_, e)| *e)
                .collect();

            let mut topology = Topology::build(&input).unwrap();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            topology.derive_channels(&mut rng);

            let reachable = topology.reachable_from_station();
            for node in topology.nodes() {
                if node.is_station {
                    prop_assert!(node.channels.is_empty());
                } else if reachable.contains(&node.location) {
                    prop_assert!(!node.channels.is_empty());
                } else {
                    prop_assert!(node.channels.is_empty());
                }

                for hop in &node.channels {
                    // Channels follow physical adjacency toward the station.
                    prop_assert!(node.neighbors.contains(hop));
                    prop_assert!(*hop == topology.station() || !topology.channels(*hop).is_empty());
                }

                let (hops, _) = relay_walk(&topology, node.location, &mut rng);
                prop_assert!(hops.len() <= topology.len());
                let distinct: HashSet<_> = hops.iter().collect();
                prop_assert_eq!(distinct.len(), hops.len());
            }
        }
    }

    #[test]
    fn test_tree_relay_always_reaches_station() {
        let mut topology = Topology::build(&line().node(3, 0).edge((2, 0), (3, 0))).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        topology.derive_channels(&mut rng);

        let (hops, delivered) = relay_walk(&topology, Location::new(3, 0), &mut rng);
        assert!(delivered);
        assert_eq!(hops.len(), 3);
    }
}
