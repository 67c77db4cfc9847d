//! Reference city generator
//!
//! Lays out a rectangular grid of intersections joined by two-way streets.
//! Real generators produce richer geometry; this one exists for the headless
//! runner and tests.

use super::road_network::SimRoadNetwork;
use super::types::{NodeId, Position, DEFAULT_SPEED_LIMIT};

/// Rebuilds `network` as a `cols` x `rows` grid with `spacing` between
/// neighbouring intersections
///
/// Nodes are numbered row-major from the origin along +x then +z. Each
/// street carries a midpoint waypoint, so stitched paths exercise
/// multi-point lanes.
pub fn generate_grid_city(
    network: &mut SimRoadNetwork,
    cols: usize,
    rows: usize,
    spacing: f32,
) -> Vec<NodeId> {
    network.clear();

    let mut nodes = Vec::with_capacity(cols * rows);
    for row in 0..rows {
        for col in 0..cols {
            let position = Position::new(col as f32 * spacing, 0.0, row as f32 * spacing);
            nodes.push(network.create_node(position));
        }
    }

    for row in 0..rows {
        for col in 0..cols {
            let here = nodes[row * cols + col];
            if col + 1 < cols {
                connect(network, here, nodes[row * cols + col + 1]);
            }
            if row + 1 < rows {
                connect(network, here, nodes[(row + 1) * cols + col]);
            }
        }
    }

    network.rebuild_adjacency();
    nodes
}

fn connect(network: &mut SimRoadNetwork, a: NodeId, b: NodeId) {
    let (Some(start), Some(end)) = (network.node_position(a), network.node_position(b)) else {
        return;
    };
    let waypoints = vec![start, start.lerp(&end, 0.5), end];
    network.create_two_way_lane(a, b, waypoints, DEFAULT_SPEED_LIMIT);
}
