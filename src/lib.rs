//! Road Pursuit Library
//!
//! Directed road-network graphs, shortest-path search, and real-time
//! pursuit controllers for agents that follow the resulting paths.

pub mod simulation;
