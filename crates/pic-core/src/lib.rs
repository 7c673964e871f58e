//! Per-partition particle management for particle-in-cell simulation.
//!
//! Storage and binning: store, bins, keys, sorter
//! Pipeline: fields, stage, graph, scheduler, operators
//! Drivers: species, partition, window, seeding

pub mod bins;
pub mod fields;
pub mod graph;
pub mod keys;
pub mod merging;
pub mod operators;
pub mod partition;
pub mod scheduler;
pub mod seeding;
pub mod sorter;
pub mod species;
pub mod stage;
pub mod store;
pub mod window;
