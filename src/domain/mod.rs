pub mod ai;
pub mod coord;
pub mod entity;
pub mod layer;
pub mod rules;
pub mod tile;
