//! Party Room Server - authoritative match lifecycle for party-platformer rooms

pub mod config;
pub mod game;
pub mod session;
pub mod util;
