//! Contracts at the hardware boundary.

pub mod can_controller;
