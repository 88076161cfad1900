//! Kani proofs over the pool model's correction and queue invariants

#![cfg_attr(kani, feature(register_tool), register_tool(kanitool))]

pub mod sanitizer;
pub mod generators;
pub mod adversary;

#[cfg(kani)]
pub mod safety;
