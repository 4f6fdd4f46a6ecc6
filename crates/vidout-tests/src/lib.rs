//! Integration test crate for VidOut.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It drives the overlay and port crates together through the public
//! port surface.

#[cfg(test)]
mod pipeline;

#[cfg(test)]
mod overlay;

#[cfg(test)]
mod properties;
