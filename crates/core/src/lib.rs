//! CPU building blocks for retro-computing tools.
//!
//! The main component is the Intel 8086/8088 real-mode core in [`cpu_8086`].
//! [`config`] describes a machine (register presets, memory size, load
//! address) in JSON, and [`logging`] is the crate's leveled, rate-limited log
//! layer.

pub mod config;
pub mod cpu_8086;
pub mod logging;

/// A CPU-like component that can be stepped; returns cycles consumed.
pub trait Cpu {
    type Error: std::error::Error + Send + Sync + 'static;

    fn reset(&mut self);
    fn step(&mut self) -> Result<u32, Self::Error>;
}
