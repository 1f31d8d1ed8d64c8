//! Ambient services shared by the beasybox binary: command line and
//! environment configuration, and terminal logging.

pub mod config;
pub mod logging;
