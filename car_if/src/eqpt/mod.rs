//! # Equipment Interface
//!
//! This module defines the data produced by equipment feeding the control core.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod cam;
