//! Alternative preprocessing backends.

pub mod shaderc;
