pub mod builder;
pub mod liquid_exts;
