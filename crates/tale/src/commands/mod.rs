//! CLI command implementations.

pub(crate) mod normalize;
pub(crate) mod render;
pub(crate) mod scan;

pub(crate) use normalize::NormalizeArgs;
pub(crate) use render::RenderArgs;
pub(crate) use scan::ScanArgs;
