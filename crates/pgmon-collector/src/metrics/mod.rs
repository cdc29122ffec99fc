pub mod render;
pub mod types;

pub use render::render_prometheus;
pub use types::{Desc, NAMESPACE, Sample, ValueType, build_fq_name};
