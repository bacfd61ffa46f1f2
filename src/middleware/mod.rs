pub mod origin;

pub use origin::{OriginPolicy, origin_guard_middleware};
