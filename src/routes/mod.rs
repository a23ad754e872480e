pub mod common;
pub mod crud;

pub use common::common_routes;
pub use crud::{build_state, crud_routes, CrudConfig};
