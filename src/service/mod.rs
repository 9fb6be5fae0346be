pub mod leave;

pub use leave::{LeaveScope, LeaveService};
