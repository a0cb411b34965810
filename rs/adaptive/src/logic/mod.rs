//! Seams toward the decision-making collaborators: quality selection (ABR) stays outside
//! the core, buffering policy ships with a default implementation.

mod adaptation;
mod buffering;

pub use adaptation::*;
pub use buffering::*;
