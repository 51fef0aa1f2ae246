pub mod decision;
pub mod descriptor;

pub use decision::*;
pub use descriptor::*;
