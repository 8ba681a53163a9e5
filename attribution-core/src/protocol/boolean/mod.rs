pub mod comparison;
mod or;

pub use comparison::{compare_geq, compare_gt, equals_known, subtract};
pub use or::or;
