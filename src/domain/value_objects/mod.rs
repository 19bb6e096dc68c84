pub mod vcs_type;

pub use vcs_type::{VcsType, VcsTypeError};
