//! Domain layer: manifests, job results and VCS type tags

pub mod entities;
pub mod value_objects;
