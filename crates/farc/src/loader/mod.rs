pub(crate) mod archive;
pub(crate) mod comfy;
pub(crate) mod config;
pub(crate) mod resource;
