pub(crate) mod comfy;
pub(crate) mod compressor;
pub(crate) mod endian;
pub(crate) mod error;
pub(crate) mod flags;
pub(crate) mod header;
pub(crate) mod reg_entry;
