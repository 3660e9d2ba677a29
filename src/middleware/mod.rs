pub mod access;
pub mod headers;
