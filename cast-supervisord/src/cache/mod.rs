pub mod file;

pub use file::AddressCache;
