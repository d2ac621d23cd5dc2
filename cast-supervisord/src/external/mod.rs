//! Adapters that satisfy the capability traits by driving external tools.

pub mod catt;
pub mod command;
pub mod dns;
pub mod http;
pub mod mdns;
pub mod nmap;
pub mod ping;

pub use catt::CattClient;
pub use dns::GetentLookup;
pub use http::HttpEndpointProbe;
pub use mdns::MdnsScanner;
pub use nmap::NmapScanner;
pub use ping::PingProbe;
