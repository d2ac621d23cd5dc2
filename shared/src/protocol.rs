/// Ports a cast receiver listens on for its control protocols (HTTP setup API, CASTV2 TLS)
pub const CAST_DISCOVERY_PORTS: [u16; 2] = [8008, 8009];

/// mDNS service type cast receivers advertise themselves under
pub const GOOGLECAST_SERVICE_TYPE: &str = "_googlecast._tcp.local.";

/// Receiver application used to render arbitrary web pages
pub const DASHCAST_APP_ID: &str = "84912283";
pub const DASHCAST_DISPLAY_NAME: &str = "DashCast";

/// Hostname the display is expected to register on the LAN
pub const DEFAULT_DEVICE_HOSTNAME: &str = "nest-hub";

/// Port the content endpoint is published on
pub const DEFAULT_ENDPOINT_PORT: u16 = 5500;
