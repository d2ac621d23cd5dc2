//! Local servers that publish the display content.

pub mod docker;
pub mod embedded;

use std::sync::Arc;
use crate::capabilities::ContentEndpoint;
use crate::config::{EndpointConfig, EndpointRuntime, Timeouts};

pub use docker::DockerEndpoint;
pub use embedded::EmbeddedEndpoint;

pub fn from_config(config: &EndpointConfig, timeouts: &Timeouts) -> Arc<dyn ContentEndpoint> {
    match config.runtime {
        EndpointRuntime::Embedded => Arc::new(EmbeddedEndpoint::new(config.content_dir.clone())),
        EndpointRuntime::Docker => Arc::new(DockerEndpoint::new(
            config.container_name.clone(),
            config.image.clone(),
            config.content_dir.clone(),
            timeouts.endpoint_start,
        )),
    }
}
