//! Remote control: vendor requests, instance routing and the stdio channel

mod instances;
mod stdio;
mod vendor;

pub use instances::InstanceRegistry;
pub use stdio::{serve_lines, serve_stdio};
pub use vendor::{
    register_source_requests, RequestHandler, VendorApi, VendorError, VendorRequest,
    VendorResponse, RELOAD_FILES_REQUEST, SPAWN_REQUEST, STATUS_REQUEST,
};
