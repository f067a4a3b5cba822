//! Coordination helper service
//!
//! Workers share no memory, so the few things they must agree on go through
//! this small HTTP service:
//!
//! - `GET /ocm_token` vends a cached short-lived token
//! - `POST /{resource}_create_container_id` elects the single cluster creator
//! - `POST /write_{resource}_id`, `/write_svc_acc_id` and
//!   `/write_{resource}_config` append ids and connection configs to files
//!   read by the external cleanup tooling
//!
//! The service stops on its own once the run (plus a grace period) is over.

pub mod error;
pub mod routes;
pub mod server;
pub mod state;
pub mod store;

pub use error::HelperError;
pub use routes::router;
pub use server::HelperServer;
pub use state::HelperState;
pub use store::FileStore;
