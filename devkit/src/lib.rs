/*!
# Slawatch DevKit - mock backend and test helpers

Lets the console layer be tested without the real prediction service:
- In-process HTTP backend with an in-memory alert store
  (same state machine and status codes as production)
- Request recording for assertions on headers and paths
- Fixtures for loosely-shaped telemetry payloads
*/

pub mod fixtures;
pub mod mock_backend;
pub mod test_utils;

pub use mock_backend::{MockBackend, RecordedRequest};
pub use test_utils::{init_logging, wait_until};
