//! Application-wide constants.

pub const APP_NAME: &str = "osiris";

/// Result type segment of the storage prefix (`<deployment>/<RESULT_TYPE>`).
pub const RESULT_TYPE: &str = "build_aggregator";

/// Deployment segment of the storage prefix when none is configured.
pub const DEFAULT_DEPLOYMENT_NAME: &str = "multipurpose";

/// Verbosity passed to `oc logs --loglevel` when none is configured.
pub const DEFAULT_OC_LOG_LEVEL: u32 = 6;

/// Number of build records returned per listing page.
pub const RESULTS_PER_PAGE: usize = 20;

/// Ingestion endpoint used by the watcher when none is configured.
pub const DEFAULT_OSIRIS_HOST: &str = "http://0.0.0.0:5000";
