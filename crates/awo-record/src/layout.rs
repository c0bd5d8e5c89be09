pub const MANIFEST_FILE: &str = "run_manifest.json";
pub const PROVENANCE_FILE: &str = "provenance.json";
pub const INDEX_FILE: &str = "index.json";
pub const ENVIRONMENT_FILE: &str = "environment.json";
pub const REPORT_FILE: &str = "report.md";
pub const WORKFLOW_FROZEN_FILE: &str = "workflow_frozen.json";
pub const STEPS_DIR: &str = "steps";
pub const ARTIFACTS_DIR: &str = "artifacts";
pub const SCOPE_DIR: &str = "scope";
/// Lives under the runs root, not inside a run.
pub const BREADCRUMB_FILE: &str = "LAST_RUN";
