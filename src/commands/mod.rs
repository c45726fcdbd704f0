pub mod convert;
pub mod inventory;
pub mod status;

/// Directory under the input or output root that holds run manifests.
pub const MANIFEST_DIR: &str = "manifests";

pub const INVENTORY_MANIFEST_FILE: &str = "markdown_inventory.json";

/// Run manifests are named `convert_run_<UTC compact timestamp>.json`.
pub const CONVERT_MANIFEST_PREFIX: &str = "convert_run_";
