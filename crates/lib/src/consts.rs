pub const APP_NAME: &str = "bramble";

/// Name of the workspace configuration file.
pub const CONFIG_FILENAME: &str = "bramble.toml";

/// Marker file whose presence makes a directory a package.
pub const BUILD_FILE_NAME: &str = "BUILD";

/// Marker file identifying the root of the workspace.
pub const WORKSPACE_FILE_NAME: &str = "WORKSPACE";

/// Reserved package name in the main repository that resolves to the workspace root.
pub const EXTERNAL_PACKAGE_NAME: &str = "external";

/// Placeholder in `package_path` entries replaced by the config file's directory.
pub const WORKSPACE_PLACEHOLDER: &str = "%workspace%";

pub const ENV_PACKAGE_PATH: &str = "BRAMBLE_PACKAGE_PATH";
pub const ENV_DELETED_PACKAGES: &str = "BRAMBLE_DELETED_PACKAGES";
pub const ENV_JOBS: &str = "BRAMBLE_JOBS";
