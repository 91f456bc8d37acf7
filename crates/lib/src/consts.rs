//! Shared names and default locations.

/// Lock file created directly under the state root.
pub const LOCK_FILENAME: &str = "3rd-party.lock";

/// Per-bundle state lives under `<state root>/3rd-party/<identity>`.
pub const BUNDLES_STATE_DIRNAME: &str = "3rd-party";

/// Installed payloads live under `<content root>/chroot/<identity>`.
pub const CHROOT_DIRNAME: &str = "chroot";

/// Extension of the cached manifest sitting next to each content root.
pub const MANIFEST_EXTENSION: &str = "toml";

/// Manifest basename, both on the origin and inside an installed payload.
pub const MANIFEST_BASENAME: &str = "user-config.toml";

/// Root certificate basename, both on the origin and inside an installed payload.
pub const CERT_BASENAME: &str = "Swupd_Root.pem";

/// Top-level content items that are rebuilt in `.<item>` and swapped into place.
pub const STAGED_ITEMS: &[&str] = &["bin"];

pub const DEFAULT_STATE_DIR: &str = "/var/lib/swupd";
pub const DEFAULT_CONTENT_DIR: &str = "/var/lib/3rd-party";
pub const DEFAULT_FORMAT_FILE: &str = "/usr/share/defaults/swupd/format";
pub const DEFAULT_UPDATE_AGENT: &str = "swupd";
pub const DEFAULT_TRUST_VERIFIER: &str = "openssl";

pub const ENV_STATE_DIR: &str = "TPB_STATE_DIR";
pub const ENV_CONTENT_DIR: &str = "TPB_CONTENT_DIR";
pub const ENV_UPDATE_AGENT: &str = "TPB_SWUPD";
pub const ENV_BUNDLE_INSTALLER: &str = "TPB_BUNDLE_INSTALLER";
pub const ENV_TRUST_VERIFIER: &str = "TPB_OPENSSL";
pub const ENV_FORMAT_FILE: &str = "TPB_FORMAT_FILE";
