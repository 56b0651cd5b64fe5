/// Module label of the placeholder reading written when a printer does not
/// answer the supplies walk. The dashboard keys its "off" indicator on it.
pub const OFF_MODULE: &str = "Printer seems to be off";

/// Level text paired with [`OFF_MODULE`].
pub const OFF_LEVEL: &str = "Not on";

/// Level text for a supply that is present but not percentage-tracked
pub const LEVEL_OK: &str = "OK";

/// Level text for a supply whose level is unknown or not applicable
pub const LEVEL_NA: &str = "NA";

/// Dashboard and form target
pub const HOME_PATH: &str = "/";

/// Triggers an immediate poll batch, then redirects home
pub const REFRESH_PATH: &str = "/refresh-toner";

/// API path prefix
pub const API_PREFIX: &str = "/v1";
