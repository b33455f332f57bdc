//! Default constants for rosterlink configuration.
//!
//! Field names follow the provider roster layout; every one of them can be
//! overridden from the config file or environment.

// =============================================================================
// Roster Field Defaults
// =============================================================================

/// Business primary key of a roster row
pub const DEFAULT_PRIMARY_KEY: &str = "provider_id";

pub const FIRST_NAME: &str = "first_name";
pub const LAST_NAME: &str = "last_name";
pub const PRACTICE_PHONE: &str = "practice_phone";
pub const LICENSE_NUMBER: &str = "license_number";
pub const LICENSE_STATE: &str = "license_state";
pub const MEDICAL_SCHOOL: &str = "medical_school";
pub const RESIDENCY_PROGRAM: &str = "residency_program";

/// Roster field carrying the street number used by the NY fallback join
pub const HOUSE_NUMBER: &str = "house_no_p";

/// Registry field matched against [`HOUSE_NUMBER`]
pub const REGISTRY_HOUSE_NUMBER: &str = "house_no";

// =============================================================================
// Canonical Selection Defaults
// =============================================================================

/// Status field consulted when choosing a canonical record
pub const DEFAULT_STATUS_FIELD: &str = "status";

/// Status value that restricts canonical candidates when present in a cluster
pub const DEFAULT_ACTIVE_STATUS: &str = "Active";

// =============================================================================
// Match Key Defaults
// =============================================================================

pub const REASON_NAME_PHONE: &str = "name_phone";
pub const REASON_LICENSE: &str = "license";
pub const REASON_NAME_EDU: &str = "name_edu";

// =============================================================================
// Registry Linkage Defaults
// =============================================================================

/// Roster field that partitions canonical records by jurisdiction
pub const DEFAULT_JURISDICTION_FIELD: &str = "practice_state";

/// Roster field that partitions rows for the merge preview
pub const DEFAULT_PREVIEW_FIELD: &str = LICENSE_STATE;

/// Suffix appended to registry columns before joining
pub const DEFAULT_REGISTRY_SUFFIX: &str = "_gt";

/// Registry status column (before the suffix) used for distributions
pub const DEFAULT_REGISTRY_STATUS_FIELD: &str = "status";

// =============================================================================
// Identifier Validation Defaults
// =============================================================================

/// Roster field holding the national provider identifier
pub const DEFAULT_IDENTIFIER_FIELD: &str = "npi";

/// Boolean flag column appended by identifier validation
pub const DEFAULT_FLAG_FIELD: &str = "valid_npi";

// =============================================================================
// Environment
// =============================================================================

/// Prefix for environment overrides, e.g. `ROSTERLINK_MATCHING__PRIMARY_KEY`
pub const ENV_PREFIX: &str = "ROSTERLINK_";

/// Separator between nested keys in environment overrides
pub const ENV_SEPARATOR: &str = "__";

/// Environment variable naming the config file
pub const ENV_CONFIG_PATH: &str = "ROSTERLINK_CONFIG";
