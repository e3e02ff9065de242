//! Asset registry records and the field-level update allow-list.
//!
//! The registry owns no lifecycle logic; it only guards identity fields.
//! State changes go through [`crate::engine::TransitionEngine`].

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::lifecycle::{AssetState, AssetType};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum asset number length.
pub const MAX_ASSET_NUMBER_LENGTH: usize = 32;

/// Maximum length of free-text location / assignee fields.
pub const MAX_TEXT_FIELD_LENGTH: usize = 200;

/// Fields a bulk field update is allowed to touch.
pub const FIELD_LOCATION: &str = "location";
pub const FIELD_ASSIGNED_TO: &str = "assigned_to";
pub const FIELD_ASSIGNMENT_TYPE: &str = "assignment_type";

pub const BULK_UPDATABLE_FIELDS: &[&str] =
    &[FIELD_LOCATION, FIELD_ASSIGNED_TO, FIELD_ASSIGNMENT_TYPE];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How an asset is held by its assignee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentType {
    Individual,
    Shared,
}

impl AssignmentType {
    /// Convert to the database string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "INDIVIDUAL",
            Self::Shared => "SHARED",
        }
    }

    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, String> {
        match s {
            "INDIVIDUAL" => Ok(Self::Individual),
            "SHARED" => Ok(Self::Shared),
            _ => Err(format!(
                "Invalid assignment type '{s}'. Must be one of: INDIVIDUAL, SHARED"
            )),
        }
    }
}

/// A tracked physical asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Asset {
    pub id: DbId,
    pub asset_number: String,
    pub asset_type: AssetType,
    pub state: AssetState,
    pub assigned_to: Option<String>,
    pub assignment_type: Option<AssignmentType>,
    pub location: Option<String>,
    /// Optimistic-concurrency tag; bumped on every write.
    pub version: i64,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Asset {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Input for registering a new asset.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAsset {
    pub asset_number: String,
    pub asset_type: AssetType,
    /// Creation state. Defaults to the type's initial state.
    pub state: Option<AssetState>,
    pub assigned_to: Option<String>,
    pub assignment_type: Option<AssignmentType>,
    pub location: Option<String>,
}

/// Allow-listed field changes applied by a bulk field update.
///
/// The outer `Option` means "leave unchanged"; `Some(None)` clears the
/// column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssetFieldUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_type: Option<Option<AssignmentType>>,
}

impl AssetFieldUpdate {
    /// Pick the allow-listed keys out of an untyped field map.
    ///
    /// Keys outside [`BULK_UPDATABLE_FIELDS`] are ignored. Allow-listed keys
    /// with a value of the wrong shape are a validation error.
    pub fn from_fields(
        fields: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, CoreError> {
        let mut update = Self::default();

        for (key, value) in fields {
            match key.as_str() {
                FIELD_LOCATION => update.location = Some(text_field(key, value)?),
                FIELD_ASSIGNED_TO => update.assigned_to = Some(text_field(key, value)?),
                FIELD_ASSIGNMENT_TYPE => {
                    let parsed = match value {
                        serde_json::Value::Null => None,
                        serde_json::Value::String(s) => Some(
                            AssignmentType::from_str_value(s).map_err(CoreError::Validation)?,
                        ),
                        _ => {
                            return Err(CoreError::Validation(format!(
                                "Field '{key}' must be a string or null"
                            )))
                        }
                    };
                    update.assignment_type = Some(parsed);
                }
                _ => {}
            }
        }

        Ok(update)
    }

    pub fn is_empty(&self) -> bool {
        self.location.is_none() && self.assigned_to.is_none() && self.assignment_type.is_none()
    }

    /// Apply the change to an in-memory record.
    pub fn apply_to(&self, asset: &mut Asset) {
        if let Some(location) = &self.location {
            asset.location = location.clone();
        }
        if let Some(assigned_to) = &self.assigned_to {
            asset.assigned_to = assigned_to.clone();
        }
        if let Some(assignment_type) = self.assignment_type {
            asset.assignment_type = assignment_type;
        }
    }
}

fn text_field(key: &str, value: &serde_json::Value) -> Result<Option<String>, CoreError> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.chars().count() > MAX_TEXT_FIELD_LENGTH {
                return Err(CoreError::Validation(format!(
                    "Field '{key}' exceeds {MAX_TEXT_FIELD_LENGTH} characters"
                )));
            }
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        _ => Err(CoreError::Validation(format!(
            "Field '{key}' must be a string or null"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a human-facing asset number: 1-32 ASCII letters, digits, `-`
/// or `_`.
pub fn validate_asset_number(asset_number: &str) -> Result<(), CoreError> {
    if asset_number.is_empty() {
        return Err(CoreError::Validation("Asset number must not be empty".into()));
    }
    if asset_number.len() > MAX_ASSET_NUMBER_LENGTH {
        return Err(CoreError::Validation(format!(
            "Asset number exceeds {MAX_ASSET_NUMBER_LENGTH} characters"
        )));
    }
    if !asset_number
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(CoreError::Validation(format!(
            "Asset number '{asset_number}' may only contain letters, digits, '-' and '_'"
        )));
    }
    Ok(())
}
