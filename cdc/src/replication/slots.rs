use crate::bail;
use crate::error::{CdcResult, ErrorKind};

/// Maximum length for a Postgres replication slot name in bytes.
pub const MAX_SLOT_NAME_LENGTH: usize = 63;

/// Checks that `slot_name` is accepted by Postgres as a replication slot name.
///
/// Slot names may only contain lower case letters, digits and underscores.
pub fn validate_slot_name(slot_name: &str) -> CdcResult<()> {
    if slot_name.is_empty() {
        bail!(
            ErrorKind::InvalidConfiguration,
            "Invalid slot name",
            "The replication slot name must not be empty"
        );
    }

    if slot_name.len() > MAX_SLOT_NAME_LENGTH {
        bail!(
            ErrorKind::InvalidConfiguration,
            "Invalid slot name length",
            format!(
                "The replication slot name '{slot_name}' is {} bytes long, the maximum is {MAX_SLOT_NAME_LENGTH}",
                slot_name.len()
            )
        );
    }

    if let Some(invalid) = slot_name
        .chars()
        .find(|c| !matches!(c, 'a'..='z' | '0'..='9' | '_'))
    {
        bail!(
            ErrorKind::InvalidConfiguration,
            "Invalid slot name",
            format!("The replication slot name '{slot_name}' contains the invalid character '{invalid}'")
        );
    }

    Ok(())
}
