//! Lock Manager: per-version retention and legal hold enforcement.
//!
//! Grounded on the corpus's retention/legal-hold handlers (`object_config.rs`),
//! generalized from header-driven request DTOs to plain struct arguments
//! operating on the engine's own [`DataVersion`]/[`LockState`] model.

use chrono::{DateTime, Utc};

use crate::error::{EngineError, EngineResult};
use crate::model::{DataVersion, DefaultRetention, ObjectLockConfiguration, Retention, RetentionMode};

/// Stamp a newly-created data version with a bucket's default retention, if
/// one is configured. Only ever called at write time for brand-new versions;
/// existing versions are never retrofitted when a default is added later.
pub fn stamp_default_retention(
    data: &mut DataVersion,
    config: Option<&ObjectLockConfiguration>,
    now: DateTime<Utc>,
) {
    let Some(default) = config.and_then(|c| c.default_retention.as_ref()) else {
        return;
    };
    data.lock_state.retention = Some(Retention {
        mode: default.mode,
        retain_until: default.retain_until_from(now),
    });
}

/// Apply a caller-requested retention change.
///
/// # Errors
///
/// Returns [`EngineError::InvalidRetention`] if the change would shorten an
/// active Compliance retention or downgrade its mode.
pub fn set_retention(data: &mut DataVersion, new: Option<Retention>) -> EngineResult<()> {
    if let Some(current) = &data.lock_state.retention {
        if current.mode == RetentionMode::Compliance {
            match &new {
                None => {
                    return Err(EngineError::InvalidRetention {
                        reason: "cannot remove an active Compliance retention".to_owned(),
                    });
                }
                Some(proposed) => {
                    if proposed.mode == RetentionMode::Governance {
                        return Err(EngineError::InvalidRetention {
                            reason: "cannot downgrade Compliance retention to Governance"
                                .to_owned(),
                        });
                    }
                    if proposed.retain_until < current.retain_until {
                        return Err(EngineError::InvalidRetention {
                            reason: "cannot shorten an active Compliance retention".to_owned(),
                        });
                    }
                }
            }
        }
    }
    data.lock_state.retention = new;
    Ok(())
}

/// Toggle legal hold; always permitted.
pub fn set_legal_hold(data: &mut DataVersion, hold: bool) {
    data.lock_state.legal_hold = hold;
}

/// Check whether a permanent delete of this data version is allowed right now.
///
/// # Errors
///
/// Returns [`EngineError::AccessDenied`] if legal hold is on, or if an active
/// retention blocks the delete (Compliance always blocks until expiry;
/// Governance blocks unless `bypass_governance` is asserted).
pub fn check_permanent_delete_allowed(
    data: &DataVersion,
    now: DateTime<Utc>,
    bypass_governance: bool,
) -> EngineResult<()> {
    if data.lock_state.legal_hold {
        return Err(EngineError::AccessDenied {
            reason: "object is under legal hold".to_owned(),
        });
    }
    if let Some(retention) = &data.lock_state.retention {
        if now < retention.retain_until {
            let blocked = match retention.mode {
                RetentionMode::Compliance => true,
                RetentionMode::Governance => !bypass_governance,
            };
            if blocked {
                return Err(EngineError::AccessDenied {
                    reason: format!(
                        "object is under {:?} retention until {}",
                        retention.mode, retention.retain_until
                    ),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LockState, ObjectMetadata};
    use chrono::Duration;

    fn fresh_data() -> DataVersion {
        DataVersion {
            key: "f".to_owned(),
            version_id: "v1".to_owned(),
            etag: "e".to_owned(),
            size: 1,
            last_modified: Utc::now(),
            metadata: ObjectMetadata::default(),
            lock_state: LockState::default(),
        }
    }

    #[test]
    fn test_should_stamp_default_retention_on_new_version() {
        let mut data = fresh_data();
        let config = ObjectLockConfiguration {
            enabled: true,
            default_retention: Some(DefaultRetention {
                mode: RetentionMode::Governance,
                days: Some(10),
                years: None,
            }),
        };
        let now = Utc::now();
        stamp_default_retention(&mut data, Some(&config), now);
        let retention = data.lock_state.retention.expect("retention stamped");
        assert_eq!(retention.mode, RetentionMode::Governance);
        assert_eq!((retention.retain_until - now).num_days(), 10);
    }

    #[test]
    fn test_should_skip_stamping_without_default_retention() {
        let mut data = fresh_data();
        stamp_default_retention(&mut data, None, Utc::now());
        assert!(data.lock_state.retention.is_none());
    }

    #[test]
    fn test_should_reject_shortening_compliance_retention() {
        let mut data = fresh_data();
        let now = Utc::now();
        data.lock_state.retention = Some(Retention {
            mode: RetentionMode::Compliance,
            retain_until: now + Duration::days(30),
        });
        let shorter = Retention {
            mode: RetentionMode::Compliance,
            retain_until: now + Duration::days(5),
        };
        assert!(set_retention(&mut data, Some(shorter)).is_err());
    }

    #[test]
    fn test_should_reject_downgrading_compliance_to_governance() {
        let mut data = fresh_data();
        let now = Utc::now();
        data.lock_state.retention = Some(Retention {
            mode: RetentionMode::Compliance,
            retain_until: now + Duration::days(30),
        });
        let downgraded = Retention {
            mode: RetentionMode::Governance,
            retain_until: now + Duration::days(60),
        };
        assert!(set_retention(&mut data, Some(downgraded)).is_err());
    }

    #[test]
    fn test_should_allow_extending_compliance_retention() {
        let mut data = fresh_data();
        let now = Utc::now();
        data.lock_state.retention = Some(Retention {
            mode: RetentionMode::Compliance,
            retain_until: now + Duration::days(30),
        });
        let extended = Retention {
            mode: RetentionMode::Compliance,
            retain_until: now + Duration::days(60),
        };
        assert!(set_retention(&mut data, Some(extended)).is_ok());
    }

    #[test]
    fn test_should_block_permanent_delete_under_legal_hold() {
        let mut data = fresh_data();
        set_legal_hold(&mut data, true);
        assert!(check_permanent_delete_allowed(&data, Utc::now(), false).is_err());
    }

    #[test]
    fn test_should_block_permanent_delete_under_active_compliance() {
        let mut data = fresh_data();
        data.lock_state.retention = Some(Retention {
            mode: RetentionMode::Compliance,
            retain_until: Utc::now() + Duration::days(1),
        });
        assert!(check_permanent_delete_allowed(&data, Utc::now(), true).is_err());
    }

    #[test]
    fn test_should_allow_bypassing_governance_retention() {
        let mut data = fresh_data();
        data.lock_state.retention = Some(Retention {
            mode: RetentionMode::Governance,
            retain_until: Utc::now() + Duration::days(1),
        });
        assert!(check_permanent_delete_allowed(&data, Utc::now(), true).is_ok());
        assert!(check_permanent_delete_allowed(&data, Utc::now(), false).is_err());
    }

    #[test]
    fn test_should_allow_permanent_delete_after_retention_expires() {
        let mut data = fresh_data();
        data.lock_state.retention = Some(Retention {
            mode: RetentionMode::Compliance,
            retain_until: Utc::now() - Duration::days(1),
        });
        assert!(check_permanent_delete_allowed(&data, Utc::now(), false).is_ok());
    }
}
