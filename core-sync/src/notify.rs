//! User-facing notification texts for terminal outcomes.

use crate::error::{DeleteError, ResolveError, UploadError};
use crate::models::{FileRecord, UploadOutcome};
use core_runtime::events::{Notification, NotificationLevel};

/// Notifications for a finished upload batch.
///
/// A single-file batch gets one message about that file. Larger batches get
/// one summary of the successes, one combined message naming every file that
/// failed to transfer, and one naming files that were stored but not recorded.
pub fn upload_notifications(outcomes: &[UploadOutcome]) -> Vec<Notification> {
    if let [outcome] = outcomes {
        return vec![single_upload(outcome)];
    }

    let succeeded: Vec<&str> = outcomes
        .iter()
        .filter(|o| o.success)
        .map(|o| o.name.as_str())
        .collect();
    let (unrecorded, failed): (Vec<&UploadOutcome>, Vec<&UploadOutcome>) = outcomes
        .iter()
        .filter(|o| !o.success)
        .partition(|o| o.error.as_ref().is_some_and(UploadError::is_metadata_failure));

    let mut notifications = Vec::new();
    if !succeeded.is_empty() {
        notifications.push(
            Notification::success(
                format!("{} File(s) Uploaded", succeeded.len()),
                "Your file(s) have been successfully uploaded.",
            )
            .with_files(succeeded),
        );
    }
    if !failed.is_empty() {
        let names: Vec<&str> = failed.iter().map(|o| o.name.as_str()).collect();
        notifications.push(
            Notification::error(
                format!("Failed to Upload {} File(s)", names.len()),
                format!("Could not upload: {}. Please try again.", names.join(", ")),
            )
            .with_files(names),
        );
    }
    if !unrecorded.is_empty() {
        let names: Vec<&str> = unrecorded.iter().map(|o| o.name.as_str()).collect();
        notifications.push(
            Notification::error(
                "Metadata Error",
                format!(
                    "Uploaded but failed to save details for: {}. Please try refreshing.",
                    names.join(", ")
                ),
            )
            .with_files(names),
        );
    }
    notifications
}

fn single_upload(outcome: &UploadOutcome) -> Notification {
    let name = outcome.name.as_str();
    let notification = match &outcome.error {
        None => Notification::success(
            "Upload Successful",
            format!("\"{}\" uploaded successfully.", name),
        ),
        Some(UploadError::MetadataWriteFailed { .. }) => Notification::error(
            "Metadata Error",
            "File uploaded, but failed to save details. Please try refreshing.",
        ),
        Some(UploadError::PermissionDenied(_)) => Notification::error(
            "Upload Failed",
            "Permission denied. Please check your storage rules.",
        ),
        Some(UploadError::Canceled) => {
            Notification::new(NotificationLevel::Warning, "Upload Canceled", "Upload canceled.")
        }
        Some(UploadError::TransferFailed(_)) => Notification::error(
            "Upload Failed",
            format!("Could not upload \"{}\". Please try again.", name),
        ),
    };
    notification.with_files([name])
}

/// Text shown before a delete is confirmed.
pub fn confirmation_prompt(record: &FileRecord) -> String {
    format!(
        "Are you sure you want to delete \"{}\"? This action cannot be undone.",
        record.display_name
    )
}

pub fn delete_succeeded(record: &FileRecord, blob_already_missing: bool) -> Notification {
    let notification = if blob_already_missing {
        Notification::new(
            NotificationLevel::Warning,
            "File Removed",
            "File not found in storage. It might have already been deleted.",
        )
    } else {
        Notification::success(
            "File Deleted",
            format!("\"{}\" has been permanently deleted.", record.display_name),
        )
    };
    notification.with_files([record.display_name.as_str()])
}

pub fn delete_failed(record: &FileRecord, error: &DeleteError) -> Notification {
    let notification = match error {
        DeleteError::BlobPermissionDenied { .. } => Notification::error(
            "Deletion Failed",
            "You do not have permission to delete this file.",
        ),
        DeleteError::BlobOther { .. } => Notification::error(
            "Deletion Failed",
            format!("Could not delete \"{}\". Please try again.", record.display_name),
        ),
        DeleteError::MetadataDeleteFailed { .. } => Notification::error(
            "Deletion Incomplete",
            format!(
                "\"{}\" was removed from storage but its record could not be deleted. Please try refreshing.",
                record.display_name
            ),
        ),
    };
    notification.with_files([record.display_name.as_str()])
}

pub fn preview_failed(record: &FileRecord, error: &ResolveError) -> Notification {
    let notification = match error {
        ResolveError::Unsupported { content_type } => Notification::new(
            NotificationLevel::Info,
            "Preview Not Available",
            format!("Preview is not supported for {} files.", content_type),
        ),
        other => Notification::error("Preview Failed", resolve_hint(other)),
    };
    notification.with_files([record.display_name.as_str()])
}

pub fn download_started(record: &FileRecord) -> Notification {
    Notification::new(
        NotificationLevel::Info,
        "Download Started",
        format!("Downloading \"{}\"...", record.display_name),
    )
    .with_files([record.display_name.as_str()])
}

pub fn download_failed(record: &FileRecord, error: &ResolveError) -> Notification {
    Notification::error("Download Failed", resolve_hint(error))
        .with_files([record.display_name.as_str()])
}

fn resolve_hint(error: &ResolveError) -> String {
    match error {
        ResolveError::NotFound(_) => "File not found. It might have been deleted.".to_string(),
        ResolveError::PermissionDenied(_) => {
            "You do not have permission to access this file.".to_string()
        }
        ResolveError::Unsupported { content_type } => {
            format!("Preview is not supported for {} files.", content_type)
        }
        ResolveError::Unavailable(_) => {
            "Could not get a link for this file. Please try again.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordId;
    use chrono::Utc;
    use core_auth::UserId;

    fn record(name: &str) -> FileRecord {
        FileRecord {
            id: RecordId::new("r1"),
            owner_id: UserId::new("u1"),
            display_name: name.to_string(),
            storage_path: format!("users/u1/1_{name}"),
            size_bytes: 1,
            content_type: "text/plain".to_string(),
            created_at: Utc::now(),
            blob_created_at: None,
            access_url: None,
        }
    }

    #[test]
    fn test_batch_notifications_name_failed_files() {
        let outcomes = vec![
            UploadOutcome::succeeded("a.txt", record("a.txt")),
            UploadOutcome::failed("b.txt", UploadError::TransferFailed("reset".into())),
            UploadOutcome::failed("c.txt", UploadError::PermissionDenied("rules".into())),
            UploadOutcome::failed(
                "d.txt",
                UploadError::MetadataWriteFailed {
                    storage_path: "users/u1/4_d.txt".into(),
                    reason: "quota".into(),
                },
            ),
        ];

        let notifications = upload_notifications(&outcomes);
        assert_eq!(notifications.len(), 3);
        assert_eq!(notifications[0].title, "1 File(s) Uploaded");
        assert_eq!(notifications[1].title, "Failed to Upload 2 File(s)");
        assert_eq!(
            notifications[1].message,
            "Could not upload: b.txt, c.txt. Please try again."
        );
        assert_eq!(notifications[2].files, vec!["d.txt".to_string()]);
    }

    #[test]
    fn test_single_upload_wording() {
        let ok = upload_notifications(&[UploadOutcome::succeeded("a.txt", record("a.txt"))]);
        assert_eq!(ok[0].message, "\"a.txt\" uploaded successfully.");

        let denied = upload_notifications(&[UploadOutcome::failed(
            "a.txt",
            UploadError::PermissionDenied("rules".into()),
        )]);
        assert_eq!(denied[0].message, "Permission denied. Please check your storage rules.");
        assert!(denied[0].is_error());
    }

    #[test]
    fn test_empty_batch_has_no_notifications() {
        assert!(upload_notifications(&[]).is_empty());
    }

    #[test]
    fn test_delete_texts() {
        let record = record("report.pdf");

        assert_eq!(
            confirmation_prompt(&record),
            "Are you sure you want to delete \"report.pdf\"? This action cannot be undone."
        );
        assert_eq!(
            delete_succeeded(&record, false).message,
            "\"report.pdf\" has been permanently deleted."
        );
        assert_eq!(
            delete_failed(
                &record,
                &DeleteError::BlobPermissionDenied {
                    storage_path: record.storage_path.clone(),
                    reason: "rules".into()
                }
            )
            .message,
            "You do not have permission to delete this file."
        );
    }

    #[test]
    fn test_preview_texts() {
        let record = record("archive.zip");
        let unsupported = preview_failed(
            &record,
            &ResolveError::Unsupported {
                content_type: "application/zip".into(),
            },
        );

        assert_eq!(unsupported.title, "Preview Not Available");
        assert!(!unsupported.is_error());
        assert_eq!(
            preview_failed(&record, &ResolveError::NotFound("x".into())).message,
            "File not found. It might have been deleted."
        );
    }
}
