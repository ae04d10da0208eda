use crate::authz::{authorize, Action, Actor, Scope};
use crate::blobs::{sanitize_filename, BlobStore};
use crate::config::FileConfig;
use crate::database::models::{MediaRecord, MediaType, NotificationRecord, NotificationType};
use crate::database::repositories::{
    FamilyRepository, MediaRepository, NotificationRepository,
};
use crate::database::Database;
use crate::error::ServiceError;
use crate::events::{ChangeEvent, ChangeFeed, ChangeKind, Collection};
use crate::utils::{new_id, now_utc_iso};
use anyhow::Result;

#[derive(Clone)]
pub struct MediaService<B: BlobStore> {
    database: Database,
    feed: ChangeFeed,
    blobs: B,
    config: FileConfig,
}

#[derive(Debug, Clone)]
pub struct UploadMediaInput {
    pub media_type: MediaType,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub file_name: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct MediaDownload {
    pub record: MediaRecord,
    pub data: Vec<u8>,
}

impl<B: BlobStore> MediaService<B> {
    pub fn new(database: Database, feed: ChangeFeed, blobs: B, config: FileConfig) -> Self {
        Self {
            database,
            feed,
            blobs,
            config,
        }
    }

    /// Stores the bytes, then records the media item together with a
    /// `media` notification for the family.
    pub async fn upload_media(
        &self,
        actor: &Actor,
        family_id: &str,
        input: UploadMediaInput,
    ) -> Result<MediaRecord> {
        authorize(actor, Action::Contribute, &Scope::family(family_id))?;
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(ServiceError::invalid("media title may not be empty").into());
        }
        if input.data.is_empty() {
            return Err(ServiceError::invalid("uploaded file is empty").into());
        }
        if input.data.len() as u64 > self.config.max_upload_bytes {
            return Err(ServiceError::invalid(format!(
                "file exceeds the {} byte upload limit",
                self.config.max_upload_bytes
            ))
            .into());
        }
        let mime = sniff(input.media_type, &input.data)?;
        let family = self.database.with_repositories(|repos| {
            repos
                .families()
                .get(family_id)?
                .ok_or_else(|| ServiceError::not_found(format!("family {family_id}")).into())
        })?;

        let media_id = new_id();
        let file_name = input
            .file_name
            .as_deref()
            .map(sanitize_filename)
            .unwrap_or_else(|| "upload".to_string());
        let blob_path = format!(
            "{family_id}/{}/{media_id}-{file_name}",
            input.media_type.as_str()
        );
        let stored = self.blobs.upload(&input.data, &blob_path).await?;

        let now = now_utc_iso();
        let record = MediaRecord {
            id: media_id.clone(),
            family_id: family_id.to_string(),
            media_type: input.media_type,
            title,
            description: input.description.filter(|text| !text.trim().is_empty()),
            url: stored.url,
            download_url: format!("{}/media/{media_id}/file", self.config.public_url),
            blob_path: stored.path,
            mime: Some(mime.to_string()),
            size_bytes: stored.size_bytes,
            checksum: stored.checksum,
            uploaded_by: actor.user_id.clone(),
            uploaded_at: now.clone(),
            tags: normalize_tags(input.tags),
        };
        let notification = NotificationRecord {
            id: new_id(),
            family_id: family_id.to_string(),
            title: format!("New {}", input.media_type),
            message: format!("{} was shared with {}", record.title, family.name),
            notification_type: NotificationType::Media,
            is_read: false,
            created_at: now,
        };

        let saved = self.database.with_transaction(|repos| {
            repos.media().create(&record)?;
            repos.notifications().create(&notification)
        });
        if let Err(err) = saved {
            if let Err(cleanup) = self.blobs.delete(&record.blob_path).await {
                tracing::warn!(path = %record.blob_path, error = %cleanup, "orphaned blob after failed upload");
            }
            return Err(err);
        }

        tracing::info!(
            media_id = %record.id,
            family_id,
            size = record.size_bytes,
            mime = %mime,
            "media uploaded"
        );
        self.feed.publish(ChangeEvent::new(
            Collection::Media,
            &record.id,
            ChangeKind::Created,
            Some(family_id),
        ));
        self.feed.publish(ChangeEvent::new(
            Collection::Notifications,
            &notification.id,
            ChangeKind::Created,
            Some(family_id),
        ));
        Ok(record)
    }

    pub fn list_media(
        &self,
        actor: &Actor,
        family_id: &str,
        media_type: Option<MediaType>,
    ) -> Result<Vec<MediaRecord>> {
        authorize(actor, Action::ReadFamily, &Scope::family(family_id))?;
        self.database
            .with_repositories(|repos| repos.media().list_for_family(family_id, media_type))
    }

    pub async fn get_media_bytes(&self, actor: &Actor, media_id: &str) -> Result<MediaDownload> {
        let record = self.load(media_id)?;
        authorize(actor, Action::ReadFamily, &Scope::family(&record.family_id))?;
        let data = self.blobs.read(&record.blob_path).await?;
        Ok(MediaDownload { record, data })
    }

    /// Reads a blob by store path. Paths start with the owning family id.
    pub async fn read_blob(&self, actor: &Actor, path: &str) -> Result<Vec<u8>> {
        let family_id = path
            .split('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| ServiceError::not_found(format!("blob {path}")))?;
        authorize(actor, Action::ReadFamily, &Scope::family(family_id))?;
        match self.blobs.read(path).await {
            Ok(data) => Ok(data),
            Err(err) => {
                tracing::debug!(path, error = %err, "blob read failed");
                Err(ServiceError::not_found(format!("blob {path}")).into())
            }
        }
    }

    /// Deletes the record, then the blob. A blob that cannot be removed is
    /// logged and left behind.
    pub async fn delete_media(&self, actor: &Actor, media_id: &str) -> Result<()> {
        let record = self.load(media_id)?;
        authorize(
            actor,
            Action::MutateContent,
            &Scope::content(&record.family_id, &record.uploaded_by),
        )?;
        self.database
            .with_repositories(|repos| repos.media().delete(media_id))?;
        if let Err(err) = self.blobs.delete(&record.blob_path).await {
            tracing::warn!(
                media_id,
                path = %record.blob_path,
                error = %err,
                "blob delete failed; record removed"
            );
        }
        tracing::info!(media_id, actor = %actor.user_id, "media deleted");
        self.feed.publish(ChangeEvent::new(
            Collection::Media,
            media_id,
            ChangeKind::Deleted,
            Some(record.family_id.as_str()),
        ));
        Ok(())
    }

    fn load(&self, media_id: &str) -> Result<MediaRecord> {
        self.database.with_repositories(|repos| {
            repos
                .media()
                .get(media_id)?
                .ok_or_else(|| ServiceError::not_found(format!("media {media_id}")).into())
        })
    }
}

/// Detects the content type from magic bytes and checks it against the
/// declared media type.
fn sniff(media_type: MediaType, data: &[u8]) -> Result<&'static str> {
    let Some(kind) = infer::get(data) else {
        return Err(ServiceError::invalid("unrecognized file format").into());
    };
    let accepted = match media_type {
        MediaType::Photo => kind.matcher_type() == infer::MatcherType::Image,
        MediaType::Audio => kind.matcher_type() == infer::MatcherType::Audio,
    };
    if !accepted {
        return Err(ServiceError::invalid(format!(
            "{} is not a valid {media_type} upload",
            kind.mime_type()
        ))
        .into());
    }
    Ok(kind.mime_type())
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut tags: Vec<String> = tags
        .into_iter()
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}
