//! Family posts with their likes and comments.

use crate::authz::{authorize, Action, Actor, Scope};
use crate::database::models::{CommentRecord, PostRecord, PostType, UserRecord};
use crate::database::repositories::{
    CommentRepository, LikeRepository, PostRepository, SqliteRepositories, UserRepository,
};
use crate::database::Database;
use crate::error::{service_error, ServiceError};
use crate::events::{ChangeEvent, ChangeFeed, ChangeKind, Collection};
use crate::utils::{new_id, now_utc_iso};
use anyhow::Result;
use serde::{Deserialize, Serialize};

const DASHBOARD_LIMIT: usize = 100;

#[derive(Clone)]
pub struct ContentService {
    database: Database,
    feed: ChangeFeed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostInput {
    pub content: String,
    #[serde(rename = "type", default = "default_post_type")]
    pub post_type: PostType,
}

fn default_post_type() -> PostType {
    PostType::Discussion
}

/// A post as clients see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: PostRecord,
    /// Ids of users who liked the post.
    pub likes: Vec<String>,
    pub comments: Vec<CommentRecord>,
}

impl ContentService {
    pub fn new(database: Database, feed: ChangeFeed) -> Self {
        Self { database, feed }
    }

    /// The author's current display name is copied onto the post and is
    /// not refreshed afterwards.
    pub fn create_post(&self, actor: &Actor, family_id: &str, input: PostInput) -> Result<PostView> {
        authorize(actor, Action::Contribute, &Scope::family(family_id))?;
        let content = input.content.trim();
        if content.is_empty() {
            return Err(ServiceError::invalid("post content may not be empty").into());
        }
        let post = self.database.with_repositories(|repos| {
            let author = load_author(&repos, &actor.user_id)?;
            let post = PostRecord {
                id: new_id(),
                family_id: family_id.to_string(),
                author_id: author.id,
                author_name: author.display_name,
                content: content.to_string(),
                post_type: input.post_type,
                created_at: now_utc_iso(),
            };
            repos.posts().create(&post)?;
            Ok(post)
        })?;
        tracing::info!(post_id = %post.id, family_id, kind = %post.post_type, "post created");
        self.publish(&post, ChangeKind::Created);
        Ok(PostView {
            post,
            likes: Vec::new(),
            comments: Vec::new(),
        })
    }

    pub fn get_post(&self, actor: &Actor, post_id: &str) -> Result<PostView> {
        let post = self.load_post(post_id)?;
        authorize(actor, Action::ReadFamily, &Scope::family(&post.family_id))?;
        self.database.with_repositories(|repos| view(&repos, post))
    }

    /// Newest first.
    pub fn list_posts(&self, actor: &Actor, family_id: &str) -> Result<Vec<PostView>> {
        authorize(actor, Action::ReadFamily, &Scope::family(family_id))?;
        self.database.with_repositories(|repos| {
            repos
                .posts()
                .list_for_family(family_id)?
                .into_iter()
                .map(|post| view(&repos, post))
                .collect()
        })
    }

    /// Dashboard listing: every family for super-admins, the caller's own
    /// family otherwise. Permission failures yield an empty list.
    pub fn list_posts_for_actor(&self, actor: &Actor) -> Result<Vec<PostView>> {
        if actor.is_super_admin() {
            return self.database.with_repositories(|repos| {
                repos
                    .posts()
                    .list_recent(DASHBOARD_LIMIT)?
                    .into_iter()
                    .map(|post| view(&repos, post))
                    .collect()
            });
        }
        let Some(family_id) = actor.family_id.as_deref() else {
            tracing::warn!(actor = %actor.user_id, "no family assigned; returning no posts");
            return Ok(Vec::new());
        };
        match self.list_posts(actor, family_id) {
            Ok(posts) => Ok(posts),
            Err(err) if matches!(service_error(&err), Some(ServiceError::PermissionDenied(_))) => {
                tracing::warn!(actor = %actor.user_id, error = %err, "post listing degraded");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    pub fn delete_post(&self, actor: &Actor, post_id: &str) -> Result<()> {
        let post = self.load_post(post_id)?;
        authorize(
            actor,
            Action::MutateContent,
            &Scope::content(&post.family_id, &post.author_id),
        )?;
        self.database
            .with_repositories(|repos| repos.posts().delete(post_id))?;
        tracing::info!(post_id, actor = %actor.user_id, "post deleted");
        self.publish(&post, ChangeKind::Deleted);
        Ok(())
    }

    /// Adds the caller to the post's likes. Liking twice is a no-op.
    pub fn like_post(&self, actor: &Actor, post_id: &str) -> Result<PostView> {
        self.toggle_like(actor, post_id, true)
    }

    /// Removes the caller's like, if any.
    pub fn unlike_post(&self, actor: &Actor, post_id: &str) -> Result<PostView> {
        self.toggle_like(actor, post_id, false)
    }

    pub fn add_comment(&self, actor: &Actor, post_id: &str, content: &str) -> Result<CommentRecord> {
        let post = self.load_post(post_id)?;
        authorize(actor, Action::Contribute, &Scope::family(&post.family_id))?;
        let content = content.trim();
        if content.is_empty() {
            return Err(ServiceError::invalid("comment may not be empty").into());
        }
        let comment = self.database.with_repositories(|repos| {
            let author = load_author(&repos, &actor.user_id)?;
            let comment = CommentRecord {
                id: new_id(),
                post_id: post.id.clone(),
                author_id: author.id,
                author_name: author.display_name,
                content: content.to_string(),
                created_at: now_utc_iso(),
            };
            repos.comments().append(&comment)?;
            Ok(comment)
        })?;
        self.publish(&post, ChangeKind::Updated);
        Ok(comment)
    }

    /// Comment authors and moderators of the post's family may delete.
    pub fn delete_comment(&self, actor: &Actor, post_id: &str, comment_id: &str) -> Result<()> {
        let post = self.load_post(post_id)?;
        let comment = self
            .database
            .with_repositories(|repos| repos.comments().get(post_id, comment_id))?
            .ok_or_else(|| ServiceError::not_found(format!("comment {comment_id}")))?;
        authorize(
            actor,
            Action::MutateContent,
            &Scope::content(&post.family_id, &comment.author_id),
        )?;
        self.database
            .with_repositories(|repos| repos.comments().delete(post_id, comment_id))?;
        self.publish(&post, ChangeKind::Updated);
        Ok(())
    }

    fn toggle_like(&self, actor: &Actor, post_id: &str, like: bool) -> Result<PostView> {
        let post = self.load_post(post_id)?;
        authorize(actor, Action::Contribute, &Scope::family(&post.family_id))?;
        let (changed, updated) = self.database.with_repositories(|repos| {
            let changed = if like {
                repos.likes().add(post_id, &actor.user_id, &now_utc_iso())?
            } else {
                repos.likes().remove(post_id, &actor.user_id)?
            };
            Ok((changed, view(&repos, post)?))
        })?;
        if changed {
            self.publish(&updated.post, ChangeKind::Updated);
        }
        Ok(updated)
    }

    fn load_post(&self, post_id: &str) -> Result<PostRecord> {
        self.database.with_repositories(|repos| {
            repos
                .posts()
                .get(post_id)?
                .ok_or_else(|| ServiceError::not_found(format!("post {post_id}")).into())
        })
    }

    fn publish(&self, post: &PostRecord, kind: ChangeKind) {
        self.feed.publish(ChangeEvent::new(
            Collection::Posts,
            &post.id,
            kind,
            Some(post.family_id.as_str()),
        ));
    }
}

fn view(repos: &SqliteRepositories<'_>, post: PostRecord) -> Result<PostView> {
    let likes = repos.likes().list_for_post(&post.id)?;
    let comments = repos.comments().list_for_post(&post.id)?;
    Ok(PostView {
        post,
        likes,
        comments,
    })
}

fn load_author(repos: &SqliteRepositories<'_>, user_id: &str) -> Result<UserRecord> {
    repos
        .users()
        .get(user_id)?
        .ok_or_else(|| ServiceError::Unauthenticated.into())
}
