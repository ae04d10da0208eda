//! Review workflows for family creation and admin access.
//!
//! Both request kinds move `pending -> approved` or `pending -> rejected`
//! exactly once; any other transition is refused.

use crate::authz::{authorize, is_allowed, Action, Actor, Scope};
use crate::database::models::{
    AdminRequestRecord, FamilyRecord, FamilyRequestRecord, RequestStatus, Role, UserRecord,
};
use crate::database::repositories::{
    AdminRequestRepository, FamilyRequestRepository, UserRepository,
};
use crate::database::Database;
use crate::error::ServiceError;
use crate::events::{ChangeEvent, ChangeFeed, ChangeKind, Collection};
use crate::membership::{insert_family, CreateFamilyInput};
use crate::utils::{new_id, now_utc_iso};
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct RequestService {
    database: Database,
    feed: ChangeFeed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyRequestInput {
    pub family_name: String,
    #[serde(default)]
    pub description: String,
}

/// Replaces the requested family data on approval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyOverrides {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedFamily {
    pub request: FamilyRequestRecord,
    pub family: FamilyRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl From<ReviewDecision> for RequestStatus {
    fn from(decision: ReviewDecision) -> Self {
        match decision {
            ReviewDecision::Approved => RequestStatus::Approved,
            ReviewDecision::Rejected => RequestStatus::Rejected,
        }
    }
}

impl RequestService {
    pub fn new(database: Database, feed: ChangeFeed) -> Self {
        Self { database, feed }
    }

    pub fn submit_family_request(
        &self,
        actor: &Actor,
        input: FamilyRequestInput,
    ) -> Result<FamilyRequestRecord> {
        let family_name = input.family_name.trim();
        if family_name.is_empty() {
            return Err(ServiceError::invalid("family name may not be empty").into());
        }
        let record = self.database.with_repositories(|repos| {
            let requester = repos
                .users()
                .get(&actor.user_id)?
                .ok_or(ServiceError::Unauthenticated)?;
            let record = FamilyRequestRecord {
                id: new_id(),
                requester_id: requester.id,
                requester_name: requester.display_name,
                family_name: family_name.to_string(),
                description: input.description.trim().to_string(),
                status: RequestStatus::Pending,
                created_at: now_utc_iso(),
                updated_at: None,
                reviewed_by: None,
                family_id: None,
            };
            repos.family_requests().create(&record)?;
            Ok(record)
        })?;
        tracing::info!(request_id = %record.id, family = %record.family_name, "family requested");
        self.feed.publish(ChangeEvent::new(
            Collection::FamilyRequests,
            &record.id,
            ChangeKind::Created,
            None,
        ));
        Ok(record)
    }

    /// Super-admins see every request; everyone else sees their own.
    pub fn list_family_requests(
        &self,
        actor: &Actor,
        status: Option<RequestStatus>,
    ) -> Result<Vec<FamilyRequestRecord>> {
        let mut requests = self
            .database
            .with_repositories(|repos| repos.family_requests().list(status))?;
        if !is_allowed(actor, Action::ReviewRequests, &Scope::global()) {
            requests.retain(|request| request.requester_id == actor.user_id);
        }
        Ok(requests)
    }

    /// Marks the request approved and creates its family in one transaction.
    pub fn approve_family_request(
        &self,
        actor: &Actor,
        request_id: &str,
        overrides: Option<FamilyOverrides>,
    ) -> Result<ApprovedFamily> {
        authorize(actor, Action::ReviewRequests, &Scope::global())?;
        let approved = self.database.with_transaction(|repos| {
            let mut request = pending_family_request(&repos, request_id)?;
            let overrides = overrides.unwrap_or_default();
            let family = insert_family(
                &repos,
                CreateFamilyInput {
                    name: overrides.name.unwrap_or_else(|| request.family_name.clone()),
                    description: overrides
                        .description
                        .unwrap_or_else(|| request.description.clone()),
                    image_url: overrides.image_url,
                },
            )?;
            request.status = RequestStatus::Approved;
            request.updated_at = Some(now_utc_iso());
            request.reviewed_by = Some(actor.user_id.clone());
            request.family_id = Some(family.id.clone());
            repos.family_requests().update(&request)?;
            Ok(ApprovedFamily { request, family })
        })?;

        tracing::info!(
            request_id,
            family_id = %approved.family.id,
            reviewer = %actor.user_id,
            "family request approved"
        );
        self.feed.publish(ChangeEvent::new(
            Collection::FamilyRequests,
            request_id,
            ChangeKind::Updated,
            None,
        ));
        self.feed.publish(ChangeEvent::new(
            Collection::Families,
            &approved.family.id,
            ChangeKind::Created,
            Some(approved.family.id.as_str()),
        ));
        Ok(approved)
    }

    pub fn reject_family_request(
        &self,
        actor: &Actor,
        request_id: &str,
    ) -> Result<FamilyRequestRecord> {
        authorize(actor, Action::ReviewRequests, &Scope::global())?;
        let request = self.database.with_transaction(|repos| {
            let mut request = pending_family_request(&repos, request_id)?;
            request.status = RequestStatus::Rejected;
            request.updated_at = Some(now_utc_iso());
            request.reviewed_by = Some(actor.user_id.clone());
            repos.family_requests().update(&request)?;
            Ok(request)
        })?;
        tracing::info!(request_id, reviewer = %actor.user_id, "family request rejected");
        self.feed.publish(ChangeEvent::new(
            Collection::FamilyRequests,
            request_id,
            ChangeKind::Updated,
            None,
        ));
        Ok(request)
    }

    /// Files an admin-access request for the acting user. A user holds at
    /// most one pending request.
    pub fn submit_admin_request(
        &self,
        actor: &Actor,
        phone_number: Option<String>,
    ) -> Result<AdminRequestRecord> {
        let record = self.database.with_transaction(|repos| {
            let user = repos
                .users()
                .get(&actor.user_id)?
                .ok_or(ServiceError::Unauthenticated)?;
            if user.role != Role::Member {
                return Err(ServiceError::Conflict(format!(
                    "{} already holds the {} role",
                    user.display_name, user.role
                ))
                .into());
            }
            if repos.admin_requests().find_pending_for_user(&user.id)?.is_some() {
                return Err(ServiceError::Conflict(
                    "an admin request is already pending".into(),
                )
                .into());
            }
            // only the request carries the submitted phone
            let mut record = pending_admin_request(&user);
            if let Some(phone) = phone_number
                .map(|phone| phone.trim().to_string())
                .filter(|phone| !phone.is_empty())
            {
                record.phone_number = Some(phone);
            }
            repos.admin_requests().create(&record)?;
            Ok(record)
        })?;
        tracing::info!(request_id = %record.id, user_id = %record.user_id, "admin access requested");
        self.feed.publish(ChangeEvent::new(
            Collection::AdminRequests,
            &record.id,
            ChangeKind::Created,
            None,
        ));
        Ok(record)
    }

    pub fn list_admin_requests(
        &self,
        actor: &Actor,
        status: Option<RequestStatus>,
    ) -> Result<Vec<AdminRequestRecord>> {
        let mut requests = self
            .database
            .with_repositories(|repos| repos.admin_requests().list(status))?;
        if !is_allowed(actor, Action::ReviewRequests, &Scope::global()) {
            requests.retain(|request| request.user_id == actor.user_id);
        }
        Ok(requests)
    }

    /// Records the decision; approval also grants the `admin` role.
    pub fn review_admin_request(
        &self,
        actor: &Actor,
        request_id: &str,
        decision: ReviewDecision,
        reason: Option<String>,
    ) -> Result<AdminRequestRecord> {
        authorize(actor, Action::ReviewRequests, &Scope::global())?;
        let (request, promoted) = self.database.with_transaction(|repos| {
            let mut request = repos
                .admin_requests()
                .get(request_id)?
                .ok_or_else(|| ServiceError::not_found(format!("admin request {request_id}")))?;
            ensure_pending(request.status, "admin request", request_id)?;

            let now = now_utc_iso();
            request.status = decision.into();
            request.reviewed_at = Some(now.clone());
            request.reviewed_by = Some(actor.user_id.clone());
            request.reason = reason.filter(|reason| !reason.trim().is_empty());
            repos.admin_requests().update(&request)?;

            let mut promoted: Option<UserRecord> = None;
            if decision == ReviewDecision::Approved {
                let user = repos.users().get(&request.user_id)?.ok_or_else(|| {
                    ServiceError::not_found(format!("user {}", request.user_id))
                })?;
                if user.role == Role::Member {
                    repos.users().set_role(&user.id, Role::Admin, &now)?;
                }
                promoted = Some(user);
            }
            Ok((request, promoted))
        })?;

        tracing::info!(
            request_id,
            decision = ?decision,
            reviewer = %actor.user_id,
            "admin request reviewed"
        );
        self.feed.publish(ChangeEvent::new(
            Collection::AdminRequests,
            request_id,
            ChangeKind::Updated,
            None,
        ));
        if let Some(user) = promoted {
            self.feed.publish(ChangeEvent::new(
                Collection::Users,
                &user.id,
                ChangeKind::Updated,
                user.family_id.as_deref(),
            ));
        }
        Ok(request)
    }
}

pub(crate) fn pending_admin_request(user: &UserRecord) -> AdminRequestRecord {
    AdminRequestRecord {
        id: new_id(),
        user_id: user.id.clone(),
        email: user.email.clone(),
        display_name: user.display_name.clone(),
        phone_number: user.phone_number.clone(),
        status: RequestStatus::Pending,
        created_at: now_utc_iso(),
        reviewed_at: None,
        reviewed_by: None,
        reason: None,
    }
}

fn pending_family_request(
    repos: &crate::database::repositories::SqliteRepositories<'_>,
    request_id: &str,
) -> Result<FamilyRequestRecord> {
    let request = repos
        .family_requests()
        .get(request_id)?
        .ok_or_else(|| ServiceError::not_found(format!("family request {request_id}")))?;
    ensure_pending(request.status, "family request", request_id)?;
    Ok(request)
}

fn ensure_pending(status: RequestStatus, kind: &str, id: &str) -> Result<()> {
    if status.is_terminal() {
        return Err(ServiceError::InvalidTransition(format!(
            "{kind} {id} is already {status}"
        ))
        .into());
    }
    Ok(())
}
