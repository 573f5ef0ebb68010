use crate::helper::sanitization_helpers::clean_optional;
use crate::models::db_operations::terms_db_operations::{self, SignatureRecord};
use crate::models::{NewTerm, PortalUser, Term, TermSignature};
use crate::permissions::AccessLevel;
use crate::DbPool;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TermsError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("No active term found.")]
    NoActiveTerm,
    #[error("Organization ID not found in the user profile.")]
    NoOrganization,
    #[error("You do not have permission to manage terms.")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
}

/// What the term gate needs to decide whether a caller may continue.
#[derive(Debug, Serialize)]
pub struct TermStatus {
    pub active_term: Option<Term>,
    pub signature: Option<TermSignature>,
    pub allowed: bool,
}

/// Client metadata stored next to a signature.
#[derive(Debug, Default)]
pub struct SigningContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

pub fn active_term(pool: &DbPool) -> Result<Option<Term>, TermsError> {
    let conn = pool.get()?;
    Ok(terms_db_operations::read_active_term(&conn)?)
}

fn signing_organization(user: &PortalUser) -> Option<&str> {
    user.organization_id.as_deref().filter(|o| !o.trim().is_empty())
}

/// Internal users pass without signing. Clients pass when no term is active
/// or when they signed the active one for their organization. Unknown roles
/// and clients without an organization never pass.
pub fn term_status(pool: &DbPool, user: &PortalUser) -> Result<TermStatus, TermsError> {
    let conn = pool.get()?;
    let active_term = terms_db_operations::read_active_term(&conn)?;
    let level = user.access_level();

    let signature = match (&active_term, signing_organization(user)) {
        (Some(term), Some(org)) => terms_db_operations::read_signature(&conn, &term.id, org, user.id)?,
        _ => None,
    };
    let allowed = match level {
        AccessLevel::Admin => true,
        AccessLevel::Desconhecido => false,
        AccessLevel::Usuario => signing_organization(user).is_some() && (active_term.is_none() || signature.is_some()),
    };
    Ok(TermStatus { active_term, signature, allowed })
}

/// Signs the active term for the caller's organization.
pub fn sign_active_term(pool: &DbPool, user: &PortalUser, context: SigningContext) -> Result<TermSignature, TermsError> {
    if user.access_level() == AccessLevel::Desconhecido {
        return Err(TermsError::Forbidden);
    }
    let organization_id = signing_organization(user).ok_or(TermsError::NoOrganization)?;
    let conn = pool.get()?;
    let term = terms_db_operations::read_active_term(&conn)?.ok_or(TermsError::NoActiveTerm)?;
    let user_name = user.name.as_deref().unwrap_or(&user.username);
    let signature = terms_db_operations::record_signature(
        &conn,
        &SignatureRecord {
            term_id: &term.id,
            organization_id,
            user_id: user.id,
            user_name: Some(user_name),
            ip: context.ip.as_deref(),
            user_agent: context.user_agent.as_deref(),
        },
    )?;
    log::info!("User {} signed term version {} for {}", user.id, term.version, organization_id);
    Ok(signature)
}

/// Publishes a new version; it becomes the active term.
pub fn publish_term(pool: &DbPool, user: &PortalUser, new_term: NewTerm) -> Result<Term, TermsError> {
    if !user.access_level().can_manage_clients() {
        return Err(TermsError::Forbidden);
    }
    let title = clean_optional(Some(&new_term.title))
        .ok_or_else(|| TermsError::Validation("Title is required.".to_string()))?;
    let body = new_term.body.trim();
    if body.is_empty() {
        return Err(TermsError::Validation("Term body is required.".to_string()));
    }
    let mut conn = pool.get()?;
    Ok(terms_db_operations::create_term(&mut conn, &title, body)?)
}
