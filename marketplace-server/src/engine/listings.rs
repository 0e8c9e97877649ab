//! Service listings and contact disclosure

use chrono::Utc;
use serde::Deserialize;

use marketplace_core::{
    can_access_contact, ContactInfo, Error, Result, Role, ServiceId, ServiceListing,
    SessionIdentity, UserId,
};

use super::require_session;
use crate::state::AppState;
use crate::store::{RecordStore, SessionStore, Write};

#[derive(Debug, Clone, Deserialize)]
pub struct NewService {
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub contact: Option<ContactInfo>,
}

impl<R: RecordStore, S: SessionStore> AppState<R, S> {
    pub fn create_service(
        &self,
        caller: Option<&SessionIdentity>,
        service: NewService,
    ) -> Result<ServiceListing> {
        let owner = require_session(caller)?;
        let title = service.title.trim();
        let category = service.category.trim();
        if title.is_empty() || category.is_empty() {
            return Err(Error::invalid("title and category are required"));
        }

        let profile = self.read_profile(owner)?;
        if profile.role != Role::Provider {
            return Err(Error::denied("only providers can list services"));
        }

        let listing = ServiceListing {
            id: ServiceId::new(),
            owner,
            title: title.to_string(),
            category: category.to_string(),
            description: service
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            is_active: true,
            contact: service.contact,
            created_at: Utc::now(),
        };
        self.commit(vec![Write::InsertService(listing.clone())])?;

        tracing::info!(owner = %owner, service_id = %listing.id, "Service listed");
        Ok(listing)
    }

    /// Active listings whose owner is verified right now.
    ///
    /// Contact details are kept only when the caller passes a fresh
    /// entitlement check.
    pub fn list_public_services(
        &self,
        caller: Option<&SessionIdentity>,
    ) -> Result<Vec<ServiceListing>> {
        let entitled = self.contact_entitlement(caller);

        let mut public = Vec::new();
        for listing in self.store.list_services(None)? {
            if !listing.is_active || !self.owner_is_verified(listing.owner)? {
                continue;
            }
            public.push(if entitled {
                listing
            } else {
                listing.redacted()
            });
        }
        Ok(public)
    }

    /// Private contact of a public listing, disclosed only after a fresh
    /// server-side entitlement check.
    pub fn service_contact(
        &self,
        caller: Option<&SessionIdentity>,
        service_id: ServiceId,
    ) -> Result<ContactInfo> {
        let caller_id = require_session(caller)?;

        let listing = self
            .store
            .get_service(service_id)?
            .filter(|l| l.is_active)
            .ok_or_else(|| Error::not_found(format!("service {service_id}")))?;
        if !self.owner_is_verified(listing.owner)? {
            return Err(Error::not_found(format!("service {service_id}")));
        }

        let profile = self.store.read_profile(caller_id)?;
        if !can_access_contact(caller, profile.as_ref(), Utc::now()) {
            return Err(Error::denied(
                "contact details require a verified account with an active paid plan",
            ));
        }
        Ok(listing.contact.unwrap_or_default())
    }

    fn owner_is_verified(&self, owner: UserId) -> Result<bool> {
        Ok(self
            .store
            .read_profile(owner)?
            .map_or(false, |p| p.is_verified()))
    }
}
