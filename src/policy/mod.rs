//! Per-operation access policy over the credential and item stores.
//!
//! Two rules here are intentionally lax and must stay that way:
//! `vault_items` lets the exact `admin` role see every item, while
//! `search_vault` has no such bypass; and `make_vault_item_public` does not
//! check ownership.

pub mod operation;

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Result, VaultError};
use crate::security::{SessionContext, TokenService};
use crate::store::{CredentialStore, Identity, ItemStore, Role, VaultItem};

pub use operation::{Operation, OperationOutput, OperationRequest};

#[derive(Debug, Clone, Serialize)]
pub struct LoginPayload {
    pub token: String,
    pub user: Identity,
}

#[derive(Debug, Clone)]
pub struct VaultPolicy {
    credentials: Arc<CredentialStore>,
    items: ItemStore,
    tokens: Arc<TokenService>,
}

impl VaultPolicy {
    pub fn new(credentials: Arc<CredentialStore>, items: ItemStore, tokens: Arc<TokenService>) -> Self {
        Self {
            credentials,
            items,
            tokens,
        }
    }

    pub fn items(&self) -> &ItemStore {
        &self.items
    }

    // Session is checked before arguments, same as the per-route handlers.
    pub async fn execute_request(
        &self,
        request: OperationRequest,
        context: &SessionContext,
    ) -> Result<OperationOutput> {
        if Operation::requires_session(&request.operation) && context.principal().is_none() {
            return Err(VaultError::NotAuthenticated);
        }
        let operation = request.into_operation()?;
        self.execute(operation, context).await
    }

    pub async fn execute(&self, operation: Operation, context: &SessionContext) -> Result<OperationOutput> {
        debug!(operation = operation.name(), user_id = ?context.principal(), "executing operation");
        let output = match operation {
            Operation::Login { username, password } => {
                OperationOutput::Login(self.login(&username, &password)?)
            }
            Operation::VaultItems => OperationOutput::Items(self.vault_items(context).await?),
            Operation::PublicVaultItems => OperationOutput::Items(self.public_vault_items().await),
            Operation::SearchVault { search_term } => {
                OperationOutput::Items(self.search_vault(&search_term, context).await)
            }
            Operation::CreateVaultItem { content, is_public } => {
                OperationOutput::Item(self.create_vault_item(content, is_public, context).await?)
            }
            Operation::MakeVaultItemPublic { id } => {
                OperationOutput::Item(self.make_vault_item_public(id, context).await?)
            }
        };
        Ok(output)
    }

    pub fn login(&self, username: &str, password: &str) -> Result<LoginPayload> {
        let Some(identity) = self.credentials.authenticate(username, password) else {
            info!(username, "login failed");
            return Err(VaultError::InvalidCredentials);
        };
        let token = self
            .tokens
            .issue(identity)
            .map_err(|e| VaultError::Internal(e.to_string()))?;
        info!(user_id = identity.id, role = %identity.role, "login succeeded");
        Ok(LoginPayload {
            token,
            user: identity.clone(),
        })
    }

    // own and public items; everything for the exact `admin` role
    pub async fn vault_items(&self, context: &SessionContext) -> Result<Vec<VaultItem>> {
        let user_id = context.principal().ok_or(VaultError::NotAuthenticated)?;
        if context.has_role(Role::Admin) {
            return Ok(self.items.all().await);
        }
        Ok(self
            .items
            .filter(|item| item.owner_id == user_id || item.is_public)
            .await)
    }

    pub async fn public_vault_items(&self) -> Vec<VaultItem> {
        self.items.filter(|item| item.is_public).await
    }

    // Substring match, limited to public items and the caller's own.
    // Role is not consulted.
    pub async fn search_vault(&self, search_term: &str, context: &SessionContext) -> Vec<VaultItem> {
        let caller = context.principal();
        self.items
            .filter(|item| {
                item.content.contains(search_term)
                    && (item.is_public || caller == Some(item.owner_id))
            })
            .await
    }

    // id is count + 1, read separately from the append: concurrent
    // creations can share an id
    pub async fn create_vault_item(
        &self,
        content: String,
        is_public: bool,
        context: &SessionContext,
    ) -> Result<VaultItem> {
        let owner_id = context.principal().ok_or(VaultError::NotAuthenticated)?;
        let id = self.items.len().await as i64 + 1;
        let item = VaultItem::new(id, owner_id, content, is_public);
        self.items.append(item.clone()).await;
        info!(user_id = owner_id, item_id = id, is_public, "vault item created");
        Ok(item)
    }

    // no ownership check
    pub async fn make_vault_item_public(&self, id: i64, context: &SessionContext) -> Result<VaultItem> {
        let user_id = context.principal().ok_or(VaultError::NotAuthenticated)?;
        let item = self.items.publish(id).await.ok_or(VaultError::ItemNotFound(id))?;
        info!(user_id, item_id = id, owner_id = item.owner_id, "vault item published");
        Ok(item)
    }
}
