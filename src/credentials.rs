//! Resolve a user's integration into a usable access token.
//!
//! Every external write goes through here first: a missing integration,
//! account, or credential reference is a terminal precondition failure.

use secrecy::SecretString;

use crate::error::CredentialError;
use crate::store::{Database, Integration, PLATFORM_META};
use crate::vault::CredentialVault;

/// Decrypted credential for the user's selected ad account.
pub struct AccountCredential {
    pub integration: Integration,
    pub ad_account_id: String,
    pub token: SecretString,
}

/// Decrypt the stored token of an integration.
pub fn unseal_token(
    vault: &CredentialVault,
    integration: &Integration,
) -> Result<SecretString, CredentialError> {
    let envelope = integration.access_token_ref.as_deref().ok_or_else(|| {
        CredentialError::CredentialMissing {
            integration_id: integration.id.to_string(),
        }
    })?;
    Ok(vault.decrypt(envelope)?)
}

/// Load the user's integration and decrypt its token. No ad account required.
pub async fn load_token(
    db: &dyn Database,
    vault: &CredentialVault,
    user_id: &str,
) -> Result<(Integration, SecretString), CredentialError> {
    let integration = db
        .get_integration(user_id, PLATFORM_META)
        .await?
        .ok_or_else(|| CredentialError::IntegrationMissing {
            user_id: user_id.to_string(),
        })?;
    let token = unseal_token(vault, &integration)?;
    Ok((integration, token))
}

/// Load the user's integration and require a selected ad account. No decryption.
pub async fn selected_account(
    db: &dyn Database,
    user_id: &str,
) -> Result<(Integration, String), CredentialError> {
    let integration = db
        .get_integration(user_id, PLATFORM_META)
        .await?
        .ok_or_else(|| CredentialError::IntegrationMissing {
            user_id: user_id.to_string(),
        })?;

    let ad_account_id = integration.ad_account_id.clone().ok_or_else(|| {
        CredentialError::AccountNotSelected {
            integration_id: integration.id.to_string(),
        }
    })?;
    Ok((integration, ad_account_id))
}

/// Load the user's integration, require a selected ad account, and decrypt its token.
pub async fn load_account(
    db: &dyn Database,
    vault: &CredentialVault,
    user_id: &str,
) -> Result<AccountCredential, CredentialError> {
    let (integration, ad_account_id) = selected_account(db, user_id).await?;
    let token = unseal_token(vault, &integration)?;

    Ok(AccountCredential {
        integration,
        ad_account_id,
        token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;
    use secrecy::ExposeSecret;

    async fn setup() -> (LibSqlBackend, CredentialVault) {
        (
            LibSqlBackend::new_memory().await.unwrap(),
            CredentialVault::new([5u8; 32]),
        )
    }

    #[tokio::test]
    async fn missing_integration() {
        let (db, vault) = setup().await;
        let err = load_account(&db, &vault, "nobody").await.err().unwrap();
        assert!(matches!(err, CredentialError::IntegrationMissing { .. }));
    }

    #[tokio::test]
    async fn account_not_selected() {
        let (db, vault) = setup().await;
        let sealed = vault.encrypt("tok").unwrap();
        db.upsert_integration(&Integration::new("u1", PLATFORM_META).with_token_ref(sealed))
            .await
            .unwrap();

        let err = load_account(&db, &vault, "u1").await.err().unwrap();
        assert!(matches!(err, CredentialError::AccountNotSelected { .. }));

        // token-only lookups still succeed
        let (_, token) = load_token(&db, &vault, "u1").await.unwrap();
        assert_eq!(token.expose_secret(), "tok");
    }

    #[tokio::test]
    async fn credential_missing_and_corrupt() {
        let (db, vault) = setup().await;
        db.upsert_integration(&Integration::new("u1", PLATFORM_META).with_account("act_1"))
            .await
            .unwrap();
        let err = load_account(&db, &vault, "u1").await.err().unwrap();
        assert!(matches!(err, CredentialError::CredentialMissing { .. }));

        db.upsert_integration(
            &Integration::new("u1", PLATFORM_META)
                .with_account("act_1")
                .with_token_ref("v1:garbage:garbage"),
        )
        .await
        .unwrap();
        let err = load_account(&db, &vault, "u1").await.err().unwrap();
        assert!(matches!(err, CredentialError::Vault(_)));
    }

    #[tokio::test]
    async fn loads_account_and_token() {
        let (db, vault) = setup().await;
        let sealed = vault.encrypt("EAAB-token").unwrap();
        db.upsert_integration(
            &Integration::new("u1", PLATFORM_META)
                .with_account("act_42")
                .with_token_ref(sealed),
        )
        .await
        .unwrap();

        let cred = load_account(&db, &vault, "u1").await.unwrap();
        assert_eq!(cred.ad_account_id, "act_42");
        assert_eq!(cred.token.expose_secret(), "EAAB-token");
    }
}
