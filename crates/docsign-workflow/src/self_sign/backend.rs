//! Signing back-ends for closing a self-sign collection
//!
//! The signature fields' configured signing type picks exactly one
//! back-end per close.

use async_trait::async_trait;
use docsign_types::{Caller, DocumentCollection, SignatureSigningType};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{WorkflowError, WorkflowResult};
use crate::ports::{Collaborators, SigningInfo, SigningKind};

/// What a back-end needs to start signing
pub struct SigningContext<'a> {
    pub ports: &'a Collaborators,
    pub caller: &'a Caller,
    pub collection: &'a DocumentCollection,
}

impl SigningContext<'_> {
    fn document_ids(&self) -> Vec<Uuid> {
        self.collection.documents.iter().map(|d| d.id).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SigningStarted {
    /// Signed synchronously
    Completed,
    /// The card holder finishes with this token
    AwaitingSmartCard { token: String },
    /// The user continues at the identity provider
    Redirect { url: String, state: String },
}

impl SigningStarted {
    /// What the outstanding signature completes against, unless it already
    /// completed
    pub fn pending_reference(&self) -> Option<&str> {
        match self {
            Self::Completed => None,
            Self::AwaitingSmartCard { token } => Some(token),
            Self::Redirect { state, .. } => Some(state),
        }
    }
}

#[async_trait]
pub trait BeginSigning: Send + Sync {
    async fn begin(&self, ctx: &SigningContext<'_>) -> WorkflowResult<SigningStarted>;
}

/// Graphic signatures sealed by the platform
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalSigning;

#[async_trait]
impl BeginSigning for LocalSigning {
    async fn begin(&self, ctx: &SigningContext<'_>) -> WorkflowResult<SigningStarted> {
        let info = SigningInfo {
            kind: SigningKind::Local,
            signer_name: ctx.caller.name.clone(),
            signer_email: Some(ctx.caller.email.clone()),
            reason: format!("Signed by {}", ctx.caller.name),
        };
        for document in &ctx.collection.documents {
            ctx.ports.pdf.sign(document.id, &info).await?;
        }
        Ok(SigningStarted::Completed)
    }
}

/// Split signing completed later from the card holder's machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartCardSigning {
    pub token: String,
}

#[async_trait]
impl BeginSigning for SmartCardSigning {
    async fn begin(&self, ctx: &SigningContext<'_>) -> WorkflowResult<SigningStarted> {
        ctx.ports
            .split_signing
            .begin(
                &self.token,
                ctx.collection.id,
                &ctx.document_ids(),
                &ctx.caller.name,
            )
            .await?;
        Ok(SigningStarted::AwaitingSmartCard {
            token: self.token.clone(),
        })
    }
}

/// Identity-proofed remote signing behind an authorization redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAssistedSigning {
    pub state: String,
}

#[async_trait]
impl BeginSigning for ServerAssistedSigning {
    async fn begin(&self, ctx: &SigningContext<'_>) -> WorkflowResult<SigningStarted> {
        let url = ctx
            .ports
            .identity
            .authorization_url(&self.state, ctx.collection.id, ctx.caller)
            .await?;
        Ok(SigningStarted::Redirect {
            url,
            state: self.state.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningBackend {
    Local(LocalSigning),
    SmartCard(SmartCardSigning),
    ServerAssisted(ServerAssistedSigning),
}

impl SigningBackend {
    /// Picks the back-end for the signing types found on the signature fields
    pub fn select(types: &[SignatureSigningType]) -> WorkflowResult<Self> {
        let smart_card = types.contains(&SignatureSigningType::SmartCard);
        let server = types.contains(&SignatureSigningType::Server);
        match (smart_card, server) {
            (true, true) => Err(WorkflowError::MixedSigningTypes),
            (true, false) => Ok(Self::SmartCard(SmartCardSigning {
                token: Uuid::new_v4().simple().to_string(),
            })),
            (false, true) => Ok(Self::ServerAssisted(ServerAssistedSigning {
                state: Uuid::new_v4().simple().to_string(),
            })),
            (false, false) => Ok(Self::Local(LocalSigning)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::SmartCard(_) => "smart_card",
            Self::ServerAssisted(_) => "server_assisted",
        }
    }
}

#[async_trait]
impl BeginSigning for SigningBackend {
    async fn begin(&self, ctx: &SigningContext<'_>) -> WorkflowResult<SigningStarted> {
        info!(collection_id = %ctx.collection.id, backend = self.name(), "Starting signing");
        match self {
            Self::Local(b) => b.begin(ctx).await,
            Self::SmartCard(b) => b.begin(ctx).await,
            Self::ServerAssisted(b) => b.begin(ctx).await,
        }
    }
}
