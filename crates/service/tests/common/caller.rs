//! Caller test double.

use async_trait::async_trait;
use depot_service::{Caller, MirrorError, MirrorResult, Permission, Scope};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Grants either everything or an explicit list of permissions.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestCaller {
    subject: String,
    grants: Option<Vec<(Permission, Scope)>>,
    checks: AtomicUsize,
}

#[allow(dead_code)]
impl TestCaller {
    /// A caller holding every permission everywhere.
    pub fn admin(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            grants: None,
            checks: AtomicUsize::new(0),
        }
    }

    /// A caller holding no permissions.
    pub fn nobody(subject: &str) -> Self {
        Self::with_grants(subject, Vec::new())
    }

    pub fn with_grants(subject: &str, grants: Vec<(Permission, Scope)>) -> Self {
        Self {
            subject: subject.to_string(),
            grants: Some(grants),
            checks: AtomicUsize::new(0),
        }
    }

    /// Number of permission checks performed.
    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Caller for TestCaller {
    fn subject(&self) -> &str {
        &self.subject
    }

    async fn require_permission(&self, permission: Permission, scope: &Scope) -> MirrorResult<()> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        let allowed = match &self.grants {
            None => true,
            Some(grants) => grants.iter().any(|(p, s)| *p == permission && s == scope),
        };
        if allowed {
            Ok(())
        } else {
            Err(MirrorError::Forbidden(format!(
                "{} lacks {permission} on {scope}",
                self.subject
            )))
        }
    }
}
