use std::collections::HashMap;
use std::sync::Mutex;

use skein_core::error::{Result, SkeinError};
use skein_core::traits::SessionStore;
use skein_core::types::{SessionId, SessionState};

/// In-memory session store. Suspended runs die with the process; meant for
/// tests and embedders that resume within one process.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SessionState>>> {
        self.sessions
            .lock()
            .map_err(|e| SkeinError::Session(format!("session store lock poisoned: {}", e)))
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, state: &SessionState) -> Result<()> {
        self.lock()?
            .insert(state.session_id.0.clone(), state.clone());
        Ok(())
    }

    fn load(&self, session_id: &SessionId) -> Result<Option<SessionState>> {
        Ok(self.lock()?.get(&session_id.0).cloned())
    }

    fn delete(&self, session_id: &SessionId) -> Result<usize> {
        Ok(usize::from(self.lock()?.remove(&session_id.0).is_some()))
    }

    fn list(&self) -> Result<Vec<SessionId>> {
        Ok(self.lock()?.keys().cloned().map(SessionId).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let store = MemorySessionStore::new();
        let state = SessionState::new(SessionId::from_str("s1"), "g1", "1.0.0");
        store.save(&state).unwrap();

        assert!(store.load(&SessionId::from_str("s1")).unwrap().is_some());
        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.delete(&SessionId::from_str("s1")).unwrap(), 1);
        assert!(store.load(&SessionId::from_str("s1")).unwrap().is_none());
    }
}
