//! In-memory intervention repository with a bounded resolution log.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chatgm_domain::serialization::{decode_intervention, encode_intervention};
use chatgm_domain::{Intervention, InterventionId};
use tokio::sync::RwLock;

use crate::infrastructure::ports::{InterventionRepo, RepoError};

#[derive(Default)]
struct InterventionTables {
    pending: HashMap<InterventionId, String>,
    /// Newest at the front.
    history: VecDeque<(InterventionId, String)>,
}

pub struct InMemoryInterventionRepo {
    tables: RwLock<InterventionTables>,
    history_capacity: usize,
}

impl InMemoryInterventionRepo {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            tables: RwLock::new(InterventionTables::default()),
            history_capacity,
        }
    }
}

fn decode(raw: &str) -> Result<Intervention, RepoError> {
    decode_intervention(raw).map_err(RepoError::serialization)
}

fn oldest_first(mut items: Vec<Intervention>) -> Vec<Intervention> {
    items.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(&b.id()))
    });
    items
}

#[async_trait]
impl InterventionRepo for InMemoryInterventionRepo {
    async fn save(&self, intervention: &Intervention) -> Result<(), RepoError> {
        let id = intervention.id();
        let encoded = encode_intervention(intervention).map_err(RepoError::serialization)?;
        let mut tables = self.tables.write().await;

        if intervention.is_pending() {
            tables.pending.insert(id, encoded);
            return Ok(());
        }

        tables.pending.remove(&id);
        tables.history.retain(|(existing, _)| *existing != id);
        tables.history.push_front((id, encoded));
        tables.history.truncate(self.history_capacity);
        Ok(())
    }

    async fn get(&self, id: InterventionId) -> Result<Option<Intervention>, RepoError> {
        let tables = self.tables.read().await;
        if let Some(raw) = tables.pending.get(&id) {
            return decode(raw).map(Some);
        }
        tables
            .history
            .iter()
            .find(|(existing, _)| *existing == id)
            .map(|(_, raw)| decode(raw))
            .transpose()
    }

    async fn pending(&self) -> Result<Vec<Intervention>, RepoError> {
        let tables = self.tables.read().await;
        let items = tables
            .pending
            .values()
            .map(|raw| decode(raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(oldest_first(items))
    }

    async fn pending_for_chat(&self, chat_id: &str) -> Result<Vec<Intervention>, RepoError> {
        let items = self.pending().await?;
        Ok(items
            .into_iter()
            .filter(|intervention| intervention.chat_id() == chat_id)
            .collect())
    }

    async fn history(&self, limit: usize) -> Result<Vec<Intervention>, RepoError> {
        let tables = self.tables.read().await;
        tables
            .history
            .iter()
            .take(limit)
            .map(|(_, raw)| decode(raw))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgm_domain::{Session, SessionId, TriggerType};
    use chrono::{Duration, TimeZone, Utc};

    fn intervention(chat: &str, minute: i64) -> Intervention {
        let opened = Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap() + Duration::minutes(minute);
        let session = Session::new(SessionId::new(), chat, opened);
        Intervention::new(
            InterventionId::new(),
            &session,
            "p1",
            "call a human",
            TriggerType::HumanRequest,
            opened,
        )
    }

    #[tokio::test]
    async fn pending_lists_oldest_first_and_filters_by_chat() {
        let repo = InMemoryInterventionRepo::new(10);
        let later = intervention("chat-a", 5);
        let earlier = intervention("chat-a", 1);
        let other = intervention("chat-b", 3);
        for item in [&later, &earlier, &other] {
            repo.save(item).await.unwrap();
        }

        let ids: Vec<_> = repo.pending().await.unwrap().iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec![earlier.id(), other.id(), later.id()]);
        assert_eq!(repo.pending_for_chat("chat-a").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn resolved_move_to_bounded_history() {
        let repo = InMemoryInterventionRepo::new(2);
        let mut resolved = Vec::new();
        for minute in 0..3 {
            let mut item = intervention("chat-a", minute);
            repo.save(&item).await.unwrap();
            item.resolve("handled", "gm", Utc::now()).unwrap();
            repo.save(&item).await.unwrap();
            resolved.push(item.id());
        }

        assert!(repo.pending().await.unwrap().is_empty());
        let history: Vec<_> = repo.history(10).await.unwrap().iter().map(|i| i.id()).collect();
        assert_eq!(history, vec![resolved[2], resolved[1]]);
        assert!(repo.get(resolved[0]).await.unwrap().is_none());
        assert!(repo.get(resolved[2]).await.unwrap().unwrap().resolution().is_some());
    }
}
