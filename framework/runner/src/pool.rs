use crate::model::ParticipantGroup;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::sync::Mutex;

/// A pure resource-leasing primitive over a fixed catalog of participant groups.
///
/// The available set is a bounded queue seeded with the whole catalog before any run starts;
/// leasing dequeues and releasing enqueues, so no group is ever lent twice at once and no group
/// is created or destroyed after construction. Lease scope is expected to cover only a run's
/// bootstrap phase, which lets more runs be in flight than there are groups.
pub struct ParticipantPool {
    returns: Sender<ParticipantGroup>,
    available: Mutex<Receiver<ParticipantGroup>>,
    catalog_size: usize,
}

impl ParticipantPool {
    pub fn new(groups: Vec<ParticipantGroup>) -> Self {
        let catalog_size = groups.len();
        let (returns, available) = channel(catalog_size.max(1));
        for group in groups {
            returns
                .try_send(group)
                .expect("pool queue sized to the catalog cannot be full while seeding");
        }

        Self {
            returns,
            available: Mutex::new(available),
            catalog_size,
        }
    }

    pub fn catalog_size(&self) -> usize {
        self.catalog_size
    }

    /// Take exclusive ownership of a group, waiting until one is available.
    pub async fn lease(&self) -> ParticipantGroup {
        self.available
            .lock()
            .await
            .recv()
            .await
            .expect("pool queue cannot close while the pool is alive")
    }

    /// Return a leased group to the available set.
    pub fn release(&self, group: ParticipantGroup) {
        if self.returns.try_send(group).is_err() {
            // Only reachable if a group is released twice, which would break lease exclusivity.
            log::error!("Released a participant group into a full pool; dropping it");
        }
    }
}
