use std::collections::HashMap;
use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::ApiError;

/// Request streams in which a newer request supersedes an older one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestScope {
    ContactSearch,
    MemberSearch,
    PocketList,
    EventList,
    EventPhotos,
}

#[derive(Debug, Clone)]
pub struct RequestTicket {
    pub scope: RequestScope,
    pub id: u64,
    pub cancel: CancellationToken,
}

/// Hands out request identity tokens and remembers the newest per scope.
#[derive(Default)]
pub struct RequestTracker {
    next_id: u64,
    current: HashMap<RequestScope, (u64, CancellationToken)>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a request, cancelling whatever was in flight for the scope.
    pub fn begin(&mut self, scope: RequestScope) -> RequestTicket {
        self.next_id += 1;
        let cancel = CancellationToken::new();
        if let Some((_, previous)) = self.current.insert(scope, (self.next_id, cancel.clone())) {
            previous.cancel();
        }
        RequestTicket {
            scope,
            id: self.next_id,
            cancel,
        }
    }

    pub fn is_current(&self, scope: RequestScope, id: u64) -> bool {
        self.current
            .get(&scope)
            .is_some_and(|(current, _)| *current == id)
    }

    /// Retires `id` if it is still the newest request. Returns whether its
    /// response should be applied.
    pub fn finish(&mut self, scope: RequestScope, id: u64) -> bool {
        if self.is_current(scope, id) {
            self.current.remove(&scope);
            true
        } else {
            false
        }
    }

    pub fn cancel(&mut self, scope: RequestScope) {
        if let Some((_, token)) = self.current.remove(&scope) {
            token.cancel();
        }
    }

    pub fn in_flight(&self, scope: RequestScope) -> bool {
        self.current.contains_key(&scope)
    }
}

/// Runs `work` until it completes or `cancel` fires.
pub async fn cancellable<T, F>(cancel: CancellationToken, work: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(ApiError::Cancelled),
        result = work => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn newer_request_supersedes_older() {
        let mut tracker = RequestTracker::new();
        let first = tracker.begin(RequestScope::ContactSearch);
        let second = tracker.begin(RequestScope::ContactSearch);
        assert!(first.cancel.is_cancelled());
        assert!(!second.cancel.is_cancelled());
        assert!(!tracker.finish(RequestScope::ContactSearch, first.id));
        assert!(tracker.finish(RequestScope::ContactSearch, second.id));
        assert!(!tracker.in_flight(RequestScope::ContactSearch));
    }

    #[test]
    fn scopes_are_independent() {
        let mut tracker = RequestTracker::new();
        let contacts = tracker.begin(RequestScope::ContactSearch);
        let pockets = tracker.begin(RequestScope::PocketList);
        assert!(tracker.is_current(RequestScope::ContactSearch, contacts.id));
        assert!(tracker.is_current(RequestScope::PocketList, pockets.id));
        tracker.cancel(RequestScope::PocketList);
        assert!(pockets.cancel.is_cancelled());
        assert!(!contacts.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_work_reports_cancellation() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        let result: Result<u32, ApiError> = cancellable(token, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(1)
        })
        .await;
        assert_eq!(result, Err(ApiError::Cancelled));
    }
}
