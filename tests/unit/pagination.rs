//! Unit tests for page-window pagination

use irace_stats::stats::pagination::Paginator;
use irace_stats::{PageWindow, StatsError, PAGE_SIZE};
use std::sync::{Arc, Mutex};

/// In-memory member list served one window at a time
#[derive(Clone)]
struct Roster {
    members: Arc<Vec<u32>>,
    windows: Arc<Mutex<Vec<PageWindow>>>,
}

impl Roster {
    fn new(count: u32) -> Self {
        Self {
            members: Arc::new((1..=count).collect()),
            windows: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn serve(&self, page: u32) -> Vec<u32> {
        let window = PageWindow::try_for_page(page).unwrap();
        self.windows.lock().unwrap().push(window);
        self.members
            .iter()
            .copied()
            .filter(|id| (window.lower..=window.upper).contains(id))
            .collect()
    }

    fn windows(&self) -> Vec<(u32, u32)> {
        self.windows
            .lock()
            .unwrap()
            .iter()
            .map(|w| (w.lower, w.upper))
            .collect()
    }
}

async fn collect(roster: &Roster) -> Vec<u32> {
    Paginator::collect_all(|page| {
        let roster = roster.clone();
        async move {
            let items = roster.serve(page);
            let count = items.len() as u64;
            Ok((items, count))
        }
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_collects_every_member_in_order() {
    for count in [0, 1, 24, 25, 26, 63, 75, 250] {
        let roster = Roster::new(count);
        let members = collect(&roster).await;
        assert_eq!(members, (1..=count).collect::<Vec<_>>(), "count {count}");

        // One extra (short or empty) page ends the walk.
        let expected_pages = count / PAGE_SIZE + 1;
        assert_eq!(roster.windows().len() as u32, expected_pages, "count {count}");
    }
}

#[tokio::test]
async fn test_windows_are_contiguous() {
    let roster = Roster::new(63);
    collect(&roster).await;
    assert_eq!(roster.windows(), vec![(1, 25), (26, 50), (51, 75)]);
}

#[tokio::test]
async fn test_page_limit() {
    let result = Paginator::collect_up_to(4, |_| async { Ok((vec![0u8; 25], 25)) }).await;
    assert!(matches!(result, Err(StatsError::PageLimit(4))));
}

#[tokio::test]
async fn test_error_on_later_page_discards_partial_result() {
    let result = Paginator::collect_all(|page| async move {
        if page == 2 {
            Err(StatsError::InvalidArgument("page 2 failed".to_string()))
        } else {
            Ok((vec![page; 25], 25))
        }
    })
    .await;
    assert!(matches!(result, Err(StatsError::InvalidArgument(_))));
}
