//! Property-based tests for the derived visible set.
//!
//! For any cached bookmarks and any search text, the visible set is exactly
//! the cached bookmarks whose title contains the text, ignoring case, in the
//! cached order.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use smartmark::database::Database;
use smartmark::managers::bookmark_manager::{BookmarkManager, BookmarkManagerTrait};
use smartmark::managers::session_manager::SessionManager;
use smartmark::managers::view_model::BookmarkViewModel;
use smartmark::services::local_backend::LocalBackend;
use smartmark::types::bookmark::NewBookmark;
use smartmark::types::settings::LocalSettings;

const OWNER: &str = "local-user";

/// Builds a signed-in view-model whose cache holds `titles`.
fn loaded_view_model(titles: &[String]) -> BookmarkViewModel {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let db = Arc::new(Database::open_in_memory().unwrap());
        {
            let conn = db.connection();
            let mut mgr = BookmarkManager::new(&conn);
            for (i, title) in titles.iter().enumerate() {
                let created_at = Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap();
                mgr.add_bookmark_at(
                    &NewBookmark {
                        title: title.clone(),
                        url: format!("https://site{}.example", i),
                        user_id: OWNER.to_string(),
                    },
                    created_at,
                )
                .unwrap();
            }
        }

        let sessions = SessionManager::ephemeral(db.clone()).unwrap();
        let backend = Arc::new(LocalBackend::new(
            db,
            sessions,
            &LocalSettings::default(),
            "http://localhost:3000",
        ));
        let mut vm = BookmarkViewModel::new(backend, "google", Duration::from_secs(5));
        let redirect = vm.login().await.unwrap();
        vm.complete_login(&redirect.url).await.unwrap();
        vm
    })
}

fn arb_titles() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-zA-Z][a-zA-Z0-9 ]{0,20}", 0..12)
}

fn arb_search() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), "[a-zA-Z ]{1,4}"]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn visible_set_is_case_insensitive_title_filter(titles in arb_titles(), search in arb_search()) {
        let mut vm = loaded_view_model(&titles);
        vm.set_search_text(&search);

        let needle = search.to_lowercase();
        let expected: Vec<_> = vm
            .bookmarks()
            .iter()
            .filter(|b| b.title.to_lowercase().contains(&needle))
            .map(|b| b.id.clone())
            .collect();
        let visible: Vec<_> = vm.visible_bookmarks().iter().map(|b| b.id.clone()).collect();
        prop_assert_eq!(&visible, &expected);

        let cards: Vec<_> = vm.snapshot().cards.into_iter().map(|c| c.id).collect();
        prop_assert_eq!(cards, visible);
    }

    #[test]
    fn empty_search_shows_everything(titles in arb_titles()) {
        let vm = loaded_view_model(&titles);
        prop_assert_eq!(vm.visible_bookmarks().len(), titles.len());
        prop_assert_eq!(vm.snapshot().total, titles.len());
    }

    #[test]
    fn searching_for_a_title_finds_it(titles in proptest::collection::vec("[a-z]{3,12}", 1..8), pick in any::<prop::sample::Index>()) {
        let mut vm = loaded_view_model(&titles);
        let wanted = pick.get(&titles).to_uppercase();
        vm.set_search_text(&wanted);
        prop_assert!(vm
            .visible_bookmarks()
            .iter()
            .any(|b| b.title.eq_ignore_ascii_case(&wanted)));
    }
}
