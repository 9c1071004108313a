//! SmartMark: a personal bookmark manager.
//!
//! Entry point: runs an offline console demo of the bookmark view-model
//! against the local SQLite collaborator. The UI-facing server is the
//! `smartmark-rpc` binary.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use smartmark::database::connection::Database;
use smartmark::logging::init_logging;
use smartmark::managers::session_manager::SessionManager;
use smartmark::managers::view_model::{AddOutcome, BookmarkViewModel};
use smartmark::services::crypto_service::pkce_challenge;
use smartmark::services::local_backend::LocalBackend;
use smartmark::types::settings::AppSettings;
use smartmark::types::view::ViewSnapshot;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    init_logging("warn");

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║              SmartMark v{}, Demo Mode                     ║", env!("CARGO_PKG_VERSION"));
    println!("║        Personal bookmarks, offline collaborator             ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let settings = AppSettings::default();
    let db = Arc::new(Database::open_in_memory()?);
    let sessions = SessionManager::ephemeral(db.clone())?;
    let backend = Arc::new(LocalBackend::new(
        db,
        sessions,
        &settings.local,
        &settings.auth.redirect_url,
    ));
    let mut vm = BookmarkViewModel::new(
        backend,
        &settings.auth.provider,
        Duration::from_secs(settings.network.request_timeout_secs),
    );

    demo_sign_in(&mut vm).await?;
    demo_add(&mut vm).await?;
    demo_search(&mut vm);
    demo_delete(&mut vm).await?;
    demo_logout(&mut vm).await;

    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("  ✅ View-model lifecycle demonstrated successfully!");
    println!("═══════════════════════════════════════════════════════════════");
    Ok(())
}

fn section(name: &str) {
    println!("───────────────────────────────────────────────────────────────");
    println!("  📦 {}", name);
    println!("───────────────────────────────────────────────────────────────");
}

fn print_cards(view: &ViewSnapshot) {
    if view.is_empty() {
        println!("  (no bookmarks to show)");
    }
    for card in &view.cards {
        println!(
            "  • {:<24} {:<32} {}",
            card.title,
            card.url,
            card.domain.as_deref().unwrap_or("-")
        );
    }
}

async fn demo_sign_in(vm: &mut BookmarkViewModel) -> Result<(), Box<dyn Error>> {
    section("Session");

    vm.restore_session().await?;
    println!("  Restored session: {:?}", vm.phase());

    let redirect = vm.login().await?;
    println!("  Redirect to: {}", redirect.url);
    let user = vm.complete_login(&redirect.url).await?;
    println!("  Signed in as {} ({:?})", user.id, vm.phase());
    println!("  PKCE challenge sample: {}", pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"));
    println!("  ✓ Sign-in OK");
    println!();
    Ok(())
}

async fn demo_add(vm: &mut BookmarkViewModel) -> Result<(), Box<dyn Error>> {
    section("Add Bookmarks");

    for (title, url) in [
        ("Rust Book", "https://doc.rust-lang.org/book/"),
        ("Tokio", "https://tokio.rs"),
        ("Notes", "not a url"),
    ] {
        vm.set_draft_title(title);
        vm.set_draft_url(url);
        if let AddOutcome::Saved(id) = vm.submit_draft().await? {
            println!("  Saved {} as {}", title, id);
        }
    }

    let ignored = vm.add_bookmark("   ", "https://example.com").await?;
    println!("  Blank title: {:?}", ignored);

    print_cards(&vm.snapshot());
    println!("  ✓ Add OK");
    println!();
    Ok(())
}

fn demo_search(vm: &mut BookmarkViewModel) {
    section("Search");

    vm.set_search_text("RUST");
    let view = vm.snapshot();
    println!("  \"RUST\" matches {} of {}", view.cards.len(), view.total);
    print_cards(&view);
    vm.set_search_text("");
    println!("  ✓ Search OK");
    println!();
}

async fn demo_delete(vm: &mut BookmarkViewModel) -> Result<(), Box<dyn Error>> {
    section("Delete");

    let Some(first) = vm.bookmarks().first().map(|b| b.id.clone()) else {
        return Ok(());
    };
    vm.delete_bookmark(&first).await?;
    vm.delete_bookmark(&first).await?;
    println!("  Deleted {} twice, {} left", first, vm.bookmarks().len());
    println!("  ✓ Delete OK");
    println!();
    Ok(())
}

async fn demo_logout(vm: &mut BookmarkViewModel) {
    section("Logout");

    let remote = vm.logout().await;
    println!(
        "  Remote sign-out: {}, phase: {:?}, cached: {}",
        if remote.is_ok() { "ok" } else { "failed" },
        vm.phase(),
        vm.bookmarks().len()
    );
    vm.teardown();
    println!("  ✓ Logout OK");
}
