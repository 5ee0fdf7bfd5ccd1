mod auction;
mod catalog;
mod config;
mod coordinator;
mod fanout;
mod ledger;
mod service;
mod sync;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::auction::{AuctionKey, ProductType};
use crate::catalog::{SharedListingStore, SharedUserDirectory};
use crate::coordinator::Coordinator;
use crate::fanout::Broadcaster;
use crate::ledger::SharedLedger;

fn main() -> Result<()> {
    let config = config::Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (ledger, listings, users): (SharedLedger, SharedListingStore, SharedUserDirectory) =
        match &config.database_url {
            Some(url) => {
                let ledger = ledger::PostgresLedger::connect(url, config.min_increment)?;
                ledger.ensure_schema()?;
                let catalog = Arc::new(catalog::PostgresCatalog::connect(url)?);
                let listings: SharedListingStore = catalog.clone();
                let users: SharedUserDirectory = catalog;
                (Arc::new(ledger), listings, users)
            }
            None => {
                warn!("no database url configured; using in-memory stores with demo data");
                let catalog = catalog::InMemoryCatalog::new_shared();
                seed_demo_data(&catalog);
                let listings: SharedListingStore = catalog.clone();
                let users: SharedUserDirectory = catalog;
                (
                    ledger::InMemoryLedger::new_shared(config.min_increment),
                    listings,
                    users,
                )
            }
        };

    let broadcaster = Broadcaster::new_shared();
    let coordinator = Arc::new(Coordinator::new(
        ledger.clone(),
        listings,
        users.clone(),
        broadcaster.clone(),
        config.min_increment,
        config.lock_timeout(),
    ));

    let svc_ctl = service::ServiceControl::new();

    ctrlc::set_handler({
        let svc_ctl = svc_ctl.clone();
        move || {
            eprintln!("Stopping all services...");
            svc_ctl.stop_all();
        }
    })?;

    let state = service::AppState {
        coordinator: coordinator.clone(),
        ledger,
        users,
        broadcaster,
    };

    info!(bind = %config.bind, min_increment = config.min_increment, "starting bidding engine");

    for handle in [
        svc_ctl.spawn_loop(service::Api::new(config.bind, state)?),
        svc_ctl.spawn_loop(service::Sweeper::new(coordinator, config.sweep_interval())),
    ] {
        handle.join()?
    }

    Ok(())
}

fn seed_demo_data(catalog: &catalog::InMemoryCatalog) {
    for product_id in 1..=3 {
        catalog.add_listing(AuctionKey::new(ProductType::Hoarding, product_id));
    }
    catalog.add_listing(AuctionKey::new(ProductType::Screen, 1));
    catalog.add_listing(AuctionKey::new(ProductType::Society, 1));
    catalog.add_user(1, "Asha");
    catalog.add_user(2, "Rohan");
    catalog.add_user(3, "Meera");
}
