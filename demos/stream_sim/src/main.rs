//! Stream Simulation Example
//!
//! Viewers buy effects for a streamer who walks around a small world.
//! Purchases arrive on a feed thread; the world thread ticks the runtime
//! once per game tick against a manual clock.
//!
//! Run with `RUST_LOG=tribute_core=debug` to watch the lifecycle logs.

mod world;

use std::path::Path;
use std::thread;
use tracing_subscriber::EnvFilter;
use tribute_core::overlay::MenuClick;
use tribute_core::spawn::WorldPoint;
use tribute_core::time::GAME_TICK_MS;
use tribute_core::{
    Clock, DefinitionStore, ManualClock, ProductId, Runtime, TickReport, TransactionOrigin,
    TransactionRecord,
};
use tribute_script::Loader;
use world::SimWorld;

const START_MS: i64 = 1_700_000_000_000;
const TICKS: u32 = 60;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,tribute_core=info,tribute_script=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn product_named(runtime: &Runtime, definition: &str) -> Option<ProductId> {
    runtime
        .products()
        .find(|product| product.definition.id.as_str() == definition)
        .map(|product| product.id)
}

fn print_state(tick: u32, runtime: &Runtime, world: &SimWorld) {
    println!(
        "Tick {:>2} (+{:>5}ms): products {} | visible {:>2} | chatbox {:?} | head {:?} | walk {:?} | overhead {:?}{}",
        tick,
        tick as i64 * GAME_TICK_MS,
        runtime.product_count(),
        world.visible_objects(),
        world.chatbox(),
        world.head_item(),
        world.walk_animation(),
        world.overhead().unwrap_or("-"),
        if world.hides_other_players() { " | others hidden" } else { "" },
    );
}

fn main() -> Result<(), tribute_script::Error> {
    init_logging();
    println!("=== Tribute Stream Simulation ===\n");

    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let config = Loader::load_runtime_config(root.join("runtime.ron"))?;
    let store = DefinitionStore::new();
    let mut loader = Loader::new();
    loader.load_directory(root.join("catalog"))?;
    let revision = loader.publish(&store)?;
    println!("Catalog revision {} loaded\n", revision);

    let clock = ManualClock::new(START_MS);
    let mut runtime = Runtime::new(config, store.clone());
    let mut world = SimWorld::new(WorldPoint::new(3_222, 3_218, 0));

    // Purchases come in from another thread, one of them twice
    let inbox = runtime.inbox();
    let feed = thread::spawn(move || {
        inbox.extend([
            TransactionRecord::purchase("tx-1001", START_MS, "Zezima", "sku-snowfall")
                .costing(4.99, "USD"),
            TransactionRecord::purchase("tx-1002", START_MS + 1_000, "Woox", "sku-gnome"),
            TransactionRecord::purchase("tx-1002", START_MS + 1_000, "Woox", "sku-gnome"),
            TransactionRecord::purchase("tx-1003", START_MS + 500, "B0aty", "sku-unknown"),
        ]);
    });
    if feed.join().is_err() {
        tracing::error!("purchase feed panicked");
        return Ok(());
    }

    for tick in 0..TICKS {
        let now = clock.now_ms();
        match tick {
            5 => {
                println!("\nLynx Titan buys Big Head Mode...\n");
                runtime.inbox().push(TransactionRecord::purchase(
                    "tx-1004",
                    now,
                    "Lynx Titan",
                    "sku-big-head",
                ));
            }
            7 => {
                let consumed = runtime.on_menu_click(&MenuClick::new("Walk here", ""), now);
                println!("\nStreamer clicks 'Walk here': consumed = {}\n", consumed);
            }
            12 | 14 => {
                let record = TransactionRecord::with_origin(
                    format!("mod-{}", tick),
                    now,
                    "Moderator",
                    TransactionOrigin::Free("sku-big-head".into()),
                );
                println!("\nModerator triggers Big Head Mode: {:?}\n", runtime.accept(record, now));
            }
            20 => {
                println!("\nRegion reload clears every object...\n");
                world.reload_region();
                runtime.handle_region_reload();
            }
            25 | 30 => {
                if let Some(id) = product_named(&runtime, "gnome_parade") {
                    if tick == 25 {
                        println!("\nPausing the gnome parade...\n");
                        runtime.pause(id, now)?;
                    } else {
                        println!("\nResuming the gnome parade...\n");
                        runtime.resume(id, now)?;
                    }
                }
            }
            35 => {
                let mut loader = Loader::new();
                loader.load_directory(root.join("catalog"))?;
                let revision = loader.publish(&store)?;
                println!("\nCatalog re-synced as revision {}\n", revision);
            }
            _ => {}
        }

        // The streamer wanders north, then east
        if (10..20).contains(&tick) {
            world.walk(0, 1);
        } else if (22..28).contains(&tick) {
            world.walk(1, 0);
        }

        let report = runtime.tick(now, &mut world);
        if report != TickReport::default() || tick % 10 == 0 {
            print_state(tick, &runtime, &world);
        }
        clock.advance(GAME_TICK_MS);
    }

    println!("\nStream ends, stopping everything...");
    runtime.stop_all();
    runtime.tick(clock.now_ms(), &mut world);
    print_state(TICKS, &runtime, &world);
    println!("Player at {}, {} chat messages", world.player_location(), world.chat.len());
    for (model, point) in world.visible_models() {
        println!("  leftover model {} at {}", model, point);
    }

    println!("\n=== Simulation Complete ===");
    Ok(())
}
