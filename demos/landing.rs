use landing_mount::{
    config::GateConfig,
    media::{Capabilities, MediaPreferences},
    net::HttpSceneLoader,
    partners::PartnerDirectory,
    render::{DisplayItem, Viewport},
    subsystem::{LocalSceneLoader, SubsystemLoader},
    GateEvent, PageView,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

const PARTNERS: &str = r#"[
    { "name": "Northwind Optics", "category": "hardware", "logo": "northwind.svg", "featured": true },
    { "name": "Lumen Render", "category": "software", "logo": "lumen.svg" },
    { "name": "Open Graphics Guild", "category": "community", "logo": "ogg.svg" },
    { "name": "Polar Institute", "category": "research", "logo": "polar.svg", "featured": true },
    { "name": "Legacy Corp", "category": "software", "logo": "legacy.svg", "active": false }
]"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Gate configuration. The builder validates the combination of values.
    let config = GateConfig::builder()
        .margin_px(200)
        .idle_timeout(Duration::from_millis(500))
        .build()?;

    // The page starts at the top of a 1280x800 window. The heavy background lives in a section
    // further down the page, well outside the viewport.
    let mut page = PageView::new(
        config,
        Viewport::new(0, 0, 1280, 800),
        Capabilities::all(),
        MediaPreferences::default(),
    );
    let mut events = page.subscribe_events();

    // An optional scene URL on the command line makes the gate fetch its scene over HTTP.
    let loader: Arc<dyn SubsystemLoader> = match std::env::args().nth(1) {
        Some(url) => Arc::new(HttpSceneLoader::new(Url::parse(&url)?)),
        None => Arc::new(LocalSceneLoader::default()),
    };
    let gate = page.mount_gate(2000, loader);

    page.commit_frame();
    println!("initial frame: {} placeholder(s), gate {:?}", page.render_list().placeholders().count(), gate.state());

    // Scroll down in steps of 200px, committing a frame each time
    while !page.is_settled() && page.viewport().y < 2400 {
        page.scroll_by(0, 200);
        page.commit_frame();
        sleep(Duration::from_millis(16)).await;
        println!("scrolled to {:>4}px: {:?}", page.viewport().y, gate.state());
    }

    // Wait for the gate to finish, one way or the other
    let outcome = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match events.recv().await {
                Ok(ev @ (GateEvent::Mounted { .. } | GateEvent::LoadFailed { .. })) => return Some(ev),
                Ok(ev) => println!("event: {}", ev.kind()),
                Err(_) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten();
    println!("outcome: {outcome:?}");

    page.commit_frame();
    let circles = page
        .render_list()
        .items
        .iter()
        .filter(|i| matches!(i, DisplayItem::Circle { .. }))
        .count();
    println!("frame {}: {circles} particle(s) painted", page.scene_epoch());

    let directory = PartnerDirectory::from_json_str(PARTNERS)?;
    for (category, partners) in directory.by_category() {
        let names: Vec<_> = partners.iter().map(|p| p.name.as_str()).collect();
        println!("{category:<10} {}", names.join(", "));
    }

    page.teardown();
    Ok(())
}
