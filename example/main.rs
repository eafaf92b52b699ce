use async_trait::async_trait;
use phasecuter::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct App {
    started: Mutex<Vec<String>>,
}

type Ctx = Arc<App>;

// A startup task contributed by some feature of the application.
struct FeatureTask {
    name: String,
    deps: Vec<String>,
}

#[async_trait]
impl Runnable<Ctx> for FeatureTask {
    fn id(&self) -> &str {
        &self.name
    }

    fn run_after(&self) -> Vec<String> {
        self.deps.clone()
    }

    async fn run(&self, app: Ctx) -> Result<(), BoxError> {
        println!("starting feature: {}", self.name);

        // simulate I/O
        tokio::time::sleep(Duration::from_millis(100)).await;

        app.started.lock().unwrap().push(self.name.clone());
        Ok(())
    }
}

fn feature(name: &str, deps: &[&str]) -> BoxRunnable<Ctx> {
    Arc::new(FeatureTask {
        name: name.to_string(),
        deps: deps.iter().map(|d| d.to_string()).collect(),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(None)?;

    let app = Ctx::default();

    let mut before_load = define_sync_phase::<Ctx>("before-load");
    before_load
        .register("read-env", |_: &Ctx| Ok(()), &[])
        .register("setup-paths", |_: &Ctx| Ok(()), &["read-env"]);

    let mut on_load = define_async_phase::<Ctx>("on-load");
    on_load
        .register_runnable(feature("user-store", &[]))
        .register_runnable(feature("cluster-store", &["user-store"]))
        .register_runnable(feature("hotbar-store", &["user-store"]))
        .register_runnable(feature("catalog-sync", &["cluster-store", "hotbar-store"]))
        .register_runnable(feature("tray", &["hotbar-store"]))
        .register_runnable(feature("window", &["user-store", "catalog-sync", "tray"]));

    let mut after_loaded = AsyncPhase::<Ctx>::with_config("after-loaded", AsyncPhaseConfig { max_concurrency: 2 });
    after_loaded.register(
        "report",
        |app: Ctx| async move {
            println!("started: {:?}", app.started.lock().unwrap());
            Ok::<(), BoxError>(())
        },
        &[],
    );

    println!("=== on-load graph ===");
    let graph = on_load.graph()?;
    print!("{}", graph.render());
    if let Some(order) = graph.topological_order() {
        println!("one valid order: {}", order.join(" -> "));
    }

    let start = std::time::Instant::now();
    before_load.run(&app)?;
    on_load.run(app.clone()).await?;
    after_loaded.run(app.clone()).await?;

    println!("=== startup finished in {:?} ===", start.elapsed());

    Ok(())
}
