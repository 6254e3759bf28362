use tracing::{debug, error, info};

use arbor::{BodyStore, Config, Database, FolderDto, FolderService, FsBodyStore, NodePath, Visibility};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    // Initialize logging
    if let Err(e) = arbor::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        if let Err(e) = arbor::logging::init_console_only(&config.logging.level) {
            eprintln!("Failed to initialize console logging: {e}");
        }
    }

    info!("Arbor - hierarchical directory service");

    if let Err(e) = run(&config).await {
        error!("Startup failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: &Config) -> arbor::Result<()> {
    let db = Database::open(&config.database.path).await?;
    let store = FsBodyStore::new(&config.storage.path)?;
    store.create_directory(&NodePath::root())?;
    info!("Body store at {:?}", store.base_path());

    let root = FolderService::new(&db, &store)
        .root(Visibility::All)
        .await?;
    info!(
        "Root folder {} has {} folders and {} files",
        root.path(),
        root.folders().len(),
        root.files().len()
    );
    match serde_json::to_string(&FolderDto::from(&root)) {
        Ok(summary) => debug!("Root tree: {}", summary),
        Err(e) => error!("Failed to serialize root tree: {}", e),
    }

    Ok(())
}
