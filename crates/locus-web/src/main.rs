use std::path::PathBuf;

use facet::Facet;
use figue as args;
use locus_web::app::{AppState, ServerConfig, build_router};
use locus_web::mcp::session::DEFAULT_PUPPET_GROUP;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Facet, Debug)]
struct Cli {
    #[facet(flatten)]
    builtins: args::FigueBuiltins,
    /// Directory holding inspector.js and inspector.css.
    #[facet(args::named, default)]
    assets_dir: Option<String>,
    /// Project root that module paths are reported relative to.
    #[facet(args::named, default)]
    root: Option<String>,
}

const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:5137";

fn main() {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to build tokio runtime: {e}");
            std::process::exit(1);
        }
    };
    runtime.block_on(async {
        if let Err(err) = run().await {
            eprintln!("{err}");
            std::process::exit(1);
        }
    });
}

async fn run() -> Result<(), String> {
    let cli = parse_cli()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let http_addr = std::env::var("LOCUS_HTTP").unwrap_or_else(|_| DEFAULT_HTTP_ADDR.into());
    let config = server_config(&cli);

    let missing = config.missing_assets();
    for path in &missing {
        warn!(path = %path.display(), "inspector asset not found, the in-page inspector will stay inert");
    }

    let listener = TcpListener::bind(&http_addr)
        .await
        .map_err(|e| format!("failed to bind HTTP on {http_addr}: {e}"))?;
    info!(
        %http_addr,
        assets_dir = %config.assets_dir.display(),
        puppet_group = %config.puppet_group,
        "locus-web ready"
    );
    print_startup_hints(&http_addr, &config, missing.is_empty());

    let app = build_router(AppState::new(config));
    axum::serve(listener, app)
        .await
        .map_err(|e| format!("HTTP server failed: {e}"))
}

/// CLI flags win over environment variables, which win over defaults.
fn server_config(cli: &Cli) -> ServerConfig {
    let mut config = ServerConfig::default();
    if let Some(dir) = cli
        .assets_dir
        .clone()
        .or_else(|| std::env::var("LOCUS_ASSETS_DIR").ok())
    {
        config.assets_dir = PathBuf::from(dir);
    }
    config.project_root = cli
        .root
        .clone()
        .or_else(|| std::env::var("LOCUS_PROJECT_ROOT").ok())
        .map(PathBuf::from);
    config.puppet_group =
        std::env::var("LOCUS_PUPPET_GROUP").unwrap_or_else(|_| DEFAULT_PUPPET_GROUP.into());
    if let Ok(agent) = std::env::var("LOCUS_DEFAULT_AGENT") {
        if config.agents.iter().any(|known| known.id == agent) {
            config.default_agent = agent;
        } else {
            warn!(%agent, default = %config.default_agent, "unknown LOCUS_DEFAULT_AGENT, keeping default");
        }
    }
    config
}

fn parse_cli() -> Result<Cli, String> {
    let figue_config = args::builder::<Cli>()
        .map_err(|e| format!("failed to build CLI schema: {e}"))?
        .cli(|cli| cli.strict())
        .help(|h| {
            h.program_name("locus-web")
                .description("locus inspector dev server: MCP bridge, module transform, inspector assets")
                .version(option_env!("CARGO_PKG_VERSION").unwrap_or("dev"))
        })
        .build();
    let cli = args::Driver::new(figue_config)
        .run()
        .into_result()
        .map_err(|e| e.to_string())?;
    Ok(cli.value)
}

fn print_startup_hints(http_addr: &str, config: &ServerConfig, assets_ok: bool) {
    println!();
    println!();
    println!("  locus-web ready");
    println!();
    println!("  Load the inspector in your app:");
    println!("    \x1b[32m<script src=\"http://{http_addr}/__locus__/inspector.js\"></script>\x1b[0m");
    if !assets_ok {
        println!(
            "    \x1b[33m(not built yet: expected in {})\x1b[0m",
            config.assets_dir.display()
        );
    }
    println!();
    println!("  Point your agent's MCP client at:");
    println!("    \x1b[32mhttp://{http_addr}/__mcp__\x1b[0m");
    println!("    legacy SSE: http://{http_addr}/__mcp__/sse?puppetId={}", config.puppet_group);
    println!();
    println!();
}
