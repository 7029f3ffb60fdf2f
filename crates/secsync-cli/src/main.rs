mod commands;
mod manifest;

use clap::{Parser, Subcommand};
use commands::ApiArgs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "secsync")]
#[command(about = "セキュリティグループのルールを宣言的に同期する", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// マニフェストのパス（省略時は secsync.yaml を自動検出）
    #[arg(short = 'f', long, env = manifest::MANIFEST_ENV, global = true)]
    manifest: Option<PathBuf>,

    #[command(flatten)]
    api: ApiArgs,

    /// デバッグログを出力
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 変更内容を表示（適用はしない）
    Plan {
        /// 対象グループ（名前またはID、省略時は全グループ）
        group: Option<String>,
        /// JSONで出力
        #[arg(long)]
        json: bool,
    },
    /// マニフェストの内容をセキュリティグループに適用
    Sync {
        /// 対象グループ（名前またはID、省略時は全グループ）
        group: Option<String>,
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// セキュリティグループの現在のルールを表示
    Show {
        /// セキュリティグループID
        group_id: String,
    },
    /// マニフェストを検証
    Validate,
    /// バージョン情報を表示
    Version,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let manifest = cli.manifest.as_deref();
    match &cli.command {
        Commands::Plan { group, json } => {
            commands::plan::handle(&cli.api, manifest, group.as_deref(), *json).await
        }
        Commands::Sync { group, yes } => {
            commands::sync::handle(&cli.api, manifest, group.as_deref(), *yes).await
        }
        Commands::Show { group_id } => commands::show::handle(&cli.api, manifest, group_id).await,
        Commands::Validate => commands::validate::handle(manifest),
        Commands::Version => {
            println!("secsync {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
