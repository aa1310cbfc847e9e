mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use models::ColumnType;
use tokio_util::sync::CancellationToken;

/// Uploads a CSV or JSON file into a hosted database: new rows are created,
/// and with --merge, rows whose key matches are updated in place.
#[derive(Debug, Parser)]
#[clap(author, name = "notionctl", version, rename_all = "kebab-case")]
struct Args {
    /// Path of the CSV or JSON file to upload.
    #[clap(required_unless_present = "delete_all_database_entries")]
    file: Option<PathBuf>,

    /// Integration token of the workspace.
    #[clap(long, env = "NOTION_TOKEN", hide_env_values = true)]
    token: String,

    /// URL of the target database view.
    #[clap(long)]
    url: String,

    /// Name of the workspace, echoed in logs. The integration token already
    /// selects the workspace.
    #[clap(long)]
    workspace: Option<String>,

    /// Parallel upload workers. 1 preserves input order.
    #[clap(long, default_value_t = 5)]
    max_threads: usize,

    /// Also write a JSON copy of the logs to this file.
    #[clap(long)]
    log: Option<PathBuf>,

    /// Shorthand for --log.level debug.
    #[clap(long)]
    verbose: bool,

    #[clap(flatten)]
    log_args: logging::LogArgs,

    /// CSV field delimiter.
    #[clap(long, default_value_t = ',')]
    delimiter: char,

    /// Comma-separated types for the non-key columns, e.g. "number,date".
    #[clap(long, value_delimiter = ',')]
    column_types: Vec<String>,

    /// Create columns that exist in the input but not the database.
    #[clap(long)]
    add_missing_columns: bool,

    /// Rename the database key column before uploading.
    #[clap(long, num_args = 2, value_names = ["FROM", "TO"])]
    rename_notion_key_column: Vec<String>,

    /// Pick random colours for the options of newly created select columns.
    #[clap(long)]
    randomize_select_colors: bool,

    /// Update rows whose key matches instead of always inserting.
    #[clap(long)]
    merge: bool,

    /// In merge mode, only update these columns. May repeat.
    #[clap(long = "merge-only-column")]
    merge_only_column: Vec<String>,

    /// In merge mode, don't insert rows whose key has no match.
    #[clap(long)]
    merge_skip_new: bool,

    /// Create linked-database rows for unresolved relation values.
    #[clap(long)]
    add_missing_relations: bool,

    /// Column holding an image URL or path. May repeat.
    #[clap(long = "image-column")]
    image_column: Vec<String>,

    /// Keep image columns in the written properties as well.
    #[clap(long)]
    image_column_keep: bool,

    /// Where images land on the page.
    #[clap(long, value_enum, default_value_t = ImageModeArg::Cover)]
    image_column_mode: ImageModeArg,

    /// Column holding the image block caption.
    #[clap(long)]
    image_caption_column: Option<String>,

    /// Keep the caption column in the written properties as well.
    #[clap(long)]
    image_caption_column_keep: bool,

    /// Column holding the page icon: an emoji, URL, or file path.
    #[clap(long)]
    icon_column: Option<String>,

    /// Keep the icon column in the written properties as well.
    #[clap(long)]
    icon_column_keep: bool,

    /// Icon applied when a row's icon cell is empty.
    #[clap(long)]
    default_icon: Option<String>,

    /// Column that must be non-empty in every row. May repeat.
    #[clap(long = "mandatory-column")]
    mandatory_column: Vec<String>,

    /// Column placed first when reading JSON input. Required for JSON.
    #[clap(long)]
    payload_key_column: Option<String>,

    /// Archive every row of the target database instead of uploading.
    #[clap(long)]
    delete_all_database_entries: bool,

    /// Endpoint of the image captioning service.
    #[clap(long)]
    caption_host: Option<url::Url>,

    /// Model served by the captioning service.
    #[clap(long, requires = "caption_host")]
    caption_model: Option<String>,

    /// AI captioning: image source column and target text column.
    #[clap(long, num_args = 2, value_names = ["IMAGE", "TARGET"], requires = "caption_host")]
    caption_column: Vec<String>,

    /// Abort when the key column repeats in the input or the database.
    #[clap(long)]
    fail_on_duplicates: bool,

    /// Abort when the CSV header repeats a column name.
    #[clap(long)]
    fail_on_duplicate_csv_columns: bool,

    /// Fail a row when a cell cannot be converted to its column type.
    #[clap(long)]
    fail_on_conversion_error: bool,

    /// Abort when a relation column's linked database is inaccessible.
    #[clap(long)]
    fail_on_inaccessible_relations: bool,

    /// Abort when an input column does not exist in the database.
    #[clap(long)]
    fail_on_missing_columns: bool,

    /// Abort when an input column maps to an unsettable database column.
    #[clap(long)]
    fail_on_unsettable_columns: bool,

    /// Fail a row whose status value matches no existing option.
    #[clap(long)]
    fail_on_wrong_status_values: bool,

    /// Abort when a linked database contains ambiguous duplicate titles.
    #[clap(long)]
    fail_on_relation_duplicates: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ImageModeArg {
    Cover,
    Block,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(err) = logging::init(&args.log_args, args.verbose, args.log.as_deref()) {
        eprintln!("Error: failed to initialize logging: {err:#}");
        return ExitCode::from(2);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error: failed to start async runtime: {err}");
            return ExitCode::from(2);
        }
    };

    match runtime.block_on(run(args)) {
        Ok(summary) if summary.failed() == 0 => ExitCode::SUCCESS,
        Ok(summary) => {
            eprintln!(
                "{} of {} rows failed; see the log for details",
                summary.failed(),
                summary.total
            );
            ExitCode::from(1)
        }
        Err(err) => {
            tracing::error!(error = ?err, "run failed");
            eprintln!("Error: {err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<sync::RunSummary> {
    let client = notion_client::Client::new(&args.token)?;
    let database = notion_client::parse_database_url(&args.url)?;
    if let Some(workspace) = &args.workspace {
        tracing::info!(workspace = %workspace, database = %database.id, "starting upload");
    }
    let ops: Arc<dyn sync::NotionOps> = Arc::new(client);

    // One Ctrl-C stops dispatching new rows; in-flight rows finish.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, draining in-flight rows");
                cancel.cancel();
            }
        });
    }

    if args.delete_all_database_entries {
        let summary = sync::delete_all(ops, &database.id, args.max_threads).await?;
        return Ok(summary);
    }

    let file = args.file.clone().expect("clap requires the input file");
    let read_config = parser::ReadConfig {
        delimiter: u8::try_from(args.delimiter as u32)
            .context("the CSV delimiter must be a single-byte character")?,
        payload_key_column: args.payload_key_column.clone(),
        fail_on_duplicate_columns: args.fail_on_duplicate_csv_columns,
        mandatory_columns: args.mandatory_column.clone(),
    };
    let table = parser::read_file(&read_config, &file)?;
    let input_dir = file
        .parent()
        .map(PathBuf::from)
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("."));

    let captioner: Option<Arc<dyn sync::CaptionProvider>> = match (&args.caption_host, &args.caption_model) {
        (Some(host), model) => Some(Arc::new(sync::HttpCaptioner::new(
            host.clone(),
            model.clone().unwrap_or_else(|| "default".to_string()),
        ))),
        _ => None,
    };

    let config = sync_config(&args)?;
    let summary = sync::run(
        ops,
        captioner,
        table,
        input_dir,
        &database.id,
        config,
        cancel,
    )
    .await?;
    Ok(summary)
}

fn sync_config(args: &Args) -> anyhow::Result<sync::SyncConfig> {
    let column_types = args
        .column_types
        .iter()
        .map(|code| {
            code.trim()
                .parse::<ColumnType>()
                .with_context(|| format!("--column-types: '{code}'"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let rename_key_column = match args.rename_notion_key_column.as_slice() {
        [] => None,
        [from, to] => Some((from.clone(), to.clone())),
        other => anyhow::bail!(
            "--rename-notion-key-column takes exactly FROM and TO, got {} values",
            other.len()
        ),
    };

    let caption_binding = match args.caption_column.as_slice() {
        [] => None,
        [image, target] => Some((image.clone(), target.clone())),
        other => anyhow::bail!(
            "--caption-column takes exactly IMAGE and TARGET, got {} values",
            other.len()
        ),
    };

    Ok(sync::SyncConfig {
        max_workers: args.max_threads,
        merge: args.merge,
        merge_only_columns: args.merge_only_column.clone(),
        merge_skip_new: args.merge_skip_new,
        add_missing_columns: args.add_missing_columns,
        add_missing_relations: args.add_missing_relations,
        randomize_select_colors: args.randomize_select_colors,
        rename_key_column,
        column_types,
        image_columns: args.image_column.clone(),
        image_columns_keep: args.image_column_keep,
        image_mode: match args.image_column_mode {
            ImageModeArg::Cover => sync::ImageMode::Cover,
            ImageModeArg::Block => sync::ImageMode::Block,
        },
        image_caption_column: args.image_caption_column.clone(),
        image_caption_column_keep: args.image_caption_column_keep,
        icon_column: args.icon_column.clone(),
        icon_column_keep: args.icon_column_keep,
        default_icon: args.default_icon.clone(),
        caption_binding,
        fail: sync::FailFlags {
            duplicates: args.fail_on_duplicates,
            conversion_error: args.fail_on_conversion_error,
            inaccessible_relations: args.fail_on_inaccessible_relations,
            missing_columns: args.fail_on_missing_columns,
            unsettable_columns: args.fail_on_unsettable_columns,
            wrong_status_values: args.fail_on_wrong_status_values,
            relation_duplicates: args.fail_on_relation_duplicates,
        },
    })
}
