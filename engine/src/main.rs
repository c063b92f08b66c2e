//! Tabflow CLI - derive datasets from datasets and keep them up to date
//!
//! # Main Commands
//!
//! ```bash
//! tabflow import people.csv                      # Import a CSV as a context
//! tabflow apply "Group By" --context People --attributes State
//! tabflow update People people.csv               # Replace a dataset, refresh dependents
//! tabflow list                                   # Contexts and text outputs
//! tabflow show "Group By(People, ...)"           # Print a context as JSON
//! ```
//!
//! # Tracking Commands
//!
//! ```bash
//! tabflow active                                 # Show active transformations
//! tabflow touch People                           # Re-run everything depending on People
//! tabflow delete People                          # Delete a context, stop tracking it
//! tabflow mark-edited <output> --title "Mine"    # Keep a custom title on refresh
//! tabflow transformers                           # Show available transformers
//! ```

use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tabflow::{
    catalog_description, parse_csv_file_auto, ActiveTransformationRegistry, AttributeEvaluator, CliError,
    CliResult, CodapLanguageType, DataContext, DatasetCreatorDescription, EngineConfig, FullOverrideDescription,
    Host, MemoryHost, OutputValue, TransformFunction, TransformationDescription, TransformationOutputType,
    Transformer, TransformerState, UpdateReport, Workspace,
};
use tabflow::transform::util::make_dataset_immutable;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "tabflow")]
#[command(about = "Transform hierarchical datasets and keep the results up to date", long_about = None)]
struct Cli {
    /// Workspace directory (overrides TABFLOW_HOME)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a CSV file as a new context
    Import {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Context title (default: file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Replace the dataset of a context with a CSV file and refresh dependents
    Update {
        /// Context name
        context: String,

        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,
    },

    /// List contexts and text outputs
    List,

    /// Print a context or a text output
    Show {
        /// Context or text name
        name: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show available transformers
    Transformers,

    /// Run a transformer and track its output
    Apply {
        /// Transformer name, e.g. "Group By" or group-by
        transformer: String,

        #[command(flatten)]
        state: StateArgs,

        /// Run once without tracking the output
        #[arg(long)]
        once: bool,
    },

    /// Signal that a context changed and refresh its dependents
    Touch {
        /// Context name
        context: String,
    },

    /// Delete a context and every description depending on it
    Delete {
        /// Context name
        context: String,
    },

    /// Keep the current (or given) title of an output on refresh
    MarkEdited {
        /// Output context or text name
        output: String,

        /// New title
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Show active transformations
    Active {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Transformer parameters. Flags override fields of `--state`.
#[derive(Args)]
struct StateArgs {
    /// Full transformer state as JSON
    #[arg(long)]
    state: Option<String>,

    /// First input context
    #[arg(long)]
    context: Option<String>,

    /// Second input context
    #[arg(long)]
    context2: Option<String>,

    /// First attribute
    #[arg(long)]
    attribute: Option<String>,

    /// Second attribute
    #[arg(long)]
    attribute2: Option<String>,

    /// Attribute list (comma separated)
    #[arg(long, value_delimiter = ',')]
    attributes: Vec<String>,

    /// First text input (e.g. result attribute name)
    #[arg(long)]
    text1: Option<String>,

    /// Second text input
    #[arg(long)]
    text2: Option<String>,

    /// Dropdown choice (e.g. sort direction or compare kind)
    #[arg(long)]
    dropdown: Option<String>,

    /// First expression
    #[arg(long)]
    expression1: Option<String>,

    /// Second expression
    #[arg(long)]
    expression2: Option<String>,

    /// Output type contract of the first expression
    #[arg(long)]
    output_type: Option<String>,
}

impl StateArgs {
    fn into_state(self) -> CliResult<TransformerState> {
        let mut state = match self.state {
            Some(json) => serde_json::from_str(&json)?,
            None => TransformerState::new(),
        };
        if let Some(context) = self.context {
            state.context1 = Some(context);
        }
        if let Some(context) = self.context2 {
            state.context2 = Some(context);
        }
        if let Some(attribute) = self.attribute {
            state.attribute1 = Some(attribute);
        }
        if let Some(attribute) = self.attribute2 {
            state.attribute2 = Some(attribute);
        }
        if !self.attributes.is_empty() {
            state.attribute_set1 = self.attributes;
        }
        if let Some(text) = self.text1 {
            state.text_input1 = text;
        }
        if let Some(text) = self.text2 {
            state.text_input2 = text;
        }
        if let Some(choice) = self.dropdown {
            state.dropdown1 = Some(choice);
        }
        if let Some(expr) = self.expression1 {
            state.expression1 = expr;
        }
        if let Some(expr) = self.expression2 {
            state.expression2 = expr;
        }
        if let Some(output_type) = self.output_type {
            state.type_contract1.output_type = output_type.parse::<CodapLanguageType>()?;
        }
        Ok(state)
    }
}

/// Loaded workspace: host contents plus the registry tracking them.
struct Session {
    workspace: Workspace,
    host: MemoryHost,
    registry: ActiveTransformationRegistry,
}

impl Session {
    fn open(home: Option<PathBuf>) -> CliResult<Self> {
        let mut config = EngineConfig::from_env();
        if let Some(home) = home {
            config = config.with_home(home);
        }
        let workspace = Workspace::open(&config)?;
        let host = workspace.load_host(AttributeEvaluator::new())?;
        let registry = workspace.load_registry()?;
        Ok(Self {
            workspace,
            host,
            registry,
        })
    }

    fn save(&self) -> CliResult<()> {
        self.workspace.save_host(&self.host)?;
        self.workspace.save_registry(&self.registry)?;
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match Session::open(cli.home) {
        Ok(session) => run(session, cli.command).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(mut session: Session, command: Commands) -> CliResult<()> {
    match command {
        Commands::Import {
            input,
            delimiter,
            name,
        } => cmd_import(&mut session, &input, delimiter, name).await,

        Commands::Update {
            context,
            input,
            delimiter,
        } => cmd_update(&mut session, &context, &input, delimiter).await,

        Commands::List => cmd_list(&session),

        Commands::Show { name, output } => cmd_show(&session, &name, output.as_deref()),

        Commands::Transformers => cmd_transformers(),

        Commands::Apply {
            transformer,
            state,
            once,
        } => cmd_apply(&mut session, &transformer, state.into_state()?, once).await,

        Commands::Touch { context } => cmd_touch(&mut session, &context).await,

        Commands::Delete { context } => cmd_delete(&mut session, &context).await,

        Commands::MarkEdited { output, title } => cmd_mark_edited(&mut session, &output, title).await,

        Commands::Active { output } => cmd_active(&session, output.as_deref()),
    }
}

async fn cmd_import(
    session: &mut Session,
    input: &Path,
    delimiter: Option<char>,
    name: Option<String>,
) -> CliResult<()> {
    eprintln!("📄 Importing CSV: {}", input.display());

    let result = parse_csv_file_auto(input, delimiter)?;
    eprintln!("   Encoding: {}", result.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(result.delimiter),
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Columns: {}", result.headers.join(", "));

    let title = name.unwrap_or_else(|| file_title(input));
    let rows = result.records.len();
    let dataset = result.into_dataset(&title);
    let context = session
        .host
        .create_context_with_dataset(&dataset, &title, &format!("Imported from {}", input.display()))
        .await?;

    eprintln!("✅ Imported {} records into \"{}\"", rows, context);
    session.save()
}

async fn cmd_update(session: &mut Session, context: &str, input: &Path, delimiter: Option<char>) -> CliResult<()> {
    eprintln!("📄 Updating \"{}\" from: {}", context, input.display());

    let (_, current) = session.host.get_context_and_dataset(context).await?;
    let collection = current
        .collections
        .first()
        .map(|c| c.name.clone())
        .unwrap_or_else(|| context.to_string());
    let dataset = parse_csv_file_auto(input, delimiter)?.into_dataset(&collection);

    let mut subscription = session.host.subscribe();
    session.host.set_dataset(context, dataset)?;
    let report = session.registry.drain(&session.host, &mut subscription).await;
    print_report(&report);
    session.save()
}

fn cmd_list(session: &Session) -> CliResult<()> {
    let contexts = session.host.contexts();
    let texts = session.host.texts();

    if contexts.is_empty() && texts.is_empty() {
        eprintln!("📭 Workspace is empty");
        return Ok(());
    }

    println!("📚 Contexts ({}):", contexts.len());
    for stored in &contexts {
        println!(
            "   {} - {} records{}",
            stored.context.name,
            stored.dataset.records.len(),
            context_suffix(&stored.context)
        );
    }

    if !texts.is_empty() {
        println!("\n📝 Texts ({}):", texts.len());
        for text in &texts {
            println!("   {} = {}", text.name, text.content);
        }
    }
    Ok(())
}

fn context_suffix(context: &DataContext) -> String {
    match context.title.as_deref() {
        Some(title) if title != context.name => format!(" (titled \"{}\")", title),
        _ => String::new(),
    }
}

fn cmd_show(session: &Session, name: &str, output: Option<&Path>) -> CliResult<()> {
    let json = if let Some(stored) = session.host.context(name) {
        serde_json::to_string_pretty(&stored)?
    } else if let Some(text) = session.host.text(name) {
        serde_json::to_string_pretty(&text)?
    } else {
        return Err(CliError::Usage(format!("No context or text named \"{}\"", name)));
    };
    write_output(&json, output)
}

fn cmd_transformers() -> CliResult<()> {
    println!("{}", catalog_description());
    Ok(())
}

async fn cmd_apply(session: &mut Session, name: &str, state: TransformerState, once: bool) -> CliResult<()> {
    let transformer: Transformer = name.parse()?;
    eprintln!("⚙️  Applying {}", transformer);

    let description = match transformer.function() {
        TransformFunction::DatasetCreator(output_type) => {
            let output = transformer.run(&state, &session.host).await?;
            let created = match (output.result, output_type) {
                (OutputValue::DataSet(dataset), TransformationOutputType::Context) => {
                    session
                        .host
                        .create_context_with_dataset(
                            &make_dataset_immutable(dataset),
                            &output.output_name,
                            &output.output_description,
                        )
                        .await?
                }
                (OutputValue::SingleValue(value), TransformationOutputType::Text) => {
                    let content = value.display();
                    eprintln!("   Result: {}", content);
                    session.host.create_text(&output.output_name, &content).await?
                }
                _ => {
                    return Err(CliError::Usage(format!(
                        "{} produced an output that does not match its output type",
                        transformer
                    )))
                }
            };

            let report = &output.missing_value_report;
            if !report.is_empty() {
                eprintln!("   ⚠️  {} missing values", report.len());
                if let Some(info) = report.extra_info() {
                    eprintln!("      {}", info);
                }
            }
            eprintln!("✅ Created \"{}\"", created);

            TransformationDescription::DatasetCreator(DatasetCreatorDescription {
                id: Uuid::new_v4(),
                transformer,
                inputs: transformer.inputs(&state),
                state,
                extra_dependencies: Vec::new(),
                output: created,
                output_type,
            })
        }
        TransformFunction::FullOverride => {
            let saved = tabflow::transform::partition(&state, &session.host).await?;
            for output in saved.outputs() {
                eprintln!("✅ Created \"{}\"", output);
            }

            TransformationDescription::FullOverride(FullOverrideDescription {
                id: Uuid::new_v4(),
                transformer,
                inputs: vec![saved.input_data_context.clone()],
                extra_dependencies: saved.outputs().map(String::from).collect(),
                state: saved,
            })
        }
    };

    if !once {
        eprintln!("   Tracking {}", description.id());
        session.registry.register(description)?;
    }
    session.save()
}

async fn cmd_touch(session: &mut Session, context: &str) -> CliResult<()> {
    let mut subscription = session.host.subscribe();
    session.host.touch(context)?;
    let report = session.registry.drain(&session.host, &mut subscription).await;
    print_report(&report);
    session.save()
}

async fn cmd_delete(session: &mut Session, context: &str) -> CliResult<()> {
    let mut subscription = session.host.subscribe();
    session.host.delete_data_context(context).await?;
    let report = session.registry.drain(&session.host, &mut subscription).await;
    eprintln!("🗑️  Deleted \"{}\"", context);
    print_report(&report);
    session.save()
}

async fn cmd_mark_edited(session: &mut Session, output: &str, title: Option<String>) -> CliResult<()> {
    if !session.host.has_output(output) {
        return Err(CliError::Usage(format!("No output named \"{}\"", output)));
    }
    if let Some(title) = title {
        if session.host.context(output).is_some() {
            session.host.set_title(output, &title)?;
        } else if let Some(text) = session.host.text(output) {
            session.host.update_text(output, &text.content, Some(&title)).await?;
        }
    }
    session.registry.mark_output_edited(output);
    eprintln!("✅ \"{}\" keeps its title on refresh", output);
    session.save()
}

fn cmd_active(session: &Session, output: Option<&Path>) -> CliResult<()> {
    let descriptions = session.registry.snapshot().serialize();
    eprintln!("🔗 {} active transformations", descriptions.len());
    let json = serde_json::to_string_pretty(&descriptions)?;
    write_output(&json, output)
}

fn print_report(report: &UpdateReport) {
    if !report.updated.is_empty() {
        eprintln!("🔄 Refreshed {} transformations", report.updated.len());
    }
    for failure in &report.failures {
        eprintln!("   ❌ {}", failure.message);
    }
    if !report.removed.is_empty() {
        eprintln!("   Stopped tracking {} transformations", report.removed.len());
    }
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn file_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Imported".to_string())
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult<()> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("   💾 Saved to: {}", p.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
