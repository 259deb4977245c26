use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use dotenvy::dotenv;
use tracing::{error, info, warn};

mod avatar;
mod config;
mod export;
mod llm;
mod persona;
mod state;
mod utils;

use config::CONFIG;
use export::{export_file_stem, to_json, AvatarProvider, Template};
use persona::{PersonaField, PersonaGenerator, PhotoOutcome};
use state::{AppState, GenerationSettings};
use utils::logging::init_logging;

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliCommand {
    Generate(RunArgs),
    Build(RunArgs),
    List,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct RunArgs {
    provider: Option<AvatarProvider>,
    template: Option<Template>,
    photo: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    count: Option<u32>,
    edits: Vec<(PersonaField, String)>,
}

fn usage() -> &'static str {
    "Usage:\n  persona_builder generate [--provider <randomuser|stability|huggingface>] [--template <basic|modern|professional|creative>] [--photo <file>] [--count <n>] [--out <dir>]\n  persona_builder build --set <field>=<value> [--set ...] [--template <id>] [--photo <file>] [--out <dir>]\n  persona_builder list\n\nThe template is recorded with the session and in the logs; exports are JSON and are not rendered with it.\n--count runs several generations in one session, resetting the persona between runs."
}

fn parse_args(args: &[String]) -> anyhow::Result<CliCommand> {
    let command = args.get(1).map(|value| value.as_str());
    let building = match command {
        Some("generate") => false,
        Some("build") => true,
        Some("list") => return Ok(CliCommand::List),
        Some("--help") | Some("-h") | None => return Err(anyhow!(usage())),
        Some(other) => return Err(anyhow!("Unknown command: {other}\n{}", usage())),
    };

    let mut run = RunArgs::default();
    let mut index = 2;
    while index < args.len() {
        let flag = args[index].as_str();
        index += 1;
        let value = args
            .get(index)
            .ok_or_else(|| anyhow!("Missing value for {flag}"));
        match flag {
            "--provider" if !building => {
                let value = value?;
                run.provider = Some(
                    AvatarProvider::from_id(value)
                        .ok_or_else(|| anyhow!("Unknown avatar provider: {value}"))?,
                );
            }
            "--template" => {
                let value = value?;
                run.template = Some(
                    Template::from_id(value).ok_or_else(|| anyhow!("Unknown template: {value}"))?,
                );
            }
            "--photo" => run.photo = Some(PathBuf::from(value?)),
            "--count" if !building => {
                let value = value?;
                let count = value
                    .parse::<u32>()
                    .ok()
                    .filter(|count| *count > 0)
                    .ok_or_else(|| anyhow!("--count expects a positive number, got: {value}"))?;
                run.count = Some(count);
            }
            "--out" => run.out_dir = Some(PathBuf::from(value?)),
            "--set" if building => {
                let value = value?;
                let (key, raw) = value
                    .split_once('=')
                    .ok_or_else(|| anyhow!("Expected <field>=<value>, got: {value}"))?;
                let field = PersonaField::from_key(key)
                    .ok_or_else(|| anyhow!("Unknown persona field: {key}"))?;
                run.edits.push((field, raw.to_string()));
            }
            other => return Err(anyhow!("Unknown argument: {other}\n{}", usage())),
        }
        index += 1;
    }

    Ok(if building {
        CliCommand::Build(run)
    } else {
        CliCommand::Generate(run)
    })
}

fn settings_for(run: &RunArgs) -> GenerationSettings {
    let defaults = GenerationSettings::from_config();
    GenerationSettings {
        avatar_provider: run.provider.unwrap_or(defaults.avatar_provider),
        template: run.template.unwrap_or(defaults.template),
    }
}

async fn load_upload(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read photo {}", path.display()))?;
    if let Err(err) = state.attach_uploaded_photo(bytes, CONFIG.max_photo_upload_bytes) {
        // A rejected upload just means the session has no photo.
        warn!("{}", err);
        println!("{err}");
    }
    Ok(())
}

async fn write_exports(state: &AppState, out_dir: &Path, suffix: &str) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let stem = format!("{}{suffix}", export_file_stem(&state.persona.name));
    let json_path = out_dir.join(format!("{stem}.json"));
    tokio::fs::write(&json_path, to_json(&state.persona)?)
        .await
        .with_context(|| format!("Failed to write {}", json_path.display()))?;
    println!("Wrote {}", json_path.display());

    if let Some(photo) = &state.persona.photo {
        let extension = infer::get(&photo.bytes)
            .map(|kind| kind.extension())
            .unwrap_or("png");
        let photo_path = out_dir.join(format!("{stem}.{extension}"));
        tokio::fs::write(&photo_path, &photo.bytes)
            .await
            .with_context(|| format!("Failed to write {}", photo_path.display()))?;
        println!(
            "Wrote {} (source: {})",
            photo_path.display(),
            photo.source.as_str()
        );
    }
    Ok(())
}

async fn run_generate(run: RunArgs) -> anyhow::Result<()> {
    let mut state = AppState::new(settings_for(&run));
    let generator = PersonaGenerator::from_config();
    let out_dir = run.out_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let count = run.count.unwrap_or(1);

    for round in 1..=count {
        if round > 1 {
            state.reset();
        }
        if let Some(path) = &run.photo {
            load_upload(&mut state, path).await?;
        }

        info!(
            "Generating persona {}/{} (avatar provider: {}, template: {})",
            round,
            count,
            state.settings.avatar_provider.id(),
            state.settings.template.id()
        );
        let report = match generator.generate(&mut state).await {
            Ok(report) => report,
            Err(err) => {
                error!("{}", err);
                println!("{err}");
                continue;
            }
        };

        if let PhotoOutcome::Unavailable { reason, .. } = &report.photo {
            println!("No photo: {reason}");
        }
        println!(
            "Generated persona '{}' ({} field(s) from the model)",
            state.persona.name,
            report.applied_fields.len()
        );

        let suffix = if count > 1 {
            format!("_{round}")
        } else {
            String::new()
        };
        write_exports(&state, &out_dir, &suffix).await?;
    }
    Ok(())
}

async fn run_build(run: RunArgs) -> anyhow::Result<()> {
    let mut state = AppState::new(settings_for(&run));
    for (field, raw) in &run.edits {
        if !state.persona.set_field(*field, raw) {
            println!("Ignored unusable value for {}: {raw}", field.key());
        }
    }
    if let Some(path) = &run.photo {
        load_upload(&mut state, path).await?;
    }

    if let Err(err) = state.submit() {
        println!("{err}");
        return Ok(());
    }

    let out_dir = run.out_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    write_exports(&state, &out_dir, "").await
}

fn print_identifiers() {
    println!("Templates:");
    for template in Template::ALL {
        println!("  {:<13} {}", template.id(), template.description());
    }
    println!("Avatar providers:");
    for provider in AvatarProvider::ALL {
        println!("  {:<13} {}", provider.id(), provider.description());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let _guards = init_logging();
    for notice in &CONFIG.warnings {
        warn!("{}", notice);
    }

    let args: Vec<String> = std::env::args().collect();
    match parse_args(&args)? {
        CliCommand::Generate(run) => run_generate(run).await,
        CliCommand::Build(run) => run_build(run).await,
        CliCommand::List => {
            print_identifiers();
            Ok(())
        }
    }
}
