use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use snapsheet::cache::ContentCache;
use snapsheet::config::SheetConfig;
use snapsheet::ledger::UsageLedger;
use snapsheet::pipeline::{BuildRequest, SheetPipeline};
use snapsheet::schedule;

/// Shared flags for commands that read a photo batch.
#[derive(clap::Args, Clone)]
struct BatchArgs {
    /// Plan month as YYYY-MM
    #[arg(long)]
    month: String,

    /// Days between posting dates
    #[arg(long, default_value_t = 2)]
    interval: u32,

    /// Subject name fed to the caption prompt (hotel, venue, person)
    #[arg(long, default_value = "")]
    subject: String,

    /// Contact block printed on every page
    #[arg(long, default_value = "")]
    contact: String,

    /// Cache/ledger namespace; omit to share the anonymous pool
    #[arg(long)]
    namespace: Option<String>,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup — trivial, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "snapsheet")]
#[command(about = "Monthly photo content sheets, one printable page per photo")]
#[command(long_about = "\
Monthly photo content sheets, one printable page per photo

Point it at a directory of photos and a plan month. Each photo gets a page
with a posting date, a caption, and a hashtag line; the result is one HTML
document whose print output is the physical sheet.

Captions and hashtags come from a multimodal generation endpoint when an
API key is available (set the variable named by generation.api_key_env,
GEMINI_API_KEY by default), and from deterministic defaults otherwise — a
build never fails because the network did.

Posting dates start on the 1st and advance by --interval days, stopping at
day 29 so the sheet prints before the month it covers. A batch that cannot
be seated before the cutoff is rejected up front, before any generation
call is made.

Generated content is cached by image content hash: re-running a build with
the same photos costs zero new generation calls, even if the files were
renamed or re-exported in between.

Run 'snapsheet gen-config' to generate a documented snapsheet.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Photo directory
    #[arg(long, default_value = "photos", global = true)]
    source: PathBuf,

    /// Output directory for finished sheets
    #[arg(long, default_value = "sheets", global = true)]
    output: PathBuf,

    /// Directory for durable state (content cache, usage ledger)
    #[arg(long, default_value = ".snapsheet", global = true)]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a content sheet from the photo directory
    Build(BatchArgs),
    /// Validate the batch and schedule without calling the endpoint
    Check(BatchArgs),
    /// Print a stock snapsheet.toml with all options documented
    GenConfig,
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "tif", "tiff"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Build(args) => {
            let config = SheetConfig::load_dir(&cli.source)?;
            let (year, month) = parse_month(&args.month)?;
            let images = collect_images(&cli.source)?;
            println!(
                "==> Building {}: {} photo(s) from {}",
                args.month,
                images.len(),
                cli.source.display()
            );

            let api_key = std::env::var(&config.generation.api_key_env).ok();
            if api_key.as_deref().is_none_or(str::is_empty) {
                println!(
                    "    no key in ${} — using offline fallback content",
                    config.generation.api_key_env
                );
            }

            let cache = ContentCache::load(&cli.state_dir.join("cache.json"));
            let ledger = UsageLedger::load(&cli.state_dir.join("usage.json"));
            let mut pipeline = SheetPipeline::new(config, api_key, cache, Some(ledger));

            let request = BuildRequest {
                year,
                month,
                interval_days: args.interval,
                subject: args.subject,
                contact: args.contact,
                namespace: args.namespace,
            };
            let output = pipeline.build_sheet(&images, &request).await?;

            std::fs::create_dir_all(&cli.output)?;
            let out_path = cli.output.join(output_filename(
                request.namespace.as_deref(),
                &args.month,
            ));
            std::fs::write(&out_path, &output.html)?;

            println!("Cache: {}", output.cache_stats);
            println!(
                "Tokens: {} in / {} out (est. cost {:.4})",
                output.usage.input, output.usage.output, output.cost
            );
            println!(
                "==> Wrote {} page(s) to {}",
                output.pages,
                out_path.display()
            );
        }
        Command::Check(args) => {
            let config = SheetConfig::load_dir(&cli.source)?;
            config.validate()?;
            let (year, month) = parse_month(&args.month)?;
            let files = image_files(&cli.source)?;
            println!(
                "==> Checking {} photo(s) against {}",
                files.len(),
                args.month
            );

            let dates = schedule::build_schedule(year, month, args.interval, files.len())?;
            if let (Some(first), Some(last)) = (dates.first(), dates.last()) {
                println!(
                    "    posting dates {} through {}",
                    first.format("%d.%m.%Y"),
                    last.format("%d.%m.%Y")
                );
            }

            let mut unreadable = 0usize;
            for (path, raw) in &files {
                if snapsheet::imaging::prepare_image(raw).is_err() {
                    println!("    unreadable: {}", path.display());
                    unreadable += 1;
                }
            }
            if unreadable > 0 {
                println!(
                    "    {unreadable} photo(s) will print as placeholder pages"
                );
            }
            println!("==> Batch is valid");
        }
        Command::GenConfig => {
            print!("{}", SheetConfig::stock_toml());
        }
    }

    Ok(())
}

fn parse_month(raw: &str) -> Result<(i32, u32), String> {
    schedule::parse_plan_month(raw)
        .ok_or_else(|| format!("invalid --month '{raw}': expected YYYY-MM"))
}

/// All image files in the batch directory, ordered by file name.
fn image_files(dir: &Path) -> std::io::Result<Vec<(PathBuf, Vec<u8>)>> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if matches {
            files.push((path.to_path_buf(), std::fs::read(path)?));
        }
    }
    Ok(files)
}

fn collect_images(dir: &Path) -> std::io::Result<Vec<Vec<u8>>> {
    Ok(image_files(dir)?.into_iter().map(|(_, raw)| raw).collect())
}

/// `{namespace}-{month}-{timestamp}.html`, with the namespace reduced to
/// filename-safe characters.
fn output_filename(namespace: Option<&str>, month: &str) -> String {
    let stem: String = namespace
        .unwrap_or("sheet")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    format!("{stem}-{month}-{stamp}.html")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_filename_sanitizes_namespace() {
        let name = output_filename(Some("Seaside Hotel & Spa"), "2025-09");
        assert!(name.starts_with("Seaside_Hotel___Spa-2025-09-"));
        assert!(name.ends_with(".html"));
    }

    #[test]
    fn output_filename_defaults_without_namespace() {
        assert!(output_filename(None, "2025-09").starts_with("sheet-2025-09-"));
    }

    #[test]
    fn month_parsing_rejects_garbage() {
        assert!(parse_month("2025-9-1").is_err());
        assert!(parse_month("september").is_err());
        assert_eq!(parse_month("2025-09").unwrap(), (2025, 9));
    }

    #[test]
    fn image_files_ordered_and_filtered() {
        let tmp = tempfile::TempDir::new().unwrap();
        let png = {
            let img = image::RgbImage::from_pixel(8, 8, image::Rgb([1, 2, 3]));
            let mut buf = std::io::Cursor::new(Vec::new());
            image::DynamicImage::ImageRgb8(img)
                .write_to(&mut buf, image::ImageFormat::Png)
                .unwrap();
            buf.into_inner()
        };
        std::fs::write(tmp.path().join("b.png"), &png).unwrap();
        std::fs::write(tmp.path().join("a.PNG"), &png).unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "not a photo").unwrap();

        let files = image_files(tmp.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|(p, _)| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PNG", "b.png"]);
    }

    #[test]
    fn version_string_is_usable() {
        assert!(!version_string().is_empty());
    }
}
