//! epub2html - flatten an EPUB into one browsable HTML file

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use log::{LevelFilter, warn};
use serde::Serialize;

use epub2html::{
    BookInfo, ConvertOptions, Error, HeadSource, NavDiscovery, ResourceOverrides,
    DEFAULT_OUTPUT_NAME, convert, inspect, launch_viewer,
};

#[derive(Parser)]
#[command(name = "epub2html")]
#[command(version, about = "Flatten an EPUB into a single HTML file", long_about = None)]
#[command(after_help = "EXAMPLES:
    epub2html book.epub                 Convert into ./epub-<hash>/.../book.html
    epub2html -b firefox book.epub      Convert and open the result
    epub2html -c night.css book.epub    Use a custom stylesheet
    epub2html -i --json book.epub       Show the book structure as JSON")]
struct Cli {
    /// EPUB archive to convert
    #[arg(value_name = "EPUB")]
    epub: PathBuf,

    /// Stylesheet file, or a directory containing default.css
    #[arg(short, long, value_name = "PATH")]
    css: Option<PathBuf>,

    /// Script library file, or a directory containing jquery.js
    #[arg(short, long, value_name = "PATH")]
    jquery: Option<PathBuf>,

    /// Dropdown script file, or a directory containing dropdown.js
    #[arg(short, long, value_name = "PATH")]
    dropdown: Option<PathBuf>,

    /// Open the result with this program
    #[arg(short, long, value_name = "COMMAND")]
    browser: Option<String>,

    /// Directory to create the working directory in
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    workdir: PathBuf,

    /// File name of the generated document
    #[arg(short, long, value_name = "NAME", default_value = DEFAULT_OUTPUT_NAME)]
    output_name: String,

    /// Manifest id of the navigation document
    #[arg(long, value_name = "ID", conflicts_with = "nav_from_spine")]
    nav_id: Option<String>,

    /// Find the navigation document through the spine's toc attribute
    #[arg(long)]
    nav_from_spine: bool,

    /// Copy the head of the file targeted by this TOC entry (0-based)
    #[arg(long, value_name = "N", default_value_t = 1)]
    head_from: usize,

    /// Keep the extracted chapter files after conversion
    #[arg(long)]
    keep_chapters: bool,

    /// Show the book structure without converting
    #[arg(short, long)]
    info: bool,

    /// Print --info output as JSON
    #[arg(long, requires = "info")]
    json: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    fn options(&self) -> ConvertOptions {
        let nav_discovery = if self.nav_from_spine {
            NavDiscovery::SpineToc
        } else {
            self.nav_id
                .clone()
                .map(NavDiscovery::SentinelId)
                .unwrap_or_default()
        };

        ConvertOptions::default()
            .with_overrides(ResourceOverrides {
                stylesheet: self.css.clone(),
                primary_script: self.jquery.clone(),
                dropdown_script: self.dropdown.clone(),
            })
            .with_nav_discovery(nav_discovery)
            .with_head_source(HeadSource::NavEntry(self.head_from))
            .with_work_parent(&self.workdir)
            .with_output_name(&self.output_name)
            .with_keep_chapters(self.keep_chapters)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let options = cli.options();
    let result = if cli.info {
        show_info(&cli.epub, &options, cli.json)
    } else {
        run_conversion(&cli, &options)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn run_conversion(cli: &Cli, options: &ConvertOptions) -> Result<(), Error> {
    let conversion = convert(&cli.epub, options)?;

    if !cli.quiet {
        println!("{}", conversion.output.display());
    }

    if let Some(viewer) = &cli.browser
        && let Err(e) = launch_viewer(viewer, &conversion.output)
    {
        warn!("could not open {} with {viewer}: {e}", conversion.output.display());
    }
    Ok(())
}

fn report(e: &Error) {
    eprintln!("error: {e}");
    if let Error::ResourceNotFound { searched, .. } = e {
        for location in searched {
            eprintln!("  searched: {}", location.display());
        }
    }
}

#[derive(Serialize)]
struct InfoReport<'a> {
    work_dir: &'a Path,
    package: &'a str,
    navigation: &'a str,
    title: &'a str,
    authors: &'a [String],
    language: &'a str,
    resources: usize,
    chapters: &'a [String],
    toc: Vec<TocReport<'a>>,
}

#[derive(Serialize)]
struct TocReport<'a> {
    title: &'a str,
    file: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    anchor: &'a str,
}

impl<'a> From<&'a BookInfo> for InfoReport<'a> {
    fn from(info: &'a BookInfo) -> Self {
        Self {
            work_dir: &info.work_dir,
            package: &info.package_path,
            navigation: &info.navigation_path,
            title: &info.metadata.title,
            authors: &info.metadata.authors,
            language: &info.metadata.language,
            resources: info.resources,
            chapters: &info.chapters,
            toc: info
                .toc
                .iter()
                .map(|entry| TocReport {
                    title: &entry.title,
                    file: &entry.target_file,
                    anchor: &entry.target_anchor,
                })
                .collect(),
        }
    }
}

fn show_info(epub: &Path, options: &ConvertOptions, json: bool) -> Result<(), Error> {
    let info = inspect(epub, options)?;

    if json {
        let report = InfoReport::from(&info);
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        println!("{text}");
        return Ok(());
    }

    let meta = &info.metadata;
    println!("File: {}", epub.display());
    println!("Title: {}", meta.title);
    if !meta.authors.is_empty() {
        println!("Authors: {}", meta.authors.join(", "));
    }
    if !meta.language.is_empty() {
        println!("Language: {}", meta.language);
    }
    println!("Package: {}", info.package_path);
    println!("Navigation: {}", info.navigation_path);
    println!("Resources: {}", info.resources);
    println!("Chapters: {}", info.chapters.len());
    for chapter in &info.chapters {
        println!("  {chapter}");
    }
    println!("TOC entries: {}", info.toc.len());
    for entry in &info.toc {
        if entry.target_anchor.is_empty() {
            println!("  {} -> {}", entry.title, entry.target_file);
        } else {
            println!("  {} -> {}#{}", entry.title, entry.target_file, entry.target_anchor);
        }
    }
    Ok(())
}
